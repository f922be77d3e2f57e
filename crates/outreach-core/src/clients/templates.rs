//! Filesystem template source

use crate::campaign::traits::TemplateSource;
use crate::error::{OutreachError, Result};
use crate::paths;
use crate::services::EmailTemplate;
use async_trait::async_trait;
use std::path::PathBuf;

pub struct FileTemplateSource {
    root: PathBuf,
}

impl FileTemplateSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.trim().is_empty() || name.contains("..") {
            return Err(OutreachError::Template(format!("Invalid template name '{}'", name)));
        }
        Ok(self.root.join(name))
    }
}

impl Default for FileTemplateSource {
    fn default() -> Self {
        Self::new(paths::templates_dir())
    }
}

#[async_trait]
impl TemplateSource for FileTemplateSource {
    async fn load(&self, name: &str) -> Result<EmailTemplate> {
        let path = self.resolve(name)?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| OutreachError::Template(format!("Failed to read {}: {}", path.display(), e)))?;
        EmailTemplate::parse(&raw)
    }

    async fn load_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        Ok(tokio::fs::read(&path).await?)
    }
}
