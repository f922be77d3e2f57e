//! PDF service client

use crate::campaign::traits::DocumentGenerator;
use crate::config::PdfServiceConfig;
use crate::error::{OutreachError, Result};
use crate::paths;
use async_trait::async_trait;
use reqwest::{multipart, Client as HttpClient};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

pub struct PdfService {
    config: PdfServiceConfig,
    templates_root: PathBuf,
    http_client: HttpClient,
}

impl PdfService {
    pub fn new(config: PdfServiceConfig) -> Result<Self> {
        Self::with_templates_root(config, paths::templates_dir())
    }

    pub fn with_templates_root(config: PdfServiceConfig, templates_root: PathBuf) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            templates_root,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/generate-pdf", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl DocumentGenerator for PdfService {
    /// Upload the letter template with its data and return the rendered PDF
    async fn render(&self, template_name: &str, data: &Value) -> Result<Vec<u8>> {
        let full_template_path = self.templates_root.join(template_name);
        let template_bytes = tokio::fs::read(&full_template_path)
            .await
            .map_err(|e| OutreachError::Document(
                format!("Failed to read template file {}: {}", full_template_path.display(), e)
            ))?;

        let json_data = serde_json::to_string(data)?;

        let template_part = multipart::Part::bytes(template_bytes)
            .file_name(template_name.to_string())
            .mime_str("text/html")?;

        let json_part = multipart::Part::text(json_data)
            .file_name("data.json")
            .mime_str("application/json")?;

        let form = multipart::Form::new()
            .part("template_file", template_part)
            .part("json_data", json_part);

        let response = self.http_client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|e| OutreachError::Document(format!("PDF service request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OutreachError::Document(
                format!("PDF service returned {} - {}", status, error_text)
            ));
        }

        let pdf_data = response.bytes().await?;
        if pdf_data.is_empty() {
            return Err(OutreachError::Document("PDF service returned an empty document".to_string()));
        }

        Ok(pdf_data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(root: PathBuf) -> PdfService {
        let config = PdfServiceConfig {
            base_url: "http://127.0.0.1:9/".to_string(),
            timeout_secs: 2,
        };
        PdfService::with_templates_root(config, root).unwrap()
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let service = service(PathBuf::from("/tmp"));
        assert_eq!(service.endpoint(), "http://127.0.0.1:9/generate-pdf");
    }

    #[tokio::test]
    async fn test_missing_template_is_document_error() {
        let dir = TempDir::new().unwrap();
        let service = service(dir.path().to_path_buf());

        let result = service.render("missing.html", &serde_json::json!({})).await;
        match result {
            Err(OutreachError::Document(message)) => assert!(message.contains("missing.html")),
            other => panic!("expected document error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_document_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("letter.html"), "<p>{{ contact_name }}</p>").unwrap();
        let service = service(dir.path().to_path_buf());

        let result = service.render("letter.html", &serde_json::json!({"contact_name": "Ada"})).await;
        assert!(matches!(result, Err(OutreachError::Document(_))));
    }
}
