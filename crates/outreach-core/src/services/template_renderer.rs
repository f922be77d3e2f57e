//! `{{ field }}` placeholder substitution and subject extraction

use crate::error::{OutreachError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("Failed to compile placeholder regex")
});

static SUBJECT_MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<!--\s*SUBJECT:\s*(.*?)\s*-->").expect("Failed to compile subject regex")
});

/// Email template split into an optional subject line and the HTML body
#[derive(Debug, Clone, PartialEq)]
pub struct EmailTemplate {
    pub subject: Option<String>,
    pub body: String,
}

impl EmailTemplate {
    /// Split a raw template; the subject marker is removed from the body
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(OutreachError::Template("email template is empty".to_string()));
        }

        let subject = SUBJECT_MARKER_REGEX
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());

        let body = SUBJECT_MARKER_REGEX.replace(raw, "").trim().to_string();
        if body.is_empty() {
            return Err(OutreachError::Template("email template has no body".to_string()));
        }

        Ok(Self { subject, body })
    }
}

pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Replace every placeholder; unknown keys render as an empty string
    pub fn render(template: &str, data: &BTreeMap<String, String>) -> String {
        PLACEHOLDER_REGEX
            .replace_all(template, |caps: &Captures| {
                data.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned()
    }

    /// Render the subject, falling back when the template carries none
    pub fn render_subject(
        template: &EmailTemplate,
        data: &BTreeMap<String, String>,
        default_subject: &str,
    ) -> String {
        let raw = template.subject.as_deref().unwrap_or(default_subject);
        let rendered = Self::render(raw, data);
        let collapsed = rendered.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            default_subject.to_string()
        } else {
            collapsed
        }
    }
}

/// First `max_chars` characters, never splitting a code point
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
