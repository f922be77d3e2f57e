//! Per-lead pipeline: render, log, generate, send, write back, clean up
//!
//! Every failure inside [`LeadPipeline::process`] is contained: the lead ends
//! FAILED_TO_SEND with a descriptive message and the run moves on. The send
//! log row is written before the transport is touched, and the staged letter
//! is removed whatever the outcome.

use crate::config::{OutreachConfig, TemplateConfig};
use crate::constants::{BODY_PREVIEW_CHARS, BRANDING_CONTENT_ID};
use crate::error::{OutreachError, Result};
use crate::services::template_renderer::preview;
use crate::services::{is_valid_email, EmailTemplate, PersonalizationData, TemplateRenderer};
use crate::types::{
    EmailAttachment, Envelope, InlineAsset, Lead, LeadId, LogId, LogUpdate, SendLogEntry,
    SendReceipt, SenderIdentity,
};
use super::governor::{SendGovernor, SenderReservation};
use super::progress::ProgressReporter;
use super::traits::{DocumentGenerator, LeadStore, MailTransport, TemplateSource};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use outreach_types::{LeadResult, ProgressEvent};

static UNSAFE_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9_.-]").expect("Failed to compile filename regex")
});

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Templates and assets resolved once per run
#[derive(Debug, Clone)]
pub struct RunTemplates {
    pub email: EmailTemplate,
    pub letter_template: Option<String>,
    pub branding: Option<InlineAsset>,
}

impl RunTemplates {
    /// A missing or empty email template is fatal; a missing branding image is not
    pub async fn load(source: &dyn TemplateSource, config: &TemplateConfig) -> Result<Self> {
        let email = source.load(&config.email_template).await?;

        let branding = match &config.branding_image {
            Some(name) => match source.load_bytes(name).await {
                Ok(content) => Some(InlineAsset {
                    content_id: BRANDING_CONTENT_ID.to_string(),
                    filename: name.clone(),
                    content_type: image_content_type(name).to_string(),
                    content,
                }),
                Err(e) => {
                    log::warn!("Branding image '{}' unavailable, sending without it: {}", name, e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            email,
            letter_template: config.letter_template.clone(),
            branding,
        })
    }
}

fn image_content_type(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}

/// Attachment name derived from the property address
pub fn letter_filename(property_address: Option<&str>) -> String {
    let address = property_address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("Unknown_Address")
        .replace(' ', "_");
    let safe = UNSAFE_FILENAME_CHARS.replace_all(&address, "_");
    let truncated: String = safe.chars().take(50).collect();
    format!("LETTER_OF_INTENT_{}.pdf", truncated)
}

/// Letter written to disk for the duration of one lead
#[derive(Debug)]
pub struct TempDocument {
    path: PathBuf,
    filename: String,
}

impl TempDocument {
    pub async fn stage(dir: &Path, lead_id: LeadId, filename: &str, content: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}_{}", lead_id, filename));
        if let Err(e) = tokio::fs::write(&path, content).await {
            // A partially written file may exist
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
        Ok(Self {
            path,
            filename: filename.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_attachment(&self) -> Result<EmailAttachment> {
        Ok(EmailAttachment {
            filename: self.filename.clone(),
            content_type: PDF_CONTENT_TYPE.to_string(),
            content: tokio::fs::read(&self.path).await?,
        })
    }

    /// Best-effort removal
    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            log::warn!("Failed to remove temporary document {}: {}", self.path.display(), e);
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_subject: String,
    pub retry_failed_leads: bool,
    /// Deliver everything here instead of the lead's address
    pub redirect_to: Option<String>,
    pub temp_dir: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(config: &OutreachConfig, temp_dir: PathBuf) -> Self {
        Self {
            default_subject: config.templates.default_subject.clone(),
            retry_failed_leads: config.campaign.retry_failed_leads,
            redirect_to: config.safety.redirect_to.clone(),
            temp_dir,
        }
    }
}

/// Identifies the run a lead belongs to
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub campaign_id: Option<String>,
    pub templates: Arc<RunTemplates>,
}

#[derive(Debug, Clone)]
pub struct LeadOutcome {
    pub lead_id: LeadId,
    pub result: LeadResult,
    pub error: Option<String>,
    pub log_id: Option<LogId>,
    /// Set when the email went out but the store could not be updated
    pub reconciliation: Option<String>,
}

struct RenderedMessage {
    subject: String,
    body: String,
    data: PersonalizationData,
}

pub struct LeadPipeline {
    store: Arc<dyn LeadStore>,
    documents: Arc<dyn DocumentGenerator>,
    transport: Arc<dyn MailTransport>,
    governor: Arc<SendGovernor>,
    reporter: ProgressReporter,
    settings: PipelineSettings,
}

impl LeadPipeline {
    pub fn new(
        store: Arc<dyn LeadStore>,
        documents: Arc<dyn DocumentGenerator>,
        transport: Arc<dyn MailTransport>,
        governor: Arc<SendGovernor>,
        reporter: ProgressReporter,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            documents,
            transport,
            governor,
            reporter,
            settings,
        }
    }

    fn render(
        &self,
        lead: &Lead,
        sender: &SenderIdentity,
        templates: &RunTemplates,
    ) -> RenderedMessage {
        let data = PersonalizationData::build(lead, sender, Utc::now());
        let subject = TemplateRenderer::render_subject(
            &templates.email,
            data.values(),
            &self.settings.default_subject,
        );
        let body = TemplateRenderer::render(&templates.email.body, data.values());
        RenderedMessage { subject, body, data }
    }

    fn recipient<'a>(&'a self, lead: &'a Lead) -> &'a str {
        self.settings.redirect_to.as_deref().unwrap_or_else(|| lead.contact_email())
    }

    /// Take one admitted lead through to a terminal send status
    pub async fn process(
        &self,
        lead: &Lead,
        reservation: SenderReservation,
        ctx: &RunContext,
    ) -> LeadOutcome {
        let sender = reservation.sender().clone();
        let message = self.render(lead, &sender, &ctx.templates);

        let entry = SendLogEntry::pending(
            lead,
            &sender,
            &message.subject,
            preview(&message.body, BODY_PREVIEW_CHARS),
            ctx.campaign_id.clone(),
            Some(ctx.run_id.clone()),
        );

        let log_id = match self.store.insert_log(&entry).await {
            Ok(id) => id,
            Err(e) => {
                // Nothing has been sent and there is no row to update
                let error = format!("Failed to create send log entry: {}", e);
                self.governor.record_outcome(reservation, false);
                return LeadOutcome {
                    lead_id: lead.id,
                    result: LeadResult::Failed,
                    error: Some(error),
                    log_id: None,
                    reconciliation: None,
                };
            }
        };

        let mut staged = None;
        let delivery = self.deliver(lead, &sender, message, ctx, &mut staged).await;

        let outcome = match delivery {
            Ok(receipt) => {
                log::info!(
                    "[{}] Sent lead {} as {} ({})",
                    ctx.run_id,
                    lead.id,
                    sender.email,
                    receipt.message_id.as_deref().unwrap_or("no receipt")
                );
                let reconciliation = self.write_back_success(lead, log_id, ctx).await;
                self.governor.record_outcome(reservation, true);
                LeadOutcome {
                    lead_id: lead.id,
                    result: LeadResult::Sent,
                    error: None,
                    log_id: Some(log_id),
                    reconciliation,
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.write_back_failure(lead, log_id, &error, ctx).await;
                self.governor.record_outcome(reservation, false);
                LeadOutcome {
                    lead_id: lead.id,
                    result: LeadResult::Failed,
                    error: Some(error),
                    log_id: Some(log_id),
                    reconciliation: None,
                }
            }
        };

        if let Some(document) = staged {
            document.remove().await;
        }

        outcome
    }

    async fn deliver(
        &self,
        lead: &Lead,
        sender: &SenderIdentity,
        message: RenderedMessage,
        ctx: &RunContext,
        staged: &mut Option<TempDocument>,
    ) -> Result<SendReceipt> {
        let attachment = match &ctx.templates.letter_template {
            Some(template) => {
                let pdf = self.documents.render(template, &message.data.to_json()).await?;
                let filename = letter_filename(lead.property_address.as_deref());
                let document =
                    TempDocument::stage(&self.settings.temp_dir, lead.id, &filename, &pdf).await?;
                let attachment = match document.read_attachment().await {
                    Ok(attachment) => Some(attachment),
                    Err(e) => {
                        self.reporter.warn(&ctx.run_id, format!(
                            "Letter for lead {} could not be read back, sending without it: {}",
                            lead.id, e
                        ));
                        None
                    }
                };
                *staged = Some(document);
                attachment
            }
            None => None,
        };

        if ctx.templates.branding.is_none() {
            log::debug!("[{}] No branding image for lead {}", ctx.run_id, lead.id);
        }

        let recipient = self.recipient(lead);
        if self.settings.redirect_to.is_some() {
            log::info!(
                "[{}] Safety redirect: lead {} ({}) delivered to {}",
                ctx.run_id, lead.id, lead.contact_email(), recipient
            );
        }

        let envelope = Envelope {
            to: recipient.to_string(),
            from: sender.clone(),
            subject: message.subject,
            html_body: message.body,
            attachment,
            inline_assets: ctx.templates.branding.iter().cloned().collect(),
        };

        let session = self.transport.authenticate(sender).await?;
        self.transport.send(&session, &envelope).await
    }

    async fn write_back_success(&self, lead: &Lead, log_id: LogId, ctx: &RunContext) -> Option<String> {
        let sent_at = Utc::now();
        let mut problems = Vec::new();

        if let Err(e) = self.store.update_log(log_id, &LogUpdate::sent(sent_at)).await {
            problems.push(format!("send log {} not marked SENT: {}", log_id, e));
        }
        if let Err(e) = self.store.mark_sent(lead.id, sent_at).await {
            problems.push(format!("lead not flagged as emailed: {}", e));
        }

        if problems.is_empty() {
            return None;
        }

        let detail = problems.join("; ");
        self.reporter.emit(ProgressEvent::ReconciliationRequired {
            run_id: ctx.run_id.clone(),
            lead_id: lead.id,
            detail: detail.clone(),
        });
        Some(detail)
    }

    async fn write_back_failure(&self, lead: &Lead, log_id: LogId, error: &str, ctx: &RunContext) {
        if let Err(e) = self.store.update_log(log_id, &LogUpdate::failed(error)).await {
            log::error!(
                "[{}] Send log {} for lead {} not marked FAILED_TO_SEND: {}",
                ctx.run_id, log_id, lead.id, e
            );
        }

        if !self.settings.retry_failed_leads {
            if let Err(e) = self.store.mark_failed(lead.id, Utc::now()).await {
                log::error!(
                    "[{}] Lead {} not flagged as permanently failed: {}",
                    ctx.run_id, lead.id, e
                );
            }
        }
    }

    /// Render `lead` as `sender` and deliver to `recipient`; nothing is logged to the store
    pub async fn send_test(
        &self,
        recipient: &str,
        lead: &Lead,
        sender: &SenderIdentity,
        templates: &RunTemplates,
    ) -> Result<SendReceipt> {
        if !is_valid_email(recipient) {
            return Err(OutreachError::Validation(format!("Invalid test recipient: {}", recipient)));
        }

        let message = self.render(lead, sender, templates);

        let attachment = match &templates.letter_template {
            Some(template) => match self.documents.render(template, &message.data.to_json()).await {
                Ok(content) => Some(EmailAttachment {
                    filename: letter_filename(lead.property_address.as_deref()),
                    content_type: PDF_CONTENT_TYPE.to_string(),
                    content,
                }),
                Err(e) => {
                    log::warn!(
                        "Test email: letter generation failed, sending without attachment: {}",
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let envelope = Envelope {
            to: recipient.trim().to_string(),
            from: sender.clone(),
            subject: message.subject,
            html_body: message.body,
            attachment,
            inline_assets: templates.branding.iter().cloned().collect(),
        };

        let session = self.transport.authenticate(sender).await?;
        self.transport.send(&session, &envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_letter_filename_is_sanitized() {
        assert_eq!(letter_filename(Some("12 Main St, #4")), "LETTER_OF_INTENT_12_Main_St___4.pdf");
        assert_eq!(letter_filename(None), "LETTER_OF_INTENT_Unknown_Address.pdf");

        let long = "a".repeat(80);
        let name = letter_filename(Some(&long));
        assert_eq!(name.len(), "LETTER_OF_INTENT_.pdf".len() + 50);
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type("logo.PNG"), "image/png");
        assert_eq!(image_content_type("logo.jpeg"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_temp_document_round_trip_and_removal() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("temp_pdfs");

        let document = TempDocument::stage(&staging, 42, "LETTER_OF_INTENT_x.pdf", b"%PDF")
            .await
            .unwrap();
        assert!(document.path().exists());
        assert!(document.path().ends_with("42_LETTER_OF_INTENT_x.pdf"));

        let attachment = document.read_attachment().await.unwrap();
        assert_eq!(attachment.filename, "LETTER_OF_INTENT_x.pdf");
        assert_eq!(attachment.content, b"%PDF");

        let path = document.path().to_path_buf();
        document.remove().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stage_failure_leaves_no_document() {
        let dir = TempDir::new().unwrap();
        let staging = dir.path().join("temp_pdfs");
        // A directory in the way makes the write fail
        std::fs::create_dir_all(staging.join("7_LETTER_OF_INTENT_x.pdf")).unwrap();

        let result = TempDocument::stage(&staging, 7, "LETTER_OF_INTENT_x.pdf", b"%PDF").await;
        assert!(matches!(result, Err(OutreachError::Io(_))));

        let files: Vec<_> = std::fs::read_dir(&staging)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .collect();
        assert!(files.is_empty());
    }
}
