//! SMTP mail transport using lettre

use crate::campaign::traits::MailTransport;
use crate::config::SmtpConfig;
use crate::error::{OutreachError, Result};
use crate::types::{EmailAttachment, Envelope, InlineAsset, MailSession, SendReceipt, SenderIdentity};
use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Relays every sender identity through one SMTP account
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    verify_on_authenticate: bool,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = match config.tls.as_str() {
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| invalid_relay(&config.host, e))?,
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| invalid_relay(&config.host, e))?,
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            verify_on_authenticate: config.verify_on_authenticate,
        })
    }

    fn mailbox(identity: &SenderIdentity) -> Result<Mailbox> {
        let address: Address = identity
            .email
            .parse()
            .map_err(|_| OutreachError::Auth(format!("Invalid sender address: {}", identity.email)))?;
        Ok(Mailbox::new(Some(identity.name.clone()), address))
    }

    /// Build the MIME message: HTML body with inline images, plus the optional letter
    pub fn build_message(envelope: &Envelope) -> Result<Message> {
        let from = Self::mailbox(&envelope.from)?;
        let to: Mailbox = envelope
            .to
            .parse()
            .map_err(|_| {
                OutreachError::Validation(format!("Invalid recipient address: {}", envelope.to))
            })?;

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(envelope.subject.clone());

        let html = SinglePart::html(envelope.html_body.clone());

        let content = if envelope.inline_assets.is_empty() {
            MultiPart::alternative().singlepart(html)
        } else {
            let mut related = MultiPart::related().singlepart(html);
            for asset in &envelope.inline_assets {
                related = related.singlepart(inline_part(asset)?);
            }
            related
        };

        let message = match &envelope.attachment {
            Some(attachment) => builder.multipart(
                MultiPart::mixed()
                    .multipart(content)
                    .singlepart(attachment_part(attachment)?),
            ),
            None => builder.multipart(content),
        };

        message.map_err(|e| OutreachError::Transport(format!("Failed to build message: {}", e)))
    }
}

fn content_type(raw: &str) -> Result<ContentType> {
    ContentType::parse(raw)
        .map_err(|e| OutreachError::Transport(format!("Invalid content type {}: {}", raw, e)))
}

fn inline_part(asset: &InlineAsset) -> Result<SinglePart> {
    Ok(Attachment::new_inline(asset.content_id.clone())
        .body(asset.content.clone(), content_type(&asset.content_type)?))
}

fn attachment_part(attachment: &EmailAttachment) -> Result<SinglePart> {
    Ok(Attachment::new(attachment.filename.clone())
        .body(attachment.content.clone(), content_type(&attachment.content_type)?))
}

fn invalid_relay(host: &str, e: lettre::transport::smtp::Error) -> OutreachError {
    OutreachError::Config(format!("Invalid SMTP relay {}: {}", host, e))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn authenticate(&self, identity: &SenderIdentity) -> Result<MailSession> {
        Self::mailbox(identity)?;

        if self.verify_on_authenticate {
            let reachable = self.transport
                .test_connection()
                .await
                .map_err(|e| {
                    OutreachError::Auth(format!("SMTP login for {} failed: {}", identity.email, e))
                })?;
            if !reachable {
                return Err(OutreachError::Auth(format!(
                    "SMTP relay refused session for {}",
                    identity.email
                )));
            }
        }

        Ok(MailSession {
            identity: identity.clone(),
            authenticated_at: Utc::now(),
        })
    }

    async fn send(&self, session: &MailSession, envelope: &Envelope) -> Result<SendReceipt> {
        if !session.identity.matches_email(&envelope.from.email) {
            return Err(OutreachError::Auth(format!(
                "Session for {} cannot send as {}",
                session.identity.email, envelope.from.email
            )));
        }

        let message = Self::build_message(envelope)?;
        let response = self.transport
            .send(message)
            .await
            .map_err(|e| OutreachError::Transport(e.to_string()))?;

        Ok(SendReceipt {
            message_id: response.first_line().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> Envelope {
        Envelope {
            to: "owner@example.com".to_string(),
            from: SenderIdentity::new("Jane Doe", "jane@company.com"),
            subject: "Regarding Your Property".to_string(),
            html_body: "<p>Hello</p><img src=\"cid:company_logo\">".to_string(),
            attachment: None,
            inline_assets: vec![],
        }
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).to_string()
    }

    #[test]
    fn test_build_message_with_attachment_and_logo() {
        let mut envelope = envelope();
        envelope.attachment = Some(EmailAttachment {
            filename: "LETTER_OF_INTENT_12_Main_St.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            content: b"%PDF-1.4".to_vec(),
        });
        envelope.inline_assets.push(InlineAsset {
            content_id: "company_logo".to_string(),
            filename: "company_logo.png".to_string(),
            content_type: "image/png".to_string(),
            content: vec![0x89, 0x50, 0x4e, 0x47],
        });

        let text = formatted(&SmtpMailer::build_message(&envelope).unwrap());
        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("multipart/related"));
        assert!(text.contains("Content-ID: <company_logo>"));
        assert!(text.contains("LETTER_OF_INTENT_12_Main_St.pdf"));
        assert!(text.contains("Subject: Regarding Your Property"));
    }

    #[test]
    fn test_build_message_rejects_bad_recipient() {
        let mut envelope = envelope();
        envelope.to = "not an address".to_string();
        assert!(matches!(SmtpMailer::build_message(&envelope), Err(OutreachError::Validation(_))));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_invalid_identity() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            tls: "none".to_string(),
            timeout_secs: 1,
            verify_on_authenticate: false,
        };
        let mailer = SmtpMailer::new(&config).unwrap();

        let ok = mailer.authenticate(&SenderIdentity::new("Jane", "jane@company.com")).await;
        assert!(ok.is_ok());

        let bad = mailer.authenticate(&SenderIdentity::new("Jane", "jane-at-company")).await;
        assert!(matches!(bad, Err(OutreachError::Auth(_))));
    }
}
