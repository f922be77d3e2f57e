//! Collaborator traits for the campaign engine
//!
//! Every external dependency of a run sits behind one of these traits so the
//! governor and pipeline can be driven by hand-written mocks in tests.

use crate::error::Result;
use crate::services::EmailTemplate;
use crate::types::{
    Envelope, Lead, LeadId, LogId, LogUpdate, MailSession, SendLogEntry, SendReceipt,
    SenderIdentity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Typed access to the leads table and the send log
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Leads in `region` never emailed, with a contact email, and not of the excluded property type
    async fn fetch_eligible(&self, region: &str, limit: u32) -> Result<Vec<Lead>>;

    /// Set the lead's emailed flag to true
    async fn mark_sent(&self, lead_id: LeadId, at: DateTime<Utc>) -> Result<()>;

    /// Set the lead's emailed flag to false; used only when retries are disabled
    async fn mark_failed(&self, lead_id: LeadId, at: DateTime<Utc>) -> Result<()>;

    async fn insert_log(&self, entry: &SendLogEntry) -> Result<LogId>;

    async fn update_log(&self, log_id: LogId, update: &LogUpdate) -> Result<()>;

    /// Any eligible lead, used to render test emails
    async fn sample_lead(&self) -> Result<Option<Lead>>;

    /// Distinct non-empty market regions, sorted
    async fn market_regions(&self) -> Result<Vec<String>>;
}

/// Opaque producer of the letter attachment
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn render(&self, template_name: &str, data: &Value) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn authenticate(&self, identity: &SenderIdentity) -> Result<MailSession>;

    async fn send(&self, session: &MailSession, envelope: &Envelope) -> Result<SendReceipt>;
}

#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Load and parse an email template
    async fn load(&self, name: &str) -> Result<EmailTemplate>;

    /// Raw bytes of an asset such as the branding image
    async fn load_bytes(&self, name: &str) -> Result<Vec<u8>>;
}
