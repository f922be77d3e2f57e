//! Outreach Core Library
//!
//! Send-rate governor and per-lead pipeline for cold-outreach email
//! campaigns: lead fetching, personalization, letter generation, SMTP
//! delivery and send-log bookkeeping.

pub mod campaign;
pub mod clients;
pub mod config;
pub mod constants;
pub mod error;
pub mod paths;
pub mod services;
pub mod types;

// Re-export main types for easy access
pub use config::OutreachConfig;
pub use error::{OutreachError, Result};

pub use clients::{FileTemplateSource, PdfService, SmtpMailer, SupabaseClient};

pub use services::{EmailTemplate, PersonalizationData, TemplateRenderer};

pub use campaign::{
    CampaignRunner,
    Collaborators,
    DocumentGenerator,
    LeadStore,
    MailTransport,
    Pacer,
    ProgressReporter,
    SendGovernor,
    TemplateSource,
};

pub use types::{Envelope, Lead, LogUpdate, MailSession, SendLogEntry, SendReceipt, SenderIdentity};
