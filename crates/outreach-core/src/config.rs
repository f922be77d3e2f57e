//! Configuration management for the outreach engine

use crate::constants::*;
use crate::error::{OutreachError, Result};
use crate::services::email_validator::is_valid_email;
use serde::{Deserialize, Serialize};
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use std::time::Duration;

/// Environment variables with this prefix override file values,
/// e.g. `OUTREACH_CAMPAIGN__MAX_SENDER_EMAILS_PER_DAY=50`
pub const ENV_PREFIX: &str = "OUTREACH";

/// Raw configuration structure matching outreach.json
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    pub supabase: Option<SupabaseConfig>,

    pub smtp: SmtpConfig,

    #[serde(default = "default_pdf_service")]
    pub pdf_service: PdfServiceConfig,

    #[serde(default)]
    pub campaign: CampaignLimits,

    #[serde(default)]
    pub templates: TemplateConfig,

    #[serde(default)]
    pub senders: Vec<SenderRecord>,

    #[serde(default)]
    pub safety: SafetyConfig,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachConfig {
    /// `None` when the store credentials are absent; runs then fail with `StoreNotConfigured`
    pub supabase: Option<SupabaseConfig>,
    pub smtp: SmtpConfig,
    pub pdf_service: PdfServiceConfig,
    pub campaign: CampaignLimits,
    pub templates: TemplateConfig,
    pub senders: Vec<SenderRecord>,
    pub safety: SafetyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    #[serde(alias = "base_url")]
    pub url: String,

    #[serde(alias = "key", alias = "service_key")]
    pub service_role_key: String,

    #[serde(default = "default_leads_table")]
    pub leads_table: String,

    #[serde(default = "default_log_table")]
    pub log_table: String,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_leads_table() -> String {
    "useful_leads".to_string()
}

fn default_log_table() -> String {
    "eli5_email_log".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(alias = "smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// "starttls", "tls" or "none"
    #[serde(default = "default_smtp_tls")]
    pub tls: String,

    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,

    /// Probe the relay when a sender identity is authenticated
    #[serde(default)]
    pub verify_on_authenticate: bool,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> String {
    "starttls".to_string()
}

fn default_smtp_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfServiceConfig {
    pub base_url: String,

    #[serde(default = "default_pdf_timeout")]
    pub timeout_secs: u64,
}

fn default_pdf_service() -> PdfServiceConfig {
    PdfServiceConfig {
        base_url: "http://localhost:8000".to_string(),
        timeout_secs: default_pdf_timeout(),
    }
}

fn default_pdf_timeout() -> u64 {
    60
}

/// Daily caps, pacing window and batch size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignLimits {
    #[serde(default = "default_max_campaign")]
    pub max_campaign_emails_per_day: u32,

    #[serde(default = "default_max_sender")]
    pub max_sender_emails_per_day: u32,

    #[serde(default = "default_min_interval")]
    pub min_send_interval_seconds: u64,

    #[serde(default = "default_max_interval")]
    pub max_send_interval_seconds: u64,

    #[serde(default = "default_leads_per_run")]
    pub leads_per_run: u32,

    /// Leave failed leads eligible for later runs; when false they are marked permanently failed
    #[serde(default = "default_retry_failed")]
    pub retry_failed_leads: bool,

    #[serde(default = "default_excluded_property_type")]
    pub excluded_property_type: String,
}

fn default_max_campaign() -> u32 {
    DEFAULT_MAX_CAMPAIGN_EMAILS_PER_DAY
}

fn default_max_sender() -> u32 {
    DEFAULT_MAX_SENDER_EMAILS_PER_DAY
}

fn default_min_interval() -> u64 {
    DEFAULT_MIN_SEND_INTERVAL_SECONDS
}

fn default_max_interval() -> u64 {
    DEFAULT_MAX_SEND_INTERVAL_SECONDS
}

fn default_leads_per_run() -> u32 {
    DEFAULT_LEADS_PER_RUN
}

fn default_retry_failed() -> bool {
    true
}

fn default_excluded_property_type() -> String {
    DEFAULT_EXCLUDED_PROPERTY_TYPE.to_string()
}

impl Default for CampaignLimits {
    fn default() -> Self {
        Self {
            max_campaign_emails_per_day: default_max_campaign(),
            max_sender_emails_per_day: default_max_sender(),
            min_send_interval_seconds: default_min_interval(),
            max_send_interval_seconds: default_max_interval(),
            leads_per_run: default_leads_per_run(),
            retry_failed_leads: default_retry_failed(),
            excluded_property_type: default_excluded_property_type(),
        }
    }
}

impl CampaignLimits {
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_secs(self.min_send_interval_seconds)
    }

    pub fn max_send_interval(&self) -> Duration {
        Duration::from_secs(self.max_send_interval_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// HTML email body, optionally carrying a `<!-- SUBJECT: ... -->` marker
    #[serde(default = "default_email_template")]
    pub email_template: String,

    /// Letter of intent template handed to the PDF service; `null` disables the attachment
    #[serde(default = "default_letter_template")]
    pub letter_template: Option<String>,

    /// Inline image embedded as `cid:company_logo`
    #[serde(default = "default_branding_image")]
    pub branding_image: Option<String>,

    #[serde(default = "default_subject")]
    pub default_subject: String,
}

fn default_email_template() -> String {
    "email_body_with_subject.html".to_string()
}

fn default_letter_template() -> Option<String> {
    Some("letter_of_intent_text.html".to_string())
}

fn default_branding_image() -> Option<String> {
    Some("company_logo.png".to_string())
}

fn default_subject() -> String {
    DEFAULT_EMAIL_SUBJECT.to_string()
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            email_template: default_email_template(),
            letter_template: default_letter_template(),
            branding_image: default_branding_image(),
            default_subject: default_subject(),
        }
    }
}

/// Sender identity as written in configuration; incomplete rows are dropped by the pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderRecord {
    #[serde(default, alias = "sender_name")]
    pub name: Option<String>,

    #[serde(default, alias = "sender_email")]
    pub email: Option<String>,
}

impl SenderRecord {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Deliver every email to this address instead of the lead's contact
    #[serde(default)]
    pub redirect_to: Option<String>,
}

impl OutreachConfig {
    /// Load configuration from a JSON file, applying `OUTREACH_*` environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OutreachError::Config(format!(
                "Failed to read config file: {} does not exist",
                path.display()
            )));
        }

        let builder = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::load(builder)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let builder = Config::builder().add_source(File::from_str(json, FileFormat::Json));
        Self::load(builder)
    }

    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let raw_config: RawConfig = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| OutreachError::Config(format!("Failed to parse config: {}", e)))?;

        let config = Self::from_raw_config(raw_config);
        config.validate()?;
        Ok(config)
    }

    /// Convert raw config to structured config
    fn from_raw_config(raw: RawConfig) -> Self {
        // Blank credentials mean the store was never set up
        let supabase = raw.supabase.filter(|store| {
            !store.url.trim().is_empty() && !store.service_role_key.trim().is_empty()
        });

        let safety = SafetyConfig {
            redirect_to: raw
                .safety
                .redirect_to
                .map(|address| address.trim().to_string())
                .filter(|address| !address.is_empty()),
        };

        Self {
            supabase,
            smtp: raw.smtp,
            pdf_service: raw.pdf_service,
            campaign: raw.campaign,
            templates: raw.templates,
            senders: raw.senders,
            safety,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.smtp.host.trim().is_empty() {
            return Err(OutreachError::Config("SMTP host is required".to_string()));
        }

        if self.senders.is_empty() {
            return Err(OutreachError::Config(
                "At least one sender identity is required".to_string()
            ));
        }

        if self.templates.email_template.trim().is_empty() {
            return Err(OutreachError::Config("Email template name is required".to_string()));
        }

        let limits = &self.campaign;
        if limits.max_campaign_emails_per_day == 0 || limits.max_sender_emails_per_day == 0 {
            return Err(OutreachError::Config(
                "Daily send caps are required to be greater than zero".to_string()
            ));
        }

        if limits.min_send_interval_seconds > limits.max_send_interval_seconds {
            return Err(OutreachError::Config(format!(
                "Minimum send interval ({}s) is required to be at most the maximum ({}s)",
                limits.min_send_interval_seconds, limits.max_send_interval_seconds
            )));
        }

        if limits.leads_per_run == 0 {
            return Err(OutreachError::Config("leads_per_run is required to be at least 1".to_string()));
        }

        if let Some(redirect) = &self.safety.redirect_to {
            if !is_valid_email(redirect) {
                return Err(OutreachError::Config(format!(
                    "Safety redirect address '{}' is invalid; a valid address is required",
                    redirect
                )));
            }
        }

        Ok(())
    }
}
