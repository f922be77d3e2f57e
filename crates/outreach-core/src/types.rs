//! Common types used throughout the outreach engine

use crate::services::currency::parse_currency;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use chrono::{DateTime, Utc};
use outreach_types::SendStatus;

pub type LeadId = i64;
pub type LogId = i64;

/// Property lead as returned by the leads table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    #[serde(default)]
    pub normalized_lead_id: Option<i64>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub property_address: Option<String>,
    #[serde(default)]
    pub property_city: Option<String>,
    #[serde(default)]
    pub property_state: Option<String>,
    #[serde(default)]
    pub property_postal_code: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub beds: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub baths: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub year_built: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub square_footage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub assessed_total: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub wholesale_value: Option<f64>,
    #[serde(default)]
    pub market_region: Option<String>,
    /// null: never attempted, true: emailed, false: permanently failed
    #[serde(default)]
    pub email_sent: Option<bool>,
}

impl Lead {
    pub fn contact_email(&self) -> &str {
        self.contact_email.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn contact_name(&self) -> &str {
        self.contact_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(crate::constants::DEFAULT_CONTACT_NAME)
    }

    pub fn already_emailed(&self) -> bool {
        self.email_sent == Some(true)
    }
}

/// Accept numbers, numeric strings and currency strings like "$1,234.50"
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => parse_currency(&s),
        _ => None,
    })
}

/// Whole numbers go out as integers so integer columns accept them
fn compact_number<S>(value: &Option<f64>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => serializer.serialize_some(&(*v as i64)),
        Some(v) => serializer.serialize_some(v),
        None => serializer.serialize_none(),
    }
}

/// Email persona used to send on behalf of the company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub name: String,
    pub email: String,
}

impl SenderIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Case-insensitive comparison on the address
    pub fn matches_email(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }
}

/// Row written to the send log before any transport call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendLogEntry {
    pub original_lead_id: Option<i64>,
    pub contact_name: String,
    pub contact_email: String,

    // Snapshot of the lead at send time
    #[serde(serialize_with = "compact_number")]
    pub beds: Option<f64>,
    #[serde(serialize_with = "compact_number")]
    pub baths: Option<f64>,
    #[serde(serialize_with = "compact_number")]
    pub year_built: Option<f64>,
    #[serde(serialize_with = "compact_number")]
    pub square_footage: Option<f64>,
    pub property_address: Option<String>,
    pub property_city: Option<String>,
    pub property_state: Option<String>,
    pub property_postal_code: Option<String>,
    pub property_type: Option<String>,
    #[serde(serialize_with = "compact_number")]
    pub assessed_total: Option<f64>,
    pub market_region: Option<String>,

    pub sender_name: String,
    pub sender_email_used: String,
    pub email_subject_sent: String,
    pub email_body_preview_sent: String,
    pub email_status: SendStatus,
    pub email_error_message: Option<String>,
    pub email_sent_at: Option<DateTime<Utc>>,

    pub campaign_id: Option<String>,
    pub campaign_run_id: Option<String>,

    pub converted: bool,
}

impl SendLogEntry {
    /// Build a PENDING_SEND row for a lead
    pub fn pending(
        lead: &Lead,
        sender: &SenderIdentity,
        subject: &str,
        body_preview: String,
        campaign_id: Option<String>,
        campaign_run_id: Option<String>,
    ) -> Self {
        Self {
            original_lead_id: lead.normalized_lead_id,
            contact_name: lead.contact_name().to_string(),
            contact_email: lead.contact_email().to_string(),
            beds: lead.beds,
            baths: lead.baths,
            year_built: lead.year_built,
            square_footage: lead.square_footage,
            property_address: lead.property_address.clone(),
            property_city: lead.property_city.clone(),
            property_state: lead.property_state.clone(),
            property_postal_code: lead.property_postal_code.clone(),
            property_type: lead.property_type.clone(),
            assessed_total: lead.assessed_total,
            market_region: lead.market_region.clone(),
            sender_name: sender.name.clone(),
            sender_email_used: sender.email.clone(),
            email_subject_sent: subject.to_string(),
            email_body_preview_sent: body_preview,
            email_status: SendStatus::PendingSend,
            email_error_message: None,
            email_sent_at: None,
            campaign_id,
            campaign_run_id,
            converted: false,
        }
    }
}

/// Terminal update applied to a send log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogUpdate {
    pub email_status: SendStatus,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub email_error_message: Option<String>,
}

impl LogUpdate {
    pub fn sent(at: DateTime<Utc>) -> Self {
        Self {
            email_status: SendStatus::Sent,
            email_sent_at: Some(at),
            email_error_message: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            email_status: SendStatus::FailedToSend,
            email_sent_at: None,
            email_error_message: Some(error.into()),
        }
    }
}

/// File attached to an outgoing email
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Image embedded in the HTML body and referenced by Content-ID
#[derive(Debug, Clone)]
pub struct InlineAsset {
    pub content_id: String,
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Fully personalized message handed to the transport
#[derive(Debug, Clone)]
pub struct Envelope {
    pub to: String,
    pub from: SenderIdentity,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<EmailAttachment>,
    pub inline_assets: Vec<InlineAsset>,
}

/// Authenticated right to send as one identity
#[derive(Debug, Clone)]
pub struct MailSession {
    pub identity: SenderIdentity,
    pub authenticated_at: DateTime<Utc>,
}

/// Transport acknowledgement for a delivered message
#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}
