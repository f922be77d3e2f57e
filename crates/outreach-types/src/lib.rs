//! Shared types for the outreach campaign engine

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Request to start one campaign run against a market region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignTrigger {
    pub trigger_id: String,
    pub market_region: String,
    /// Restrict sending to this identity instead of rotating through the pool
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub campaign_run_id: Option<String>,
    /// Maximum leads fetched for this run; falls back to the configured leads-per-run
    #[serde(default)]
    pub limit: Option<u32>,
    pub requested_at: DateTime<Utc>,
}

impl CampaignTrigger {
    /// Create a new campaign trigger for a region
    pub fn new(market_region: impl Into<String>, limit: Option<u32>) -> Self {
        Self {
            trigger_id: Uuid::new_v4().to_string(),
            market_region: market_region.into(),
            sender_email: None,
            campaign_id: None,
            campaign_run_id: None,
            limit,
            requested_at: Utc::now(),
        }
    }

    pub fn with_sender(mut self, sender_email: impl Into<String>) -> Self {
        self.sender_email = Some(sender_email.into());
        self
    }

    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.campaign_run_id = Some(run_id.into());
        self
    }
}

/// Request to stop an active run, matched against run id or campaign id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRequest {
    pub target: String,
    #[serde(default = "Utc::now")]
    pub requested_at: DateTime<Utc>,
}

/// Status of a send log row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    PendingSend,
    Sent,
    FailedToSend,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStatus::PendingSend => "PENDING_SEND",
            SendStatus::Sent => "SENT",
            SendStatus::FailedToSend => "FAILED_TO_SEND",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SendStatus::PendingSend)
    }
}

/// Terminal state of one lead within a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeadResult {
    Skipped,
    Sent,
    Failed,
}

/// Per-run results tally
///
/// `succeeded + failed + skipped == attempted` holds whenever the tally is read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunTally {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl RunTally {
    pub fn is_consistent(&self) -> bool {
        self.succeeded + self.failed + self.skipped == self.attempted
    }
}

/// Why a run stopped processing leads
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunEnd {
    /// Every fetched lead was processed
    Drained,
    /// No eligible leads were returned by the store
    NoLeads,
    /// A stop was requested
    Stopped,
    /// No sender identity had capacity left
    CapExhausted,
}

/// Final summary of a campaign run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub campaign_id: Option<String>,
    pub market_region: String,
    pub tally: RunTally,
    pub end: RunEnd,
    /// Leads whose email went out but whose store bookkeeping failed
    pub needs_reconciliation: Vec<i64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// Event pushed to progress observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Log {
        run_id: Option<String>,
        level: EventLevel,
        message: String,
        at: DateTime<Utc>,
    },
    LeadFinished {
        run_id: String,
        lead_id: i64,
        result: LeadResult,
        error: Option<String>,
    },
    Tally {
        run_id: String,
        tally: RunTally,
    },
    ReconciliationRequired {
        run_id: String,
        lead_id: i64,
        detail: String,
    },
    RunCompleted {
        summary: RunSummary,
    },
    RunFailed {
        run_id: String,
        error: String,
    },
}

impl ProgressEvent {
    pub fn run_id(&self) -> Option<&str> {
        match self {
            ProgressEvent::Log { run_id, .. } => run_id.as_deref(),
            ProgressEvent::LeadFinished { run_id, .. }
            | ProgressEvent::Tally { run_id, .. }
            | ProgressEvent::ReconciliationRequired { run_id, .. }
            | ProgressEvent::RunFailed { run_id, .. } => Some(run_id),
            ProgressEvent::RunCompleted { summary } => Some(&summary.run_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_status_wire_names() {
        assert_eq!(serde_json::to_string(&SendStatus::PendingSend).unwrap(), "\"PENDING_SEND\"");
        assert_eq!(serde_json::to_string(&SendStatus::FailedToSend).unwrap(), "\"FAILED_TO_SEND\"");
        assert_eq!(SendStatus::Sent.as_str(), "SENT");
        assert!(!SendStatus::PendingSend.is_terminal());
    }

    #[test]
    fn test_trigger_defaults_from_minimal_json() {
        let json = r#"{
            "trigger_id": "t-1",
            "market_region": "Austin",
            "requested_at": "2024-05-01T10:00:00Z"
        }"#;
        let trigger: CampaignTrigger = serde_json::from_str(json).unwrap();
        assert_eq!(trigger.market_region, "Austin");
        assert!(trigger.sender_email.is_none());
        assert!(trigger.limit.is_none());
    }

    #[test]
    fn test_tally_consistency() {
        let tally = RunTally { attempted: 3, succeeded: 1, failed: 1, skipped: 1 };
        assert!(tally.is_consistent());
        assert!(!RunTally { attempted: 2, ..tally }.is_consistent());
    }

    #[test]
    fn test_progress_event_is_tagged() {
        let event = ProgressEvent::RunFailed { run_id: "r".into(), error: "boom".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "run_failed");
        assert_eq!(event.run_id(), Some("r"));
    }
}
