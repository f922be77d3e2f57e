//! Supabase (PostgREST) client for leads and the send log

use crate::campaign::traits::LeadStore;
use crate::config::SupabaseConfig;
use crate::error::{OutreachError, Result};
use crate::types::{Lead, LeadId, LogId, LogUpdate, SendLogEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;

pub struct SupabaseClient {
    config: Option<SupabaseConfig>,
    excluded_property_type: String,
    http_client: HttpClient,
}

impl SupabaseClient {
    /// A missing config yields a client whose every call fails with `StoreNotConfigured`
    pub fn new(config: Option<SupabaseConfig>, excluded_property_type: impl Into<String>) -> Result<Self> {
        let timeout = config.as_ref().map(|c| c.timeout_secs).unwrap_or(30);
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            config,
            excluded_property_type: excluded_property_type.into(),
            http_client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&SupabaseConfig> {
        self.config.as_ref().ok_or(OutreachError::StoreNotConfigured)
    }

    fn table_url(&self, table: &str) -> Result<String> {
        let config = self.config()?;
        Ok(format!("{}/rest/v1/{}", config.url.trim_end_matches('/'), table))
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let config = self.config()?;
        Ok(request
            .header("apikey", &config.service_role_key)
            .bearer_auth(&config.service_role_key))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorized(request)?.send().await.map_err(classify)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            if status.is_server_error() {
                return Err(OutreachError::StoreUnavailable(format!("{} - {}", status, error_text)));
            }
            return Err(OutreachError::Store(format!("{} - {}", status, error_text)));
        }

        Ok(response)
    }

    async fn set_email_flag(&self, lead_id: LeadId, sent: bool, at: DateTime<Utc>) -> Result<()> {
        let url = self.table_url(&self.config()?.leads_table)?;
        let request = self.http_client
            .patch(&url)
            .query(&[("id", format!("eq.{}", lead_id))])
            .json(&json!({
                "email_sent": sent,
                "updated_at": at.to_rfc3339(),
            }));

        self.execute(request).await?;
        Ok(())
    }
}

// Connection-level failures are reported as an unreachable store
fn classify(error: reqwest::Error) -> OutreachError {
    if error.is_connect() || error.is_timeout() {
        OutreachError::StoreUnavailable(error.to_string())
    } else {
        OutreachError::Http(error)
    }
}

#[async_trait]
impl LeadStore for SupabaseClient {
    async fn fetch_eligible(&self, region: &str, limit: u32) -> Result<Vec<Lead>> {
        let url = self.table_url(&self.config()?.leads_table)?;
        let request = self.http_client
            .get(&url)
            .query(&[
                ("select", "*".to_string()),
                ("market_region", format!("eq.{}", region)),
                ("email_sent", "is.null".to_string()),
                ("contact_email", "not.is.null".to_string()),
                ("property_type", format!("neq.{}", self.excluded_property_type)),
                ("order", "id.asc".to_string()),
                ("limit", limit.to_string()),
            ]);

        let leads: Vec<Lead> = self.execute(request).await?.json().await?;
        log::debug!("Fetched {} eligible leads for region '{}'", leads.len(), region);
        Ok(leads)
    }

    async fn mark_sent(&self, lead_id: LeadId, at: DateTime<Utc>) -> Result<()> {
        self.set_email_flag(lead_id, true, at).await
    }

    async fn mark_failed(&self, lead_id: LeadId, at: DateTime<Utc>) -> Result<()> {
        self.set_email_flag(lead_id, false, at).await
    }

    async fn insert_log(&self, entry: &SendLogEntry) -> Result<LogId> {
        let url = self.table_url(&self.config()?.log_table)?;
        let request = self.http_client
            .post(&url)
            .header("Prefer", "return=representation")
            .json(entry);

        let rows: Vec<Value> = self.execute(request).await?.json().await?;
        rows.first()
            .and_then(|row| row["id"].as_i64())
            .ok_or_else(|| OutreachError::Store("Log insert returned no id".to_string()))
    }

    async fn update_log(&self, log_id: LogId, update: &LogUpdate) -> Result<()> {
        let url = self.table_url(&self.config()?.log_table)?;
        let request = self.http_client
            .patch(&url)
            .query(&[("id", format!("eq.{}", log_id))])
            .json(update);

        self.execute(request).await?;
        Ok(())
    }

    async fn sample_lead(&self) -> Result<Option<Lead>> {
        let url = self.table_url(&self.config()?.leads_table)?;
        let request = self.http_client
            .get(&url)
            .query(&[
                ("select", "*"),
                ("contact_email", "not.is.null"),
                ("limit", "1"),
            ]);

        let leads: Vec<Lead> = self.execute(request).await?.json().await?;
        Ok(leads.into_iter().next())
    }

    async fn market_regions(&self) -> Result<Vec<String>> {
        let url = self.table_url(&self.config()?.leads_table)?;
        let request = self.http_client
            .get(&url)
            .query(&[
                ("select", "market_region"),
                ("market_region", "not.is.null"),
            ]);

        let rows: Vec<Value> = self.execute(request).await?.json().await?;
        Ok(distinct_regions(&rows))
    }
}

fn distinct_regions(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row["market_region"].as_str())
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_store_reports_not_configured() {
        let client = SupabaseClient::new(None, "Vacant Land").unwrap();
        assert!(!client.is_configured());

        let result = client.fetch_eligible("Austin", 10).await;
        assert!(matches!(result, Err(OutreachError::StoreNotConfigured)));

        let result = client.market_regions().await;
        assert!(matches!(result, Err(OutreachError::StoreNotConfigured)));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_unavailable() {
        let config = SupabaseConfig {
            url: "http://127.0.0.1:9".to_string(),
            service_role_key: "key".to_string(),
            leads_table: "useful_leads".to_string(),
            log_table: "eli5_email_log".to_string(),
            timeout_secs: 2,
        };
        let client = SupabaseClient::new(Some(config), "Vacant Land").unwrap();

        let result = client.fetch_eligible("Austin", 10).await;
        assert!(matches!(result, Err(OutreachError::StoreUnavailable(_))));
    }

    #[test]
    fn test_distinct_regions_sorted_and_trimmed() {
        let rows = vec![
            json!({"market_region": "Tampa"}),
            json!({"market_region": " Austin "}),
            json!({"market_region": ""}),
            json!({"market_region": null}),
            json!({"market_region": "Tampa"}),
        ];
        assert_eq!(distinct_regions(&rows), vec!["Austin".to_string(), "Tampa".to_string()]);
    }
}
