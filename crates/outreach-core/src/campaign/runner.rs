//! Campaign runner: drives one run from lead fetch to summary

use crate::clients::{FileTemplateSource, PdfService, SmtpMailer, SupabaseClient};
use crate::config::{OutreachConfig, TemplateConfig};
use crate::error::{OutreachError, Result};
use crate::paths;
use crate::types::{Lead, LeadId, SendReceipt};
use super::governor::SendGovernor;
use super::pacer::{PaceOutcome, Pacer};
use super::pipeline::{LeadPipeline, PipelineSettings, RunContext, RunTemplates};
use super::progress::ProgressReporter;
use super::sender_pool::SenderPool;
use super::traits::{DocumentGenerator, LeadStore, MailTransport, TemplateSource};
use chrono::{DateTime, Utc};
use outreach_types::{CampaignTrigger, LeadResult, ProgressEvent, RunEnd, RunSummary};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// External services a runner talks to
pub struct Collaborators {
    pub store: Arc<dyn LeadStore>,
    pub documents: Arc<dyn DocumentGenerator>,
    pub transport: Arc<dyn MailTransport>,
    pub templates: Arc<dyn TemplateSource>,
}

struct ActiveRun {
    campaign_id: Option<String>,
    cancel: CancellationToken,
}

/// Why the lead loop ended early, if it did
enum LoopExit {
    Drained,
    Stopped,
    CapExhausted,
}

pub struct CampaignRunner {
    store: Arc<dyn LeadStore>,
    templates: Arc<dyn TemplateSource>,
    template_config: TemplateConfig,
    pipeline: LeadPipeline,
    governor: Arc<SendGovernor>,
    pacer: Pacer,
    reporter: ProgressReporter,
    leads_per_run: u32,
    shutdown: CancellationToken,
    active: Mutex<HashMap<String, ActiveRun>>,
}

impl CampaignRunner {
    pub fn new(collaborators: Collaborators, config: &OutreachConfig, temp_dir: PathBuf) -> Self {
        let reporter = ProgressReporter::new();
        let pool = SenderPool::from_records(&config.senders);
        let governor = Arc::new(SendGovernor::new(&config.campaign, pool));

        let pipeline = LeadPipeline::new(
            collaborators.store.clone(),
            collaborators.documents,
            collaborators.transport,
            governor.clone(),
            reporter.clone(),
            PipelineSettings::from_config(config, temp_dir),
        );

        Self {
            store: collaborators.store,
            templates: collaborators.templates,
            template_config: config.templates.clone(),
            pipeline,
            governor,
            pacer: Pacer::from_limits(&config.campaign),
            reporter,
            leads_per_run: config.campaign.leads_per_run,
            shutdown: CancellationToken::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Wire up Supabase, the PDF service, SMTP and the templates directory
    pub fn from_config(config: &OutreachConfig) -> Result<Self> {
        let collaborators = Collaborators {
            store: Arc::new(SupabaseClient::new(
                config.supabase.clone(),
                config.campaign.excluded_property_type.clone(),
            )?),
            documents: Arc::new(PdfService::new(config.pdf_service.clone())?),
            transport: Arc::new(SmtpMailer::new(&config.smtp)?),
            templates: Arc::new(FileTemplateSource::default()),
        };
        Ok(Self::new(collaborators, config, paths::temp_documents_dir()))
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.reporter.subscribe()
    }

    pub fn governor(&self) -> &SendGovernor {
        &self.governor
    }

    /// Run ids of runs currently in progress
    pub fn active_runs(&self) -> Vec<String> {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.keys().cloned().collect()
    }

    /// Cancel runs whose run id or campaign id equals `target`
    pub fn stop(&self, target: &str) -> usize {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let mut stopped = 0;
        for (run_id, run) in active.iter() {
            if run_id == target || run.campaign_id.as_deref() == Some(target) {
                run.cancel.cancel();
                stopped += 1;
            }
        }
        if stopped == 0 {
            log::warn!("Stop requested for '{}' but no matching run is active", target);
        } else {
            log::info!("Stop requested for '{}' ({} run(s))", target, stopped);
        }
        stopped
    }

    /// Cancel every active run; runs started afterwards stop immediately
    pub fn stop_all(&self) {
        log::info!("Stopping all campaign runs");
        self.shutdown.cancel();
    }

    pub async fn market_regions(&self) -> Result<Vec<String>> {
        self.store.market_regions().await
    }

    /// Render a sample lead with the first sender and deliver it to `recipient`
    pub async fn send_test_email(&self, recipient: &str) -> Result<SendReceipt> {
        let templates = RunTemplates::load(self.templates.as_ref(), &self.template_config).await?;

        let lead = self.store.sample_lead().await?.ok_or_else(|| {
            OutreachError::Validation("No lead available to render a test email".to_string())
        })?;

        let sender = self.governor.senders().into_iter().next().ok_or_else(|| {
            OutreachError::Config("At least one valid sender identity is required".to_string())
        })?;

        log::info!("Sending test email for lead {} as {} to {}", lead.id, sender.email, recipient);
        self.pipeline.send_test(recipient, &lead, &sender, &templates).await
    }

    /// Process up to the trigger's limit of eligible leads for its market region
    pub async fn run(&self, trigger: CampaignTrigger) -> Result<RunSummary> {
        let run_id = trigger
            .campaign_run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let started_at = Utc::now();

        log::info!(
            "Starting campaign run {} for region '{}' (trigger {})",
            run_id, trigger.market_region, trigger.trigger_id
        );

        if let Err(e) = self.governor.begin_run(&run_id) {
            return Err(self.fail(&run_id, e));
        }

        let cancel = self.shutdown.child_token();
        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.insert(run_id.clone(), ActiveRun {
                campaign_id: trigger.campaign_id.clone(),
                cancel: cancel.clone(),
            });
        }

        let result = self.execute(&trigger, &run_id, &cancel, started_at).await;

        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.remove(&run_id);
        }
        if let Some(state) = self.governor.finish_run(&run_id) {
            for (sender, count) in &state.sent_by_sender {
                log::info!("[{}] {} sent {} email(s)", run_id, sender, count);
            }
        }

        match result {
            Ok(summary) => {
                self.reporter.emit(ProgressEvent::RunCompleted { summary: summary.clone() });
                Ok(summary)
            }
            Err(e) => Err(self.fail(&run_id, e)),
        }
    }

    fn fail(&self, run_id: &str, error: OutreachError) -> OutreachError {
        if error.is_configuration() {
            self.reporter.error(
                run_id,
                "Run aborted before any lead was processed; check configuration",
            );
        }
        self.reporter.emit(ProgressEvent::RunFailed {
            run_id: run_id.to_string(),
            error: error.to_string(),
        });
        error
    }

    async fn execute(
        &self,
        trigger: &CampaignTrigger,
        run_id: &str,
        cancel: &CancellationToken,
        started_at: DateTime<Utc>,
    ) -> Result<RunSummary> {
        if self.governor.senders().is_empty() {
            return Err(OutreachError::Config(
                "At least one valid sender identity is required".to_string()
            ));
        }

        let pinned = trigger.sender_email.as_deref();
        if let Some(email) = pinned {
            if !self.governor.is_known_sender(email) {
                return Err(OutreachError::Config(format!(
                    "Sender '{}' is not configured; a configured sender is required",
                    email
                )));
            }
        }

        let templates = RunTemplates::load(self.templates.as_ref(), &self.template_config).await?;
        let templates = Arc::new(templates);

        let limit = trigger.limit.unwrap_or(self.leads_per_run).max(1);
        let leads = self.store.fetch_eligible(&trigger.market_region, limit).await?;

        let summary = |end: RunEnd, needs_reconciliation: Vec<LeadId>| RunSummary {
            run_id: run_id.to_string(),
            campaign_id: trigger.campaign_id.clone(),
            market_region: trigger.market_region.clone(),
            tally: self.governor.tally(run_id).unwrap_or_default(),
            end,
            needs_reconciliation,
            started_at,
            finished_at: Utc::now(),
        };

        if leads.is_empty() {
            self.reporter.info(
                run_id,
                format!("No eligible leads for region '{}'", trigger.market_region),
            );
            return Ok(summary(RunEnd::NoLeads, Vec::new()));
        }

        self.reporter.info(
            run_id,
            format!("Fetched {} lead(s) for region '{}'", leads.len(), trigger.market_region),
        );

        let ctx = RunContext {
            run_id: run_id.to_string(),
            campaign_id: trigger.campaign_id.clone(),
            templates,
        };

        let mut needs_reconciliation = Vec::new();
        let exit = self.process_leads(&leads, pinned, &ctx, cancel, &mut needs_reconciliation).await;

        let end = match exit {
            LoopExit::Drained => RunEnd::Drained,
            LoopExit::Stopped => {
                self.reporter.warn(run_id, "Run stopped on request");
                RunEnd::Stopped
            }
            LoopExit::CapExhausted => RunEnd::CapExhausted,
        };

        Ok(summary(end, needs_reconciliation))
    }

    async fn process_leads(
        &self,
        leads: &[Lead],
        pinned: Option<&str>,
        ctx: &RunContext,
        cancel: &CancellationToken,
        needs_reconciliation: &mut Vec<LeadId>,
    ) -> LoopExit {
        let run_id = ctx.run_id.as_str();
        let mut sent_attempted = false;

        for lead in leads {
            if cancel.is_cancelled() {
                return LoopExit::Stopped;
            }

            if !self.governor.admit(lead) {
                self.governor.record_skip(run_id);
                let reason = if lead.already_emailed() {
                    "Lead was already emailed".to_string()
                } else {
                    format!("Invalid or missing contact email '{}'", lead.contact_email())
                };
                self.finish_lead(run_id, lead.id, LeadResult::Skipped, Some(reason));
                continue;
            }

            if !self.governor.has_capacity(pinned) {
                self.cap_exhausted(run_id, lead.id);
                return LoopExit::CapExhausted;
            }

            if sent_attempted {
                if self.pacer.pace(cancel).await == PaceOutcome::Cancelled {
                    return LoopExit::Stopped;
                }
                if cancel.is_cancelled() {
                    return LoopExit::Stopped;
                }
            }

            // Capacity may have been taken by a concurrent run while pacing
            let reservation = match self.governor.select_sender(run_id, pinned) {
                Some(reservation) => reservation,
                None => {
                    self.cap_exhausted(run_id, lead.id);
                    return LoopExit::CapExhausted;
                }
            };

            sent_attempted = true;
            let outcome = self.pipeline.process(lead, reservation, ctx).await;
            if outcome.reconciliation.is_some() {
                needs_reconciliation.push(outcome.lead_id);
            }
            self.finish_lead(run_id, outcome.lead_id, outcome.result, outcome.error);
        }

        LoopExit::Drained
    }

    fn cap_exhausted(&self, run_id: &str, lead_id: LeadId) {
        self.governor.record_cap_exhausted(run_id);
        let error = OutreachError::CapExhausted("no sender identity has capacity".to_string());
        self.finish_lead(run_id, lead_id, LeadResult::Failed, Some(error.to_string()));
        self.reporter.warn(run_id, "Daily send caps exhausted; ending run");
    }

    fn finish_lead(&self, run_id: &str, lead_id: LeadId, result: LeadResult, error: Option<String>) {
        self.reporter.emit(ProgressEvent::LeadFinished {
            run_id: run_id.to_string(),
            lead_id,
            result,
            error,
        });
        if let Some(tally) = self.governor.tally(run_id) {
            self.reporter.emit(ProgressEvent::Tally {
                run_id: run_id.to_string(),
                tally,
            });
        }
    }
}
