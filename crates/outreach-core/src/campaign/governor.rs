//! Send governor: daily caps, sender selection and run tallies
//!
//! All counters live in one [`GovernorState`] behind a single mutex so that
//! checking a cap and reserving the slot happen in one step. A reservation
//! counts against both caps until [`SendGovernor::record_outcome`] releases it.

use crate::config::CampaignLimits;
use crate::error::{OutreachError, Result};
use crate::services::is_valid_email;
use crate::types::{Lead, SenderIdentity};
use super::sender_pool::SenderPool;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use outreach_types::RunTally;

pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Per-run bookkeeping
#[derive(Debug, Clone, Default)]
pub struct CampaignRunState {
    pub tally: RunTally,
    /// Successful sends in this run
    pub sent: u32,
    pub sent_by_sender: HashMap<String, u32>,
}

#[derive(Debug)]
struct GovernorState {
    day: NaiveDate,
    pool: SenderPool,
    campaign_sent: u32,
    campaign_reserved: u32,
    runs: HashMap<String, CampaignRunState>,
}

/// Right to send one email as `sender`; must be handed back through `record_outcome`
#[derive(Debug)]
pub struct SenderReservation {
    run_id: String,
    sender: SenderIdentity,
}

impl SenderReservation {
    pub fn sender(&self) -> &SenderIdentity {
        &self.sender
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

pub struct SendGovernor {
    max_campaign_per_day: u32,
    max_sender_per_day: u32,
    clock: Clock,
    state: Mutex<GovernorState>,
}

impl SendGovernor {
    pub fn new(limits: &CampaignLimits, pool: SenderPool) -> Self {
        Self::with_clock(limits, pool, Arc::new(|| Utc::now().date_naive()))
    }

    pub fn with_clock(limits: &CampaignLimits, pool: SenderPool, clock: Clock) -> Self {
        let day = clock();
        Self {
            max_campaign_per_day: limits.max_campaign_emails_per_day,
            max_sender_per_day: limits.max_sender_emails_per_day,
            clock,
            state: Mutex::new(GovernorState {
                day,
                pool,
                campaign_sent: 0,
                campaign_reserved: 0,
                runs: HashMap::new(),
            }),
        }
    }

    // A panic while holding the lock leaves plain counters behind; keep using them
    fn lock(&self) -> MutexGuard<'_, GovernorState> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let today = (self.clock)();
        if today != state.day {
            log::info!("Day rolled over from {} to {}; resetting daily send counters", state.day, today);
            state.day = today;
            state.campaign_sent = 0;
            for slot in state.pool.slots_mut() {
                slot.sent = 0;
            }
        }
        state
    }

    /// Register a run; counters reset when no other run is active
    pub fn begin_run(&self, run_id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.runs.contains_key(run_id) {
            return Err(OutreachError::Config(format!(
                "Campaign run '{}' is already active; a unique run id is required",
                run_id
            )));
        }

        if state.runs.is_empty() {
            state.pool.reset();
            state.campaign_sent = 0;
            state.campaign_reserved = 0;
        }

        state.runs.insert(run_id.to_string(), CampaignRunState::default());
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str) -> Option<CampaignRunState> {
        self.lock().runs.remove(run_id)
    }

    /// Whether a lead may enter the pipeline; never mutates state
    pub fn admit(&self, lead: &Lead) -> bool {
        !lead.already_emailed() && is_valid_email(lead.contact_email())
    }

    /// Whether `select_sender` would currently succeed
    pub fn has_capacity(&self, pinned: Option<&str>) -> bool {
        let state = self.lock();
        self.pick(&state, pinned).is_some()
    }

    fn pick(&self, state: &GovernorState, pinned: Option<&str>) -> Option<usize> {
        if state.campaign_sent + state.campaign_reserved >= self.max_campaign_per_day {
            return None;
        }

        state.pool
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, slot)| pinned.map_or(true, |email| slot.identity.matches_email(email)))
            .filter(|(_, slot)| slot.load() < self.max_sender_per_day)
            .min_by_key(|(_, slot)| slot.load())
            .map(|(index, _)| index)
    }

    /// Pick the least-used sender under both caps and reserve one send for it
    pub fn select_sender(&self, run_id: &str, pinned: Option<&str>) -> Option<SenderReservation> {
        let mut state = self.lock();
        let index = self.pick(&state, pinned)?;

        state.campaign_reserved += 1;
        let slot = state.pool.slot_mut(index)?;
        slot.reserved += 1;
        let sender = slot.identity.clone();

        Some(SenderReservation {
            run_id: run_id.to_string(),
            sender,
        })
    }

    /// Release a reservation and count the attempt
    pub fn record_outcome(&self, reservation: SenderReservation, success: bool) -> RunTally {
        let mut state = self.lock();
        state.campaign_reserved = state.campaign_reserved.saturating_sub(1);

        if let Some(slot) = state.pool.find_mut(&reservation.sender.email) {
            slot.reserved = slot.reserved.saturating_sub(1);
            if success {
                slot.sent += 1;
            }
        }
        if success {
            state.campaign_sent += 1;
        }

        let run = state.runs.entry(reservation.run_id).or_default();
        run.tally.attempted += 1;
        if success {
            run.tally.succeeded += 1;
            run.sent += 1;
            *run.sent_by_sender.entry(reservation.sender.email).or_insert(0) += 1;
        } else {
            run.tally.failed += 1;
        }
        run.tally
    }

    pub fn record_skip(&self, run_id: &str) -> RunTally {
        let mut state = self.lock();
        let run = state.runs.entry(run_id.to_string()).or_default();
        run.tally.attempted += 1;
        run.tally.skipped += 1;
        run.tally
    }

    /// A lead that found no sender capacity counts as a failed attempt
    pub fn record_cap_exhausted(&self, run_id: &str) -> RunTally {
        let mut state = self.lock();
        let run = state.runs.entry(run_id.to_string()).or_default();
        run.tally.attempted += 1;
        run.tally.failed += 1;
        run.tally
    }

    pub fn tally(&self, run_id: &str) -> Option<RunTally> {
        self.lock().runs.get(run_id).map(|run| run.tally)
    }

    pub fn sent_today(&self, email: &str) -> Option<u32> {
        self.lock().pool.sent_today(email)
    }

    pub fn campaign_sent_today(&self) -> u32 {
        self.lock().campaign_sent
    }

    pub fn senders(&self) -> Vec<SenderIdentity> {
        self.lock().pool.all()
    }

    pub fn is_known_sender(&self, email: &str) -> bool {
        self.lock().pool.sent_today(email).is_some()
    }
}
