//! Sender identities and their daily counters

use crate::config::SenderRecord;
use crate::services::is_valid_email;
use crate::types::SenderIdentity;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub(crate) struct SenderSlot {
    pub identity: SenderIdentity,
    pub sent: u32,
    /// Sends selected but not yet recorded
    pub reserved: u32,
}

impl SenderSlot {
    pub fn load(&self) -> u32 {
        self.sent + self.reserved
    }
}

/// Ordered pool of sender identities; order breaks ties during selection
#[derive(Debug, Clone, Default)]
pub struct SenderPool {
    slots: Vec<SenderSlot>,
}

impl SenderPool {
    /// Keep complete records with a valid address; the first of any duplicate email wins
    pub fn from_records(records: &[SenderRecord]) -> Self {
        let mut seen = HashSet::new();
        let mut slots = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let name = record.name.as_deref().map(str::trim).unwrap_or("");
            let email = record.email.as_deref().map(str::trim).unwrap_or("");

            if name.is_empty() || email.is_empty() {
                log::warn!("Skipping sender record {}: name and email are both required", index);
                continue;
            }
            if !is_valid_email(email) {
                log::warn!("Skipping sender record {}: invalid email '{}'", index, email);
                continue;
            }
            if !seen.insert(email.to_lowercase()) {
                log::warn!("Skipping sender record {}: duplicate email '{}'", index, email);
                continue;
            }

            slots.push(SenderSlot {
                identity: SenderIdentity::new(name, email),
                sent: 0,
                reserved: 0,
            });
        }

        Self { slots }
    }

    pub fn all(&self) -> Vec<SenderIdentity> {
        self.slots.iter().map(|slot| slot.identity.clone()).collect()
    }

    /// Zero every daily counter
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.sent = 0;
            slot.reserved = 0;
        }
    }

    pub fn sent_today(&self, email: &str) -> Option<u32> {
        self.find(email).map(|slot| slot.sent)
    }

    pub(crate) fn find(&self, email: &str) -> Option<&SenderSlot> {
        self.slots.iter().find(|slot| slot.identity.matches_email(email))
    }

    pub(crate) fn find_mut(&mut self, email: &str) -> Option<&mut SenderSlot> {
        self.slots.iter_mut().find(|slot| slot.identity.matches_email(email))
    }

    pub(crate) fn slots(&self) -> &[SenderSlot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [SenderSlot] {
        &mut self.slots
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut SenderSlot> {
        self.slots.get_mut(index)
    }
}
