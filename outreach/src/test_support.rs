//! Test-only helpers: lead builders, an in-memory store, and scripted
//! collaborators for the dispatcher.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};

use crate::core::selection::{is_followup_eligible, is_initial_candidate, take_batch};
use crate::core::types::{Lead, LeadStatus, NewLead, Vertical};
use crate::core::vertical::detect_vertical;
use crate::dispatch::{Clock, Sleeper};
use crate::io::mailer::{Mailer, OutgoingMessage};
use crate::io::store::{LeadStore, StoreError};

/// Deterministic reference instant for tests.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Create a lead in status `new` with deterministic contact facts.
pub fn new_lead(id: i64, vertical: Vertical) -> Lead {
    Lead {
        id,
        email: format!("lead{id}@example.com"),
        domain_name: format!("lead{id}.com"),
        first_name: None,
        vertical,
        template_slot: 0,
        status: LeadStatus::New,
        opened: false,
        replied: false,
        last_contacted_at: None,
        followup_count: 0,
        tracking_id: format!("tid-{id}"),
    }
}

/// Create a lead that has already been contacted.
pub fn contacted_lead(
    id: i64,
    status: LeadStatus,
    opened: bool,
    last_contacted_at: Option<DateTime<Utc>>,
) -> Lead {
    Lead {
        status,
        opened,
        last_contacted_at,
        template_slot: 1,
        ..new_lead(id, Vertical::Local)
    }
}

/// Creation input with the vertical inferred from the domain.
pub fn new_lead_input(email: &str, domain_name: &str) -> NewLead {
    NewLead {
        email: email.to_string(),
        domain_name: domain_name.to_string(),
        first_name: None,
        vertical: detect_vertical(domain_name),
    }
}

/// Lead store held in memory, with injectable update failures.
#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    leads: Vec<Lead>,
    fail_updates: HashSet<i64>,
}

impl MemoryLeadStore {
    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            leads,
            fail_updates: HashSet::new(),
        }
    }

    pub fn lead(&self, id: i64) -> Option<&Lead> {
        self.leads.iter().find(|lead| lead.id == id)
    }

    /// Make every write to lead `id` fail.
    pub fn fail_updates_for(&mut self, id: i64) {
        self.fail_updates.insert(id);
    }

    fn writable(&mut self, id: i64) -> Result<Option<&mut Lead>, StoreError> {
        if self.fail_updates.contains(&id) {
            return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        Ok(self
            .leads
            .iter_mut()
            .find(|lead| lead.id == id && !lead.replied))
    }
}

impl LeadStore for MemoryLeadStore {
    fn create(&mut self, lead: &NewLead) -> Result<Lead, StoreError> {
        let id = self.leads.iter().map(|lead| lead.id).max().unwrap_or(0) + 1;
        let created = Lead {
            email: lead.email.clone(),
            domain_name: lead.domain_name.clone(),
            first_name: lead.first_name.clone(),
            vertical: lead.vertical,
            ..new_lead(id, lead.vertical)
        };
        self.leads.push(created.clone());
        Ok(created)
    }

    fn get(&self, id: i64) -> Result<Option<Lead>, StoreError> {
        Ok(self.lead(id).cloned())
    }

    fn batch_new(&self, limit: usize) -> Result<Vec<Lead>, StoreError> {
        Ok(take_batch(&self.leads, limit, is_initial_candidate))
    }

    fn batch_followup_eligible(
        &self,
        limit: usize,
        max_followups: u32,
    ) -> Result<Vec<Lead>, StoreError> {
        Ok(take_batch(&self.leads, limit, |lead| {
            is_followup_eligible(lead, max_followups)
        }))
    }

    fn update_after_send(
        &mut self,
        id: i64,
        status: LeadStatus,
        contacted_at: DateTime<Utc>,
        bump_followup: bool,
    ) -> Result<bool, StoreError> {
        let Some(lead) = self.writable(id)? else {
            return Ok(false);
        };
        lead.status = status;
        lead.last_contacted_at = Some(contacted_at);
        if bump_followup {
            lead.followup_count += 1;
        }
        Ok(true)
    }

    fn bump_template_slot(&mut self, id: i64, slots: u32) -> Result<bool, StoreError> {
        let Some(lead) = self.writable(id)? else {
            return Ok(false);
        };
        lead.template_slot = (lead.template_slot + 1) % slots.max(1);
        Ok(true)
    }

    fn set_opened(&mut self, tracking_id: &str) -> Result<usize, StoreError> {
        let mut matched = 0;
        for lead in &mut self.leads {
            if lead.tracking_id == tracking_id && !lead.replied {
                lead.opened = true;
                matched += 1;
            }
        }
        Ok(matched)
    }

    fn set_replied(&mut self, email: &str) -> Result<usize, StoreError> {
        let mut matched = 0;
        for lead in &mut self.leads {
            if lead.email == email {
                lead.replied = true;
                lead.status = LeadStatus::Replied;
                matched += 1;
            }
        }
        Ok(matched)
    }

    fn all(&self) -> Result<Vec<Lead>, StoreError> {
        Ok(take_batch(&self.leads, usize::MAX, |_| true))
    }
}

/// Mailer that records every message and fails for chosen recipients.
#[derive(Debug, Default)]
pub struct ScriptedMailer {
    sent: RefCell<Vec<OutgoingMessage>>,
    failing: RefCell<HashSet<String>>,
}

impl ScriptedMailer {
    pub fn failing_for(recipients: &[&str]) -> Self {
        let mailer = Self::default();
        mailer
            .failing
            .borrow_mut()
            .extend(recipients.iter().map(|r| r.to_string()));
        mailer
    }

    /// Let a previously failing recipient through.
    pub fn recover(&self, recipient: &str) {
        self.failing.borrow_mut().remove(recipient);
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.borrow().clone()
    }
}

impl Mailer for ScriptedMailer {
    fn send(&self, message: &OutgoingMessage) -> Result<()> {
        if self.failing.borrow().contains(&message.to) {
            return Err(anyhow!("scripted failure for {}", message.to));
        }
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

/// Sleeper that records requested pauses instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pauses: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
