//! Dispatcher: drives a batch of leads through the cadence engine.
//!
//! The engine decides; the dispatcher renders, sends, and persists. A state
//! patch is written only after the mailer confirms the send, so a failed send
//! leaves the lead untouched and the next pass reaches the same decision.
//! Failures are confined to the lead they occur on; the batch always runs to
//! completion.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::core::cadence::{CadenceConfig, evaluate};
use crate::core::pacing::PacingPolicy;
use crate::core::types::{Action, Decision, Lead};
use crate::io::composer::{Message, MessageComposer};
use crate::io::config::OutreachConfig;
use crate::io::mailer::{Mailer, OutgoingMessage};
use crate::io::store::LeadStore;

/// Blocking wait between sends.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `std::thread::sleep`.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Source of "now" for engine evaluation and send timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Which batch query feeds a run. The two passes are independent entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Initial,
    Followup,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Initial => f.write_str("initial"),
            Pass::Followup => f.write_str("followup"),
        }
    }
}

/// Immutable settings for a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub cadence: CadenceConfig,
    pub batch_size: usize,
    pub pacing: PacingPolicy,
}

impl DispatchConfig {
    pub fn from_config(cfg: &OutreachConfig) -> Self {
        Self {
            cadence: cfg.cadence(),
            batch_size: cfg.campaign.batch_size,
            pacing: cfg.pacing(),
        }
    }
}

/// What happened to one lead during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadOutcome {
    /// Message sent and state persisted.
    Sent(Action),
    /// Engine chose not to send (no-op or terminal).
    Idle(Action),
    /// Rendering or delivery failed; no state was changed.
    SendFailed { action: Action, reason: String },
    /// Message went out but the state update failed.
    PersistFailed { action: Action, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadReport {
    pub lead_id: i64,
    pub email: String,
    pub outcome: LeadOutcome,
}

/// Result of one pass over a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub pass: Pass,
    pub leads: Vec<LeadReport>,
}

impl PassSummary {
    pub fn sent(&self) -> usize {
        self.count(|outcome| matches!(outcome, LeadOutcome::Sent(_)))
    }

    pub fn idle(&self) -> usize {
        self.count(|outcome| matches!(outcome, LeadOutcome::Idle(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| {
            matches!(
                outcome,
                LeadOutcome::SendFailed { .. } | LeadOutcome::PersistFailed { .. }
            )
        })
    }

    fn count(&self, predicate: impl Fn(&LeadOutcome) -> bool) -> usize {
        self.leads
            .iter()
            .filter(|report| predicate(&report.outcome))
            .count()
    }
}

/// A lead paired with the decision the engine would make right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub lead: Lead,
    pub decision: Decision,
}

pub struct Dispatcher<S, M, Z = ThreadSleeper, C = SystemClock> {
    store: S,
    mailer: M,
    sleeper: Z,
    clock: C,
    composer: MessageComposer,
    config: DispatchConfig,
    rng: StdRng,
}

impl<S: LeadStore, M: Mailer> Dispatcher<S, M> {
    pub fn new(store: S, mailer: M, composer: MessageComposer, config: DispatchConfig) -> Self {
        Dispatcher::with_parts(store, mailer, ThreadSleeper, SystemClock, composer, config)
    }
}

impl<S: LeadStore, M: Mailer, Z: Sleeper, C: Clock> Dispatcher<S, M, Z, C> {
    pub fn with_parts(
        store: S,
        mailer: M,
        sleeper: Z,
        clock: C,
        composer: MessageComposer,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            sleeper,
            clock,
            composer,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a deterministic pacing sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    pub fn sleeper(&self) -> &Z {
        &self.sleeper
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Pull the candidate batch for `pass`.
    pub fn load_batch(&self, pass: Pass) -> Result<Vec<Lead>> {
        let limit = self.config.batch_size;
        let batch = match pass {
            Pass::Initial => self.store.batch_new(limit),
            Pass::Followup => self
                .store
                .batch_followup_eligible(limit, self.config.cadence.max_followups),
        };
        batch.with_context(|| format!("load {pass} batch"))
    }

    /// Evaluate the batch without sending, sleeping, or persisting.
    pub fn plan(&self, pass: Pass) -> Result<Vec<PlannedAction>> {
        let now = self.clock.now();
        Ok(self
            .load_batch(pass)?
            .into_iter()
            .map(|lead| {
                let decision = evaluate(&lead, now, &self.config.cadence);
                PlannedAction { lead, decision }
            })
            .collect())
    }

    /// Run one pass: evaluate, send, persist, and pace each lead in turn.
    pub fn run_pass(&mut self, pass: Pass) -> Result<PassSummary> {
        let batch = self.load_batch(pass)?;
        info!(%pass, leads = batch.len(), "starting pass");

        let total = batch.len();
        let mut reports = Vec::with_capacity(total);
        for (idx, lead) in batch.into_iter().enumerate() {
            let outcome = self.process(&lead);
            let sent = matches!(
                outcome,
                LeadOutcome::Sent(_) | LeadOutcome::PersistFailed { .. }
            );
            reports.push(LeadReport {
                lead_id: lead.id,
                email: lead.email,
                outcome,
            });
            if PacingPolicy::pause_after(sent, idx, total) {
                let delay = self.config.pacing.draw(&mut self.rng);
                debug!(delay_secs = delay.as_secs(), "pacing before next send");
                self.sleeper.sleep(delay);
            }
        }

        let summary = PassSummary {
            pass,
            leads: reports,
        };
        info!(
            %pass,
            sent = summary.sent(),
            idle = summary.idle(),
            failed = summary.failed(),
            "pass finished"
        );
        Ok(summary)
    }

    fn process(&mut self, lead: &Lead) -> LeadOutcome {
        let now = self.clock.now();
        let decision = evaluate(lead, now, &self.config.cadence);
        let action = decision.action;
        let Some(patch) = decision.patch else {
            debug!(lead_id = lead.id, %action, "no send");
            return LeadOutcome::Idle(action);
        };

        let message = match self.compose(lead, action) {
            Ok(message) => message,
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(lead_id = lead.id, %action, error = %reason, "render failed");
                return LeadOutcome::SendFailed { action, reason };
            }
        };

        let outgoing = OutgoingMessage {
            to: lead.email.clone(),
            subject: message.subject,
            html_body: message.html_body,
        };
        if let Err(err) = self.mailer.send(&outgoing) {
            let reason = format!("{err:#}");
            warn!(lead_id = lead.id, email = %lead.email, %action, error = %reason, "send failed; lead left unchanged");
            return LeadOutcome::SendFailed { action, reason };
        }

        match self
            .store
            .apply_patch(lead.id, &patch, self.config.cadence.template_slots)
        {
            Ok(true) => {
                info!(lead_id = lead.id, email = %lead.email, vertical = %lead.vertical, %action, "sent");
                LeadOutcome::Sent(action)
            }
            Ok(false) => {
                warn!(lead_id = lead.id, email = %lead.email, %action, "sent, but lead replied or vanished before update");
                LeadOutcome::Sent(action)
            }
            Err(err) => {
                error!(lead_id = lead.id, email = %lead.email, %action, error = %err, "sent, but failed to persist state");
                LeadOutcome::PersistFailed {
                    action,
                    reason: err.to_string(),
                }
            }
        }
    }

    fn compose(&self, lead: &Lead, action: Action) -> Result<Message> {
        let facts = lead.recipient();
        match action {
            Action::SendInitial { slot } => {
                self.composer
                    .render_initial(lead.vertical, slot, facts, &lead.tracking_id)
            }
            Action::ResendInitial => {
                self.composer
                    .render_initial(lead.vertical, 0, facts, &lead.tracking_id)
            }
            Action::SendFollowup { ordinal } => {
                self.composer
                    .render_followup(ordinal, facts, &lead.tracking_id)
            }
            Action::NoOp(_) | Action::Terminal => {
                anyhow::bail!("action {action} does not produce a message")
            }
        }
    }
}
