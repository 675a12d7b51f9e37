//! Lead-lifecycle cadence engine.
//!
//! `evaluate` is a pure function of `(lead, now, config)`. Nothing is scheduled:
//! every pass recomputes what is due from `last_contacted_at` and `opened`, so
//! re-running a pass after a failed send yields the same decision.

use chrono::{DateTime, Duration, Utc};

use crate::core::types::{Action, Decision, Lead, LeadStatus, NoOpReason, StatePatch};

/// Timing and budget knobs for the cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceConfig {
    /// Minimum quiet time before resending to a lead that never opened.
    pub resend_after: Duration,
    /// Minimum quiet time before following up with a lead that opened.
    pub followup_after: Duration,
    /// Shared budget for resends and follow-ups.
    pub max_followups: u32,
    /// Number of rotating initial-message variants (K).
    pub template_slots: u32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            resend_after: Duration::days(2),
            followup_after: Duration::days(4),
            max_followups: 4,
            template_slots: 3,
        }
    }
}

/// Decide what to do with `lead` at `now`.
pub fn evaluate(lead: &Lead, now: DateTime<Utc>, config: &CadenceConfig) -> Decision {
    if lead.replied || lead.status == LeadStatus::Replied {
        return Decision::idle(Action::Terminal);
    }

    if lead.status == LeadStatus::New {
        let slot = lead.template_slot % config.template_slots.max(1);
        return Decision {
            action: Action::SendInitial { slot },
            patch: Some(StatePatch {
                status: LeadStatus::InitialSent,
                contacted_at: now,
                bump_followup: false,
                next_template_slot: Some(next_slot(slot, config.template_slots)),
            }),
        };
    }

    if lead.followup_count >= config.max_followups {
        return Decision::idle(Action::NoOp(NoOpReason::Exhausted));
    }

    let elapsed = elapsed_since(lead.last_contacted_at, now);

    if !lead.opened {
        if elapsed < config.resend_after {
            return Decision::idle(Action::NoOp(NoOpReason::NotDue));
        }
        return Decision {
            action: Action::ResendInitial,
            patch: Some(StatePatch {
                status: LeadStatus::InitialSent,
                contacted_at: now,
                bump_followup: true,
                next_template_slot: None,
            }),
        };
    }

    if elapsed < config.followup_after {
        return Decision::idle(Action::NoOp(NoOpReason::NotDue));
    }
    Decision {
        action: Action::SendFollowup {
            ordinal: lead.followup_count + 1,
        },
        patch: Some(StatePatch {
            status: LeadStatus::Followup,
            contacted_at: now,
            bump_followup: true,
            next_template_slot: None,
        }),
    }
}

/// Advance a rotating slot modulo `slots`.
pub fn next_slot(slot: u32, slots: u32) -> u32 {
    (slot + 1) % slots.max(1)
}

/// Time since the last send; a lead never contacted counts as long overdue.
fn elapsed_since(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    match last {
        Some(at) => now.signed_duration_since(at),
        None => Duration::MAX,
    }
}
