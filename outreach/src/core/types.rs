//! Shared deterministic types for the cadence core.
//!
//! These types define stable contracts between the engine, the store and the
//! dispatcher. They must not depend on external state or I/O.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

/// Position of a lead in the outreach cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStatus {
    New,
    InitialSent,
    Followup,
    Replied,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::InitialSent => "initial_sent",
            LeadStatus::Followup => "followup",
            LeadStatus::Replied => "replied",
        }
    }

    /// True for the statuses the follow-up pass works on.
    pub fn is_contacted(self) -> bool {
        matches!(self, LeadStatus::InitialSent | LeadStatus::Followup)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LeadStatus::New),
            "initial_sent" => Ok(LeadStatus::InitialSent),
            "followup" => Ok(LeadStatus::Followup),
            "replied" => Ok(LeadStatus::Replied),
            other => Err(format!("unknown lead status '{other}'")),
        }
    }
}

/// Market segment used to pick message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vertical {
    Sleep,
    Ai,
    Local,
}

impl Vertical {
    pub const ALL: [Vertical; 3] = [Vertical::Sleep, Vertical::Ai, Vertical::Local];

    pub fn as_str(self) -> &'static str {
        match self {
            Vertical::Sleep => "sleep",
            Vertical::Ai => "ai",
            Vertical::Local => "local",
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vertical {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sleep" => Ok(Vertical::Sleep),
            "ai" => Ok(Vertical::Ai),
            "local" => Ok(Vertical::Local),
            other => Err(format!("unknown vertical '{other}'")),
        }
    }
}

/// A persisted outreach target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub id: i64,
    pub email: String,
    pub domain_name: String,
    pub first_name: Option<String>,
    pub vertical: Vertical,
    /// Next initial-message variant, always in `[0, template_slots)`.
    pub template_slot: u32,
    pub status: LeadStatus,
    pub opened: bool,
    pub replied: bool,
    pub last_contacted_at: Option<DateTime<Utc>>,
    /// Shared counter for resends and follow-ups.
    pub followup_count: u32,
    pub tracking_id: String,
}

impl Lead {
    /// Facts handed to the message composer.
    pub fn recipient(&self) -> RecipientFacts<'_> {
        RecipientFacts {
            first_name: self.first_name.as_deref(),
            domain_name: &self.domain_name,
        }
    }
}

/// Input for creating a lead. The store assigns id and tracking id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLead {
    pub email: String,
    pub domain_name: String,
    pub first_name: Option<String>,
    pub vertical: Vertical,
}

/// Recipient details used when rendering a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipientFacts<'a> {
    pub first_name: Option<&'a str>,
    pub domain_name: &'a str,
}

/// Why the engine decided not to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// Follow-up budget is spent; the lead waits for a reply.
    Exhausted,
    /// The relevant threshold has not elapsed yet.
    NotDue,
}

/// What the dispatcher should do with a lead on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SendInitial { slot: u32 },
    /// Resend of the initial message; always rendered from slot 0.
    ResendInitial,
    /// Follow-up with a 1-based ordinal.
    SendFollowup { ordinal: u32 },
    NoOp(NoOpReason),
    /// Lead replied; it is excluded from all further evaluation.
    Terminal,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SendInitial { slot } => write!(f, "send-initial(slot {slot})"),
            Action::ResendInitial => f.write_str("resend-initial"),
            Action::SendFollowup { ordinal } => write!(f, "send-followup(#{ordinal})"),
            Action::NoOp(NoOpReason::Exhausted) => f.write_str("no-op(exhausted)"),
            Action::NoOp(NoOpReason::NotDue) => f.write_str("no-op(not due)"),
            Action::Terminal => f.write_str("terminal"),
        }
    }
}

/// State update to persist after a confirmed successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatePatch {
    pub status: LeadStatus,
    pub contacted_at: DateTime<Utc>,
    pub bump_followup: bool,
    /// New rotating slot, set only for initial sends.
    pub next_template_slot: Option<u32>,
}

impl StatePatch {
    /// Apply the patch to an in-memory lead.
    pub fn apply_to(&self, lead: &mut Lead) {
        lead.status = self.status;
        lead.last_contacted_at = Some(self.contacted_at);
        if self.bump_followup {
            lead.followup_count += 1;
        }
        if let Some(slot) = self.next_template_slot {
            lead.template_slot = slot;
        }
    }
}

/// Engine output for one lead at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// `Some` exactly when `action` is a send.
    pub patch: Option<StatePatch>,
}

impl Decision {
    pub fn idle(action: Action) -> Self {
        Self {
            action,
            patch: None,
        }
    }
}
