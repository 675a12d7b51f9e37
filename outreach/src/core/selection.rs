//! Batch selection predicates.
//!
//! The SQLite store expresses the same rules in SQL; these predicates back the
//! in-memory store and document the contract.

use crate::core::types::{Lead, LeadStatus};

/// Candidate for the initial-send pass.
pub fn is_initial_candidate(lead: &Lead) -> bool {
    lead.status == LeadStatus::New
}

/// Candidate for the follow-up pass.
pub fn is_followup_eligible(lead: &Lead, max_followups: u32) -> bool {
    !lead.replied && lead.status.is_contacted() && lead.followup_count < max_followups
}

/// First `limit` matching leads, in id (creation) order.
pub fn take_batch<'a, I, F>(leads: I, limit: usize, mut keep: F) -> Vec<Lead>
where
    I: IntoIterator<Item = &'a Lead>,
    F: FnMut(&Lead) -> bool,
{
    let mut matching: Vec<&Lead> = leads.into_iter().filter(|lead| keep(lead)).collect();
    matching.sort_by_key(|lead| lead.id);
    matching.into_iter().take(limit).cloned().collect()
}
