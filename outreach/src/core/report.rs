//! Aggregate counts over a lead snapshot.

use crate::core::types::Lead;

/// Campaign-wide totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSummary {
    pub total: usize,
    pub opened: usize,
    pub replied: usize,
    /// Sum of `followup_count`, resends included.
    pub followups_sent: u64,
    pub not_opened: usize,
}

impl ReportSummary {
    pub fn from_leads(leads: &[Lead]) -> Self {
        let opened = leads.iter().filter(|lead| lead.opened).count();
        Self {
            total: leads.len(),
            opened,
            replied: leads.iter().filter(|lead| lead.replied).count(),
            followups_sent: leads.iter().map(|lead| u64::from(lead.followup_count)).sum(),
            not_opened: leads.len() - opened,
        }
    }

    pub fn open_rate(&self) -> f64 {
        percent(self.opened, self.total)
    }

    pub fn reply_rate(&self) -> f64 {
        percent(self.replied, self.total)
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{LeadStatus, Vertical};
    use crate::test_support::{contacted_lead, new_lead};

    #[test]
    fn summary_counts_flags_and_followups() {
        let mut a = contacted_lead(1, LeadStatus::Followup, true, None);
        a.followup_count = 2;
        let mut b = contacted_lead(2, LeadStatus::Replied, true, None);
        b.replied = true;
        b.followup_count = 1;
        let c = new_lead(3, Vertical::Local);
        let d = contacted_lead(4, LeadStatus::InitialSent, false, None);

        let summary = ReportSummary::from_leads(&[a, b, c, d]);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.opened, 2);
        assert_eq!(summary.replied, 1);
        assert_eq!(summary.followups_sent, 3);
        assert_eq!(summary.not_opened, 2);
        assert!((summary.open_rate() - 50.0).abs() < f64::EPSILON);
        assert!((summary.reply_rate() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_snapshot_has_zero_rates() {
        let summary = ReportSummary::from_leads(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.open_rate(), 0.0);
    }
}
