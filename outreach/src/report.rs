//! Campaign report: totals, CSV export, and a short sample listing.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::core::report::ReportSummary;
use crate::core::types::Lead;
use crate::io::report_csv::write_report_file;
use crate::io::store::LeadStore;

/// Leads printed under the summary.
pub const SAMPLE_SIZE: usize = 5;

/// Snapshot of the store at report time.
#[derive(Debug, Clone)]
pub struct CampaignReport {
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub leads: Vec<Lead>,
}

impl CampaignReport {
    pub fn collect<S: LeadStore>(store: &S, now: DateTime<Utc>) -> Result<Self> {
        let leads = store.all().context("load leads for report")?;
        Ok(Self {
            generated_at: now,
            summary: ReportSummary::from_leads(&leads),
            leads,
        })
    }

    /// `report_<YYYY-mm-dd_HH-MM-SS>.csv`
    pub fn file_name(&self) -> String {
        format!("report_{}.csv", self.generated_at.format("%Y-%m-%d_%H-%M-%S"))
    }

    /// Write the per-lead CSV into `out_dir` and return its path. Nothing is
    /// written when there are no leads.
    pub fn export(&self, out_dir: &Path) -> Result<Option<PathBuf>> {
        if self.leads.is_empty() {
            return Ok(None);
        }
        let path = out_dir.join(self.file_name());
        write_report_file(&path, &self.leads)?;
        info!(path = %path.display(), rows = self.leads.len(), "report exported");
        Ok(Some(path))
    }

    pub fn samples(&self) -> &[Lead] {
        &self.leads[..self.leads.len().min(SAMPLE_SIZE)]
    }

    /// Human-readable summary followed by sample leads.
    pub fn render(&self) -> String {
        if self.leads.is_empty() {
            return "No leads found.\n".to_string();
        }
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "Total leads: {}", s.total);
        let _ = writeln!(out, "Opened: {} ({:.1}%)", s.opened, s.open_rate());
        let _ = writeln!(out, "Replied: {} ({:.1}%)", s.replied, s.reply_rate());
        let _ = writeln!(out, "Follow-ups sent: {}", s.followups_sent);
        let _ = writeln!(out, "Not opened: {}", s.not_opened);
        let _ = writeln!(out, "\nSample leads:");
        for lead in self.samples() {
            let _ = writeln!(
                out,
                "  {} | {} | {} | status={} opened={} replied={} followups={}",
                lead.email,
                lead.domain_name,
                lead.vertical,
                lead.status,
                u8::from(lead.opened),
                u8::from(lead.replied),
                lead.followup_count
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{LeadStatus, Vertical};
    use crate::test_support::{MemoryLeadStore, contacted_lead, fixed_now, new_lead};

    fn store_with(count: i64) -> MemoryLeadStore {
        let mut leads: Vec<Lead> = (1..=count).map(|id| new_lead(id, Vertical::Ai)).collect();
        if let Some(first) = leads.first_mut() {
            *first = contacted_lead(1, LeadStatus::Followup, true, Some(fixed_now()));
            first.followup_count = 2;
        }
        MemoryLeadStore::with_leads(leads)
    }

    #[test]
    fn file_name_uses_generation_timestamp() {
        let report = CampaignReport::collect(&store_with(0), fixed_now()).expect("collect");
        assert_eq!(report.file_name(), "report_2025-01-15_12-00-00.csv");
    }

    #[test]
    fn samples_are_capped_and_rendered() {
        let report = CampaignReport::collect(&store_with(7), fixed_now()).expect("collect");
        assert_eq!(report.samples().len(), SAMPLE_SIZE);

        let text = report.render();
        assert!(text.contains("Total leads: 7"));
        assert!(text.contains("Opened: 1 (14.3%)"));
        assert!(text.contains("Follow-ups sent: 2"));
        assert!(text.contains("lead5@example.com"));
        assert!(!text.contains("lead6@example.com"));
    }

    #[test]
    fn empty_store_reports_no_leads_and_exports_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = CampaignReport::collect(&store_with(0), fixed_now()).expect("collect");

        assert_eq!(report.render(), "No leads found.\n");
        assert_eq!(report.export(temp.path()).expect("export"), None);
        assert_eq!(std::fs::read_dir(temp.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn export_writes_csv_into_out_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = CampaignReport::collect(&store_with(3), fixed_now()).expect("collect");
        let path = report
            .export(&temp.path().join("reports"))
            .expect("export")
            .expect("path");

        assert!(path.ends_with("reports/report_2025-01-15_12-00-00.csv"));
        let contents = std::fs::read_to_string(path).expect("read");
        assert_eq!(contents.lines().count(), 4);
    }
}
