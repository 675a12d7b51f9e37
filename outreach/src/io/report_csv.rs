//! CSV export of the per-lead report.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::Lead;

/// Header row; matches the field order of [`ReportRow`].
const COLUMNS: [&str; 8] = [
    "email",
    "domain_name",
    "vertical",
    "opened",
    "replied",
    "followup_count",
    "last_contacted_at",
    "status",
];

/// One exported row. Column order is part of the file format.
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    email: &'a str,
    domain_name: &'a str,
    vertical: &'a str,
    opened: u8,
    replied: u8,
    followup_count: u32,
    last_contacted_at: String,
    status: &'a str,
}

impl<'a> From<&'a Lead> for ReportRow<'a> {
    fn from(lead: &'a Lead) -> Self {
        Self {
            email: &lead.email,
            domain_name: &lead.domain_name,
            vertical: lead.vertical.as_str(),
            opened: u8::from(lead.opened),
            replied: u8::from(lead.replied),
            followup_count: lead.followup_count,
            last_contacted_at: lead
                .last_contacted_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
            status: lead.status.as_str(),
        }
    }
}

/// Write all leads as CSV to `sink`.
pub fn write_report<W: Write>(sink: W, leads: &[Lead]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(sink);
    writer.write_record(COLUMNS).context("write report header")?;
    for lead in leads {
        writer
            .serialize(ReportRow::from(lead))
            .with_context(|| format!("write report row for {}", lead.email))?;
    }
    writer.flush().context("flush report")?;
    Ok(())
}

/// Write the report to a file, creating parent directories.
pub fn write_report_file(path: &Path, leads: &[Lead]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let file =
        std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_report(file, leads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{LeadStatus, Vertical};
    use crate::test_support::{contacted_lead, fixed_now, new_lead};

    #[test]
    fn writes_header_and_rows_in_column_order() {
        let mut sent = contacted_lead(2, LeadStatus::Followup, true, Some(fixed_now()));
        sent.followup_count = 2;
        let leads = vec![new_lead(1, Vertical::Sleep), sent];

        let mut buf = Vec::new();
        write_report(&mut buf, &leads).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "email,domain_name,vertical,opened,replied,followup_count,last_contacted_at,status"
        );
        assert!(lines[1].ends_with(",sleep,0,0,0,,new"));
        assert!(lines[2].contains(",1,0,2,"));
        assert!(lines[2].ends_with(",followup"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_report_still_has_header() {
        let mut buf = Vec::new();
        write_report(&mut buf, &[]).expect("write");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "email,domain_name,vertical,opened,replied,followup_count,last_contacted_at,status\n"
        );
    }
}
