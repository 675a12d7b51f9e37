//! CSV bulk import of leads.
//!
//! Expected headers: `email`, `domain_name`, and optionally `first_name` and
//! `vertical`. Bad rows are reported and skipped; they never abort the import.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use csv::StringRecord;
use tracing::{info, warn};

use crate::core::types::{Lead, NewLead, Vertical};
use crate::core::vertical::resolve_vertical;
use crate::io::store::LeadStore;

/// Why a row was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDiagnostic {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<Lead>,
    pub skipped: Vec<RowDiagnostic>,
}

impl ImportReport {
    pub fn total_rows(&self) -> usize {
        self.imported.len() + self.skipped.len()
    }
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    email: Option<usize>,
    domain_name: Option<usize>,
    first_name: Option<usize>,
    vertical: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim_start_matches('\u{feff}').trim() == name)
        };
        Self {
            email: find("email"),
            domain_name: find("domain_name"),
            first_name: find("first_name"),
            vertical: find("vertical"),
        }
    }
}

/// Import leads from a CSV file on disk.
pub fn import_csv<S: LeadStore>(store: &mut S, path: &Path) -> Result<ImportReport> {
    if !path.exists() {
        return Err(anyhow!("CSV file not found: {}", path.display()));
    }
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    import_reader(store, file).with_context(|| format!("import {}", path.display()))
}

/// Import leads from any CSV source.
pub fn import_reader<S: LeadStore, R: Read>(store: &mut S, source: R) -> Result<ImportReport> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
    let headers = reader.headers().context("read CSV headers")?.clone();
    let columns = Columns::from_headers(&headers);

    let mut report = ImportReport::default();
    for (idx, result) in reader.records().enumerate() {
        let row = idx + 1;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!(row, error = %err, "skipping unreadable row");
                report.skipped.push(RowDiagnostic {
                    row,
                    reason: format!("unreadable row: {err}"),
                });
                continue;
            }
        };

        let lead = match parse_row(&record, columns, row) {
            Ok(lead) => lead,
            Err(reason) => {
                warn!(row, %reason, "skipping row");
                report.skipped.push(RowDiagnostic { row, reason });
                continue;
            }
        };

        match store.create(&lead) {
            Ok(created) => report.imported.push(created),
            Err(err) => {
                warn!(row, email = %lead.email, error = %err, "failed to store lead");
                report.skipped.push(RowDiagnostic {
                    row,
                    reason: format!("store error: {err}"),
                });
            }
        }
    }

    info!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        "import finished"
    );
    Ok(report)
}

fn parse_row(record: &StringRecord, columns: Columns, row: usize) -> Result<NewLead, String> {
    let field = |idx: Option<usize>| {
        idx.and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let (Some(email), Some(domain_name)) = (field(columns.email), field(columns.domain_name))
    else {
        return Err("missing email or domain_name".to_string());
    };

    let supplied = match field(columns.vertical) {
        Some(raw) => match raw.parse::<Vertical>() {
            Ok(vertical) => Some(vertical),
            Err(err) => {
                warn!(row, %err, "unrecognized vertical, inferring from domain");
                None
            }
        },
        None => None,
    };

    Ok(NewLead {
        vertical: resolve_vertical(supplied, &domain_name),
        email,
        domain_name,
        first_name: field(columns.first_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::SqliteLeadStore;

    fn import(data: &str) -> (SqliteLeadStore, ImportReport) {
        let mut store = SqliteLeadStore::open_in_memory().expect("store");
        let report = import_reader(&mut store, data.as_bytes()).expect("import");
        (store, report)
    }

    #[test]
    fn imports_valid_rows_and_reports_missing_fields() {
        let (store, report) = import(
            "email,domain_name,first_name,vertical\n\
             a@example.com,BedOrder.com,Rahul,\n\
             ,NoEmail.com,,\n\
             b@example.com,,Bob,ai\n\
             c@example.com,CityShop.com,,ai\n",
        );

        assert_eq!(report.total_rows(), 4);
        assert_eq!(report.imported.len(), 2);
        assert_eq!(
            report.skipped.iter().map(|d| d.row).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(report.skipped[0].reason.contains("missing email"));

        let leads = store.all().expect("all");
        assert_eq!(leads[0].vertical, Vertical::Sleep);
        assert_eq!(leads[0].first_name.as_deref(), Some("Rahul"));
        assert_eq!(leads[1].vertical, Vertical::Ai);
        assert_eq!(leads[1].first_name, None);
    }

    #[test]
    fn tolerates_bom_whitespace_and_column_order() {
        let (_, report) = import(
            "\u{feff}domain_name, email ,first_name\n  PillowPal.com , p@example.com ,  \n",
        );
        assert_eq!(report.imported.len(), 1);
        let lead = &report.imported[0];
        assert_eq!(lead.email, "p@example.com");
        assert_eq!(lead.domain_name, "PillowPal.com");
        assert_eq!(lead.vertical, Vertical::Sleep);
    }

    #[test]
    fn unknown_vertical_falls_back_to_inference() {
        let (_, report) = import("email,domain_name,vertical\nx@example.com,DataMill.io,furniture\n");
        assert_eq!(report.imported[0].vertical, Vertical::Ai);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut store = SqliteLeadStore::open_in_memory().expect("store");
        let err = import_csv(&mut store, Path::new("/nonexistent/leads.csv")).expect_err("missing");
        assert!(err.to_string().contains("CSV file not found"));
    }
}
