//! Side-effecting operations: SQLite store, templates, SMTP, CSV files, config.

pub mod composer;
pub mod config;
pub mod import;
pub mod mailer;
pub mod report_csv;
pub mod store;
