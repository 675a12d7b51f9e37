//! Cold-outreach cadence engine.
//!
//! Leads move through a small lifecycle (`new` -> `initial_sent` ->
//! `followup`, or `replied` at any point) driven by time since last contact
//! and by open and reply signals. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (cadence decisions, vertical
//!   detection, batch predicates, pacing draws, report totals). No I/O.
//! - **[`io`]**: Side-effecting operations (SQLite store, template rendering,
//!   SMTP delivery, CSV import/export, config files).
//!
//! [`dispatch`] and [`report`] coordinate the two to implement CLI commands.

pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
