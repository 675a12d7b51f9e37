//! Stable exit codes for outreach CLI commands.

/// Command succeeded; every lead in a pass was handled.
pub const OK: i32 = 0;
/// Command failed due to invalid config, unusable store, or other errors.
pub const INVALID: i32 = 1;
/// A send pass finished but at least one lead failed to send or persist.
pub const PARTIAL: i32 = 2;
