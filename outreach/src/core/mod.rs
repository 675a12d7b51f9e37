//! Deterministic, pure logic for the outreach cadence.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! leads and return deterministic outputs suitable for tests.

pub mod cadence;
pub mod pacing;
pub mod report;
pub mod selection;
pub mod types;
pub mod vertical;
