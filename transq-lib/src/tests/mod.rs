//! Crate-level scenario tests
//!
//! Everything here runs against the in-memory backend in [`fixtures`], so no
//! media library is needed:
//! - full transcodes with and without audio
//! - cancellation and duplicate-output handling
//! - scheduler concurrency, cancel, remove and retry

pub mod scheduler;
