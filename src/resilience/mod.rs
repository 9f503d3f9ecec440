//! Resilience helpers.
//!
//! Retry loops (accept failures, transient read errors) wait with
//! exponential backoff plus jitter instead of spinning.

pub mod backoff;

pub use backoff::Backoff;
