//! Logging infrastructure for Astra
//!
//! Provides structured usage logging for offline analytics.

pub mod usage;

pub use usage::{EventType, UsageEvent, UsageLogger};
