//! Metric names and labels for huddle.
//!
//! Crates record through the `metrics` facade behind their own `metrics`
//! feature; installing a recorder/exporter is left to the embedding host.
//!
//! ```rust,ignore
//! use huddle_metrics::{counter, dispatch, labels};
//!
//! counter!(dispatch::MESSAGES_TOTAL, labels::CHANNEL => "global").increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
