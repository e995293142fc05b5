//! Shared error definitions and helpers used across all huddle crates.

pub mod error;

pub use error::{Error, FromMessage, Result};
