//! Shared types for the strata site-aggregation services
//!
//! Holds the common error type, configuration resolution, and the
//! source-version stamp used to gate cached documents.

pub mod config;
pub mod error;
pub mod version;

pub use error::{Error, Result};
pub use version::SourceVersion;
