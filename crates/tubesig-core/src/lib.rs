//! # tubesig-core
//!
//! Core types and error handling for the tubesig stream resolver.

pub mod error;
pub mod types;

pub use error::{Error, HttpError, Result};
pub use types::*;
