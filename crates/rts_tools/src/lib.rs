//! # RTS Development Tools
//!
//! Command-line tools for content authors:
//! - Gameset validation
//! - Headless scenario runs with optional replay output

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod run;
pub mod validate;

use rts_behavior::error::GameError;
use thiserror::Error;

/// Errors reported by the tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Content or simulation error from the runtime.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Summary could not be encoded.
    #[error("Failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;
