//! Error types shared by the session controller and the resolver.
//!
//! Glue code (store, config, CLI) keeps using `anyhow`; these enums exist so
//! the controller can tell a user cancellation apart from a real failure.

use thiserror::Error;

/// Local, non-fatal rejections raised by the session controller.
///
/// None of these mutate the persisted session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("a download is already in progress")]
    AlreadyInProgress,

    #[error("no download is in progress")]
    NotInFlight,

    #[error("there is no interrupted download to resume or discard")]
    NoPendingResume,

    #[error("the current download has not finished yet")]
    NotTerminal,
}

/// Failures reported by a [`crate::resolver::Resolver`] or by format
/// selection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid video URL: {0}")]
    InvalidUrl(String),

    #[error("resolver program unavailable: {0}")]
    Unavailable(String),

    #[error("resolver exited with an error: {0}")]
    Program(String),

    #[error("could not parse resolver output: {0}")]
    Parse(String),

    #[error("no stream with format {format} (requested {resolution})")]
    FormatNotFound { resolution: String, format: String },

    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResolveError::Cancelled)
    }
}
