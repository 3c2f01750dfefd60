// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.

/// Errors produced while synchronizing Strava data.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The access token was rejected or could not be refreshed.
    /// The affected account is skipped for the current pass.
    #[error("Credential invalid: {0}")]
    CredentialInvalid(String),

    /// Strava signalled a rate limit. Handled inside the API client by
    /// sleeping and retrying; never surfaced past it.
    #[error("Rate limited by Strava, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Network error, 5xx, or any other unexpected remote response.
    #[error("Strava API error: {0}")]
    Api(String),

    /// Storage read or write failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A fetched record could not be parsed into a usable shape.
    /// The record is logged and skipped, never fatal.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

impl SyncError {
    /// Whether this error means the account's credentials are unusable.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, SyncError::CredentialInvalid(_))
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
