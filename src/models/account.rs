// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Connected athlete account model for storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Strava athlete that has authorized the collector.
///
/// Owned by storage; the sync engine holds a transient copy per pass and
/// writes back credential and checkpoint mutations through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Strava athlete ID (also used as document ID)
    pub strava_id: u64,
    /// First name (may be absent if not shared)
    pub firstname: Option<String>,
    /// Last name
    pub lastname: Option<String>,
    /// Email address (may be absent if not shared)
    pub email: Option<String>,
    /// Current OAuth access token
    pub access_token: String,
    /// OAuth refresh token
    pub refresh_token: String,
    /// When the access token expires (epoch seconds).
    /// Always updated together with both token strings.
    pub token_expires_at: i64,
    /// When the athlete first connected (RFC 3339)
    pub created_at: String,
    /// Checkpoint: end of the last completed sync pass for this athlete.
    /// Advanced only after a pass completes, never mid-run.
    pub last_sync: Option<DateTime<Utc>>,
    /// Inactive athletes are skipped by the sync pass.
    /// The engine reads this flag but never sets it.
    pub is_active: bool,
}

impl Account {
    /// Whether the access token expires within `margin_secs` of `now_epoch`.
    pub fn token_expires_within(&self, now_epoch: i64, margin_secs: i64) -> bool {
        self.token_expires_at - now_epoch < margin_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_expiring_at(expires_at: i64) -> Account {
        Account {
            strava_id: 42,
            firstname: None,
            lastname: None,
            email: None,
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_expires_at: expires_at,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            last_sync: None,
            is_active: true,
        }
    }

    #[test]
    fn test_token_expiry_margin() {
        let now = 1_700_000_000;
        // Expires in 30 minutes: within the one-hour margin
        assert!(account_expiring_at(now + 1800).token_expires_within(now, 3600));
        // Expires in two hours: not within the margin
        assert!(!account_expiring_at(now + 7200).token_expires_within(now, 3600));
        // Already expired
        assert!(account_expiring_at(now - 10).token_expires_within(now, 3600));
    }
}
