// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token lifecycle for connected accounts.
//!
//! Strava access tokens are short-lived. Before touching the API for an
//! account, the sync pass calls [`ensure_fresh`] to refresh any token that
//! expires within the next hour. Both token strings and the expiry are
//! written back together through storage, never partially.

use crate::db::SyncStore;
use crate::error::{Result, SyncError};
use crate::models::Account;
use crate::services::strava::StravaApi;

/// Refresh when the token expires within this margin (one hour).
pub const REFRESH_MARGIN_SECS: i64 = 3600;

/// Ensure the account's access token is valid for at least the refresh
/// margin. Returns `true` when a refresh was performed.
///
/// On refresh failure the account's credentials are left untouched and the
/// caller must skip this account for the current pass.
pub async fn ensure_fresh<G, S>(
    gateway: &G,
    store: &S,
    account: &mut Account,
    now_epoch: i64,
) -> Result<bool>
where
    G: StravaApi,
    S: SyncStore,
{
    if !account.token_expires_within(now_epoch, REFRESH_MARGIN_SECS) {
        return Ok(false);
    }

    tracing::info!(athlete_id = account.strava_id, "Access token near expiry, refreshing");
    force_refresh(gateway, store, account).await?;
    Ok(true)
}

/// Refresh the account's credentials unconditionally and persist them.
///
/// Used by [`ensure_fresh`] and for the single retry after an unexpected
/// 401 mid-pass.
pub async fn force_refresh<G, S>(gateway: &G, store: &S, account: &mut Account) -> Result<()>
where
    G: StravaApi,
    S: SyncStore,
{
    let tokens = gateway
        .refresh_token(&account.refresh_token)
        .await
        .map_err(|e| {
            SyncError::CredentialInvalid(format!(
                "token refresh failed for athlete {}: {}",
                account.strava_id, e
            ))
        })?;

    // Access token, refresh token, and expiry move together.
    account.access_token = tokens.access_token;
    account.refresh_token = tokens.refresh_token;
    account.token_expires_at = tokens.expires_at;

    store.upsert_account(account).await?;

    tracing::info!(athlete_id = account.strava_id, "Token refreshed");
    Ok(())
}
