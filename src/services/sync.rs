// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Synchronization engine.
//!
//! Drives the per-account sync state machine:
//! 1. Ensure the OAuth token is fresh
//! 2. Compute the fetch window from the account's checkpoint
//! 3. Paginate activity summaries and reconcile each against storage,
//!    enriching qualifying records with a detail fetch
//! 4. Advance the checkpoint once the account completed cleanly
//!
//! One account's failure never blocks the others; errors are tallied into
//! [`RunStats`] and the pass always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::db::SyncStore;
use crate::error::{Result, SyncError};
use crate::models::{Account, Activity, RunStats};
use crate::services::strava::StravaApi;
use crate::services::tokens;
use crate::time_utils::format_utc_rfc3339;

/// Summaries fetched per page.
const DEFAULT_PAGE_SIZE: u32 = 200;

/// Sports whose qualifying activities warrant the costlier detail fetch.
const DETAIL_SPORTS: [&str; 4] = ["run", "ride", "virtualrun", "virtualride"];

/// Detail fetch thresholds: distance in meters, elapsed in seconds.
const DETAIL_MIN_DISTANCE: f64 = 1000.0;
const DETAIL_MIN_ELAPSED: i64 = 600;

/// Parameters for one sync pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Lookback for accounts that have never been synced, in days.
    pub days_back: i64,
    /// When set, process exactly this athlete instead of all active ones.
    pub athlete_id: Option<u64>,
}

/// Pacing delays inserted between remote calls to respect Strava's
/// informal rate limits even when no 429 is returned.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Between consecutive page requests
    pub page_delay: Duration,
    /// Between reconciled records
    pub record_delay: Duration,
    /// After each detail fetch
    pub detail_delay: Duration,
    /// Between accounts
    pub account_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(500),
            record_delay: Duration::from_millis(200),
            detail_delay: Duration::from_millis(500),
            account_delay: Duration::from_secs(2),
        }
    }
}

impl Pacing {
    /// No delays. For tests.
    pub fn none() -> Self {
        Self {
            page_delay: Duration::ZERO,
            record_delay: Duration::ZERO,
            detail_delay: Duration::ZERO,
            account_delay: Duration::ZERO,
        }
    }
}

/// What reconciling one summary record did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// First sighting, record stored
    Created,
    /// Existing record upgraded with detail data
    Updated,
    /// Record already stored and nothing to do
    Skipped,
}

/// Per-account tallies folded into [`RunStats`].
#[derive(Debug, Default)]
struct AccountOutcome {
    created: u32,
    updated: u32,
    errors: u32,
    /// True when pagination finished and the checkpoint was advanced
    completed: bool,
}

/// The synchronization engine.
///
/// Stateless between passes; constructed with explicit gateway and store
/// dependencies so tests can substitute fakes for either.
pub struct SyncEngine<G, S> {
    gateway: G,
    store: S,
    per_page: u32,
    pacing: Pacing,
}

impl<G, S> SyncEngine<G, S>
where
    G: StravaApi,
    S: SyncStore,
{
    pub fn new(gateway: G, store: S) -> Self {
        Self {
            gateway,
            store,
            per_page: DEFAULT_PAGE_SIZE,
            pacing: Pacing::default(),
        }
    }

    /// Override pacing delays (tests run without sleeping).
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Override the page size used for activity listing.
    pub fn with_page_size(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Run one synchronization pass and report aggregate statistics.
    ///
    /// Fails only when the pass cannot start at all (storage unreachable);
    /// every per-account and per-record failure is tallied and logged
    /// instead. Cancellation is honored between accounts, never mid-account.
    pub async fn run_pass(&self, opts: &SyncOptions, cancel: &AtomicBool) -> Result<RunStats> {
        let accounts = match opts.athlete_id {
            Some(id) => match self.store.get_account(id).await? {
                Some(account) if account.is_active => vec![account],
                _ => {
                    tracing::warn!(athlete_id = id, "Athlete not found or inactive");
                    return Ok(RunStats::default());
                }
            },
            None => self.store.list_active_accounts().await?,
        };

        tracing::info!(
            count = accounts.len(),
            days_back = opts.days_back,
            "Starting sync pass"
        );

        let mut stats = RunStats::default();
        for (i, mut account) in accounts.into_iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!("Sync pass cancelled, stopping before next account");
                break;
            }
            if i > 0 {
                // Smooth the aggregate request rate across the population.
                pause(self.pacing.account_delay).await;
            }

            let outcome = self.sync_account(&mut account, opts.days_back).await;
            if outcome.completed {
                stats.accounts += 1;
            }
            stats.created += outcome.created;
            stats.updated += outcome.updated;
            stats.errors += outcome.errors;
        }

        tracing::info!(
            accounts = stats.accounts,
            created = stats.created,
            updated = stats.updated,
            errors = stats.errors,
            "Sync pass complete"
        );
        Ok(stats)
    }

    /// Sync one account through the full state machine. Never fails the
    /// pass; all errors end up in the outcome tallies.
    async fn sync_account(&self, account: &mut Account, days_back: i64) -> AccountOutcome {
        let mut outcome = AccountOutcome::default();
        let now = Utc::now();

        if let Err(e) =
            tokens::ensure_fresh(&self.gateway, &self.store, account, now.timestamp()).await
        {
            tracing::warn!(
                athlete_id = account.strava_id,
                error = %e,
                "Skipping account, credential check failed"
            );
            outcome.errors += 1;
            return outcome;
        }

        let after = sync_window_start(account.last_sync, days_back, now);
        tracing::info!(
            athlete_id = account.strava_id,
            after = %format_utc_rfc3339(after),
            "Syncing athlete activities"
        );

        let mut page: u32 = 1;
        let mut auth_retried = false;
        let mut fetch_failed = false;

        loop {
            let batch = match self
                .gateway
                .fetch_activity_page(&account.access_token, after.timestamp(), page, self.per_page)
                .await
            {
                Ok(batch) => batch,
                Err(e) if e.is_credential_error() && !auth_retried => {
                    // Token expired between the freshness check and this
                    // request. Refresh and retry the page once, never loop.
                    auth_retried = true;
                    match tokens::force_refresh(&self.gateway, &self.store, account).await {
                        Ok(()) => continue,
                        Err(refresh_err) => {
                            tracing::warn!(
                                athlete_id = account.strava_id,
                                error = %refresh_err,
                                "Mid-pass token refresh failed"
                            );
                            outcome.errors += 1;
                            fetch_failed = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        athlete_id = account.strava_id,
                        page,
                        error = %e,
                        "Activity page fetch failed"
                    );
                    outcome.errors += 1;
                    fetch_failed = true;
                    break;
                }
            };

            let fetched = batch.len();
            for raw in &batch {
                match self.reconcile(account, raw).await {
                    Ok(ReconcileOutcome::Created) => outcome.created += 1,
                    Ok(ReconcileOutcome::Updated) => outcome.updated += 1,
                    Ok(ReconcileOutcome::Skipped) => {}
                    Err(e) => {
                        tracing::warn!(
                            athlete_id = account.strava_id,
                            error = %e,
                            "Failed to reconcile activity"
                        );
                        outcome.errors += 1;
                    }
                }
                pause(self.pacing.record_delay).await;
            }

            // A short page is the last one.
            if fetched < self.per_page as usize {
                break;
            }
            page += 1;
            pause(self.pacing.page_delay).await;
        }

        if !fetch_failed {
            // The checkpoint advances only when pagination completed. After
            // a failed page the old checkpoint stands and the next pass
            // re-covers the window; the dedup key absorbs the re-fetch.
            account.last_sync = Some(Utc::now());
            match self.store.upsert_account(account).await {
                Ok(()) => outcome.completed = true,
                Err(e) => {
                    tracing::warn!(
                        athlete_id = account.strava_id,
                        error = %e,
                        "Failed to advance sync checkpoint"
                    );
                    outcome.errors += 1;
                }
            }
        }

        tracing::info!(
            athlete_id = account.strava_id,
            created = outcome.created,
            updated = outcome.updated,
            errors = outcome.errors,
            "Athlete sync finished"
        );
        outcome
    }

    /// Reconcile one fetched summary against storage.
    ///
    /// New records are stored from the summary, upgraded to detail data
    /// when the enrichment policy applies and the detail fetch succeeds.
    /// Stored records get the one-time detail upgrade or are left alone:
    /// a fresher summary never overwrites a captured payload.
    async fn reconcile(&self, account: &Account, raw: &Value) -> Result<ReconcileOutcome> {
        let summary = parse_summary(raw)?;
        let now = format_utc_rfc3339(Utc::now());

        match self.store.get_activity(summary.id).await? {
            None => {
                let mut activity = build_activity(account.strava_id, &summary, raw, &now);
                if needs_detail(&summary) {
                    match self
                        .fetch_detail_paced(&account.access_token, summary.id)
                        .await
                    {
                        Ok(detail) => {
                            activity.raw_data = detail.to_string();
                            activity.has_detailed_data = true;
                        }
                        Err(e) => {
                            tracing::warn!(
                                activity_id = summary.id,
                                error = %e,
                                "Detail fetch failed, keeping summary payload"
                            );
                        }
                    }
                }
                self.store.upsert_activity(&activity).await?;
                Ok(ReconcileOutcome::Created)
            }
            Some(mut existing) => {
                if !existing.has_detailed_data && needs_detail(&summary) {
                    match self
                        .fetch_detail_paced(&account.access_token, summary.id)
                        .await
                    {
                        Ok(detail) => {
                            existing.raw_data = detail.to_string();
                            existing.has_detailed_data = true;
                            existing.updated_at = now;
                            self.store.upsert_activity(&existing).await?;
                            Ok(ReconcileOutcome::Updated)
                        }
                        Err(e) => {
                            tracing::warn!(
                                activity_id = summary.id,
                                error = %e,
                                "Detail fetch failed, record left undetailed"
                            );
                            Ok(ReconcileOutcome::Skipped)
                        }
                    }
                } else {
                    Ok(ReconcileOutcome::Skipped)
                }
            }
        }
    }

    /// Fetch an activity's detail payload, pacing after the call.
    async fn fetch_detail_paced(&self, access_token: &str, activity_id: u64) -> Result<Value> {
        let detail = self
            .gateway
            .fetch_activity_detail(access_token, activity_id)
            .await;
        pause(self.pacing.detail_delay).await;
        detail
    }
}

/// Sleep unless the delay is zero.
async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Start of the fetch window for an account.
///
/// With a prior checkpoint the window opens one hour before it, tolerating
/// clock skew and activities still in flight at the previous boundary;
/// duplicates from the overlap are absorbed by the dedup key. Without one,
/// the window opens `days_back` days before now. The end is implicitly now.
pub fn sync_window_start(
    last_sync: Option<DateTime<Utc>>,
    days_back: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match last_sync {
        Some(checkpoint) => checkpoint - chrono::Duration::hours(1),
        None => now - chrono::Duration::days(days_back),
    }
}

/// Whether a summary warrants the costlier detail fetch: a (virtual) run or
/// ride longer than 1 km and 10 minutes. Bounds detail-endpoint usage to
/// records likely to be analytically interesting.
pub fn needs_detail(summary: &ActivitySummary) -> bool {
    let sport = summary
        .sport_type
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();

    DETAIL_SPORTS.contains(&sport.as_str())
        && summary.distance.unwrap_or(0.0) > DETAIL_MIN_DISTANCE
        && summary.elapsed_time.unwrap_or(0) > DETAIL_MIN_ELAPSED
}

/// The fields of a summary payload the engine interprets. Everything the
/// remote API may omit is optional; social counters default to zero.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivitySummary {
    pub id: u64,
    pub name: Option<String>,
    pub sport_type: Option<String>,
    pub start_date: Option<String>,
    pub start_date_local: Option<String>,
    pub timezone: Option<String>,
    pub elapsed_time: Option<i64>,
    pub moving_time: Option<i64>,
    pub distance: Option<f64>,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub total_elevation_gain: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_cadence: Option<f64>,
    #[serde(default)]
    pub kudos_count: i64,
    #[serde(default)]
    pub comment_count: i64,
}

/// Parse a raw summary payload. A payload without a usable `id` cannot be
/// deduplicated and is rejected as malformed.
pub fn parse_summary(raw: &Value) -> Result<ActivitySummary> {
    serde_json::from_value(raw.clone())
        .map_err(|e| SyncError::MalformedRecord(format!("unusable activity summary: {}", e)))
}

/// Build a stored record from a summary and its verbatim payload.
fn build_activity(athlete_id: u64, summary: &ActivitySummary, raw: &Value, now: &str) -> Activity {
    Activity {
        strava_id: summary.id,
        athlete_id,
        name: summary.name.clone(),
        sport_type: summary.sport_type.clone(),
        start_date: parse_start_date(summary),
        timezone: summary.timezone.clone(),
        elapsed_time: summary.elapsed_time,
        moving_time: summary.moving_time,
        distance: summary.distance,
        average_speed: summary.average_speed,
        max_speed: summary.max_speed,
        total_elevation_gain: summary.total_elevation_gain,
        average_heartrate: summary.average_heartrate,
        max_heartrate: summary.max_heartrate,
        average_cadence: summary.average_cadence,
        kudos_count: summary.kudos_count,
        comment_count: summary.comment_count,
        raw_data: raw.to_string(),
        has_detailed_data: false,
        created_at: now.to_string(),
        updated_at: now.to_string(),
    }
}

/// Parse the start date, preferring the local variant the way the list
/// endpoint reports it. An unparseable date degrades to none.
fn parse_start_date(summary: &ActivitySummary) -> Option<DateTime<Utc>> {
    let raw_date = summary
        .start_date_local
        .as_deref()
        .or(summary.start_date.as_deref())?;

    match DateTime::parse_from_rfc3339(raw_date) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(
                activity_id = summary.id,
                error = %e,
                "Unparseable start date, storing record without one"
            );
            None
        }
    }
}
