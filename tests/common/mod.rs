// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared fakes for sync engine integration tests.
//!
//! Both fakes are cheaply cloneable handles over shared state, mirroring
//! the production client types, so tests can keep a handle for inspection
//! after handing a clone to the engine.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use strava_collector::db::SyncStore;
use strava_collector::error::{Result, SyncError};
use strava_collector::models::{Account, Activity};
use strava_collector::services::strava::{
    AthleteProfile, StravaApi, TokenExchangeResponse, TokenResponse,
};

/// Token expiry far enough out that no refresh triggers.
pub const FAR_FUTURE_EPOCH: i64 = 4_000_000_000;

// ─── Accounts and payloads ───────────────────────────────────────────────

/// An active account whose token will not need refreshing.
pub fn test_account(strava_id: u64) -> Account {
    Account {
        strava_id,
        firstname: Some("Test".to_string()),
        lastname: Some("Athlete".to_string()),
        email: None,
        access_token: format!("access_{}", strava_id),
        refresh_token: format!("refresh_{}", strava_id),
        token_expires_at: FAR_FUTURE_EPOCH,
        created_at: "2024-01-01T00:00:00Z".to_string(),
        last_sync: None,
        is_active: true,
    }
}

/// An active account whose token expires within the refresh margin.
pub fn expiring_account(strava_id: u64) -> Account {
    Account {
        token_expires_at: chrono::Utc::now().timestamp() + 60,
        ..test_account(strava_id)
    }
}

/// A summary qualifying for enrichment: 5 km run, 35 minutes.
pub fn run_summary(id: u64) -> Value {
    json!({
        "id": id,
        "name": "Morning Run",
        "sport_type": "Run",
        "start_date_local": "2024-01-15T08:00:00Z",
        "distance": 5000.0,
        "elapsed_time": 2100,
        "moving_time": 2000,
        "kudos_count": 2
    })
}

/// A summary that never qualifies for enrichment: 200 m walk.
pub fn walk_summary(id: u64) -> Value {
    json!({
        "id": id,
        "name": "Short Walk",
        "sport_type": "Walk",
        "start_date_local": "2024-01-15T12:00:00Z",
        "distance": 200.0,
        "elapsed_time": 180
    })
}

// ─── In-memory store ─────────────────────────────────────────────────────

/// In-memory [`SyncStore`] keyed by Strava ID.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    accounts: Mutex<HashMap<u64, Account>>,
    activities: Mutex<HashMap<u64, Activity>>,
}

impl MemoryStore {
    pub fn insert_account(&self, account: Account) {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .insert(account.strava_id, account);
    }

    pub fn account(&self, strava_id: u64) -> Option<Account> {
        self.inner.accounts.lock().unwrap().get(&strava_id).cloned()
    }

    pub fn activity(&self, strava_id: u64) -> Option<Activity> {
        self.inner
            .activities
            .lock()
            .unwrap()
            .get(&strava_id)
            .cloned()
    }

    pub fn activity_count(&self) -> usize {
        self.inner.activities.lock().unwrap().len()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn list_active_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .inner
            .accounts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        // Deterministic processing order for assertions
        accounts.sort_by_key(|a| a.strava_id);
        Ok(accounts)
    }

    async fn get_account(&self, strava_id: u64) -> Result<Option<Account>> {
        Ok(self.account(strava_id))
    }

    async fn upsert_account(&self, account: &Account) -> Result<()> {
        self.insert_account(account.clone());
        Ok(())
    }

    async fn get_activity(&self, strava_id: u64) -> Result<Option<Activity>> {
        Ok(self.activity(strava_id))
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<()> {
        self.inner
            .activities
            .lock()
            .unwrap()
            .insert(activity.strava_id, activity.clone());
        Ok(())
    }
}

// ─── Scripted gateway ────────────────────────────────────────────────────

/// Scripted [`StravaApi`] fake serving fixed pages and details.
#[derive(Clone, Default)]
pub struct FakeStrava {
    inner: Arc<FakeStravaInner>,
}

#[derive(Default)]
struct FakeStravaInner {
    pages: Mutex<Vec<Vec<Value>>>,
    details: Mutex<HashMap<u64, Value>>,
    failing_refresh_tokens: Mutex<HashSet<String>>,
    failing_page: Mutex<Option<u32>>,
    unauthorized_once: AtomicBool,
    page_calls: AtomicU32,
    detail_calls: AtomicU32,
    refresh_calls: AtomicU32,
}

impl FakeStrava {
    /// Append a page of summaries; page numbers map to insertion order.
    pub fn push_page(&self, records: Vec<Value>) {
        self.inner.pages.lock().unwrap().push(records);
    }

    pub fn add_detail(&self, activity_id: u64, detail: Value) {
        self.inner.details.lock().unwrap().insert(activity_id, detail);
    }

    /// Make refreshes with this refresh token fail.
    pub fn fail_refresh(&self, refresh_token: &str) {
        self.inner
            .failing_refresh_tokens
            .lock()
            .unwrap()
            .insert(refresh_token.to_string());
    }

    /// Make fetches of this page number fail with a transient error.
    pub fn fail_page(&self, page: u32) {
        *self.inner.failing_page.lock().unwrap() = Some(page);
    }

    /// Reject the next page fetch with a 401, once.
    pub fn reject_next_page_unauthorized(&self) {
        self.inner.unauthorized_once.store(true, Ordering::SeqCst);
    }

    pub fn page_calls(&self) -> u32 {
        self.inner.page_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> u32 {
        self.inner.detail_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StravaApi for FakeStrava {
    async fn fetch_athlete(&self, _access_token: &str) -> Result<AthleteProfile> {
        Ok(AthleteProfile::default())
    }

    async fn fetch_activity_page(
        &self,
        _access_token: &str,
        _after: i64,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<Value>> {
        self.inner.page_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.unauthorized_once.swap(false, Ordering::SeqCst) {
            return Err(SyncError::CredentialInvalid("scripted 401".to_string()));
        }
        if *self.inner.failing_page.lock().unwrap() == Some(page) {
            return Err(SyncError::Api("scripted page failure".to_string()));
        }

        let pages = self.inner.pages.lock().unwrap();
        Ok(pages.get((page - 1) as usize).cloned().unwrap_or_default())
    }

    async fn fetch_activity_detail(&self, _access_token: &str, activity_id: u64) -> Result<Value> {
        self.inner.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .details
            .lock()
            .unwrap()
            .get(&activity_id)
            .cloned()
            .ok_or_else(|| SyncError::Api(format!("no detail scripted for {}", activity_id)))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .inner
            .failing_refresh_tokens
            .lock()
            .unwrap()
            .contains(refresh_token)
        {
            return Err(SyncError::Api("invalid_grant".to_string()));
        }

        Ok(TokenResponse {
            access_token: "refreshed_access".to_string(),
            refresh_token: "refreshed_refresh".to_string(),
            expires_at: FAR_FUTURE_EPOCH,
        })
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenExchangeResponse> {
        Err(SyncError::Api("exchange not scripted".to_string()))
    }
}
