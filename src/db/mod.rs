//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Account, Activity};

/// Collection names as constants.
pub mod collections {
    pub const ATHLETES: &str = "athletes";
    pub const ACTIVITIES: &str = "activities";
}

/// Storage operations the sync engine depends on.
///
/// The engine is generic over this trait so integration tests can substitute
/// an in-memory store. All upserts are keyed by Strava ID.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// All accounts with the active flag set.
    async fn list_active_accounts(&self) -> Result<Vec<Account>>;

    /// Look up one account by Strava athlete ID.
    async fn get_account(&self, strava_id: u64) -> Result<Option<Account>>;

    /// Create or update an account.
    async fn upsert_account(&self, account: &Account) -> Result<()>;

    /// Look up one activity by Strava activity ID.
    async fn get_activity(&self, strava_id: u64) -> Result<Option<Activity>>;

    /// Create or update an activity.
    async fn upsert_activity(&self, activity: &Activity) -> Result<()>;
}
