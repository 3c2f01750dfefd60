// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Athletes (connected accounts with OAuth credentials)
//! - Activities (synchronized Strava activities)

use async_trait::async_trait;

use crate::db::{collections, SyncStore};
use crate::error::{Result, SyncError};
use crate::models::{Account, Activity};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| SyncError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without
        // needing a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            SyncError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| SyncError::Database("Database not connected (offline mode)".to_string()))
    }
}

#[async_trait]
impl SyncStore for FirestoreDb {
    async fn list_active_accounts(&self) -> Result<Vec<Account>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ATHLETES)
            .filter(|q| q.field("is_active").eq(true))
            .obj()
            .query()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))
    }

    async fn get_account(&self, strava_id: u64) -> Result<Option<Account>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ATHLETES)
            .obj()
            .one(&strava_id.to_string())
            .await
            .map_err(|e| SyncError::Database(e.to_string()))
    }

    async fn upsert_account(&self, account: &Account) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ATHLETES)
            .document_id(account.strava_id.to_string())
            .object(account)
            .execute()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_activity(&self, strava_id: u64) -> Result<Option<Activity>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(&strava_id.to_string())
            .await
            .map_err(|e| SyncError::Database(e.to_string()))
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(activity.strava_id.to_string())
            .object(activity)
            .execute()
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;
        Ok(())
    }
}
