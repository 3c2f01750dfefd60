// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava Collector CLI
//!
//! Runs incremental synchronization passes over connected athletes, meant
//! to be invoked by cron or a scheduled task. Also registers new athletes
//! from already-issued OAuth authorization codes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strava_collector::{
    config::Config,
    db::{FirestoreDb, SyncStore},
    models::Account,
    services::{StravaApi, StravaClient, SyncEngine, SyncOptions},
    time_utils::format_utc_rfc3339,
};

#[derive(Parser)]
#[command(name = "strava-collector")]
#[command(version)]
#[command(about = "Incremental Strava activity collector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synchronization pass over connected athletes
    Sync {
        /// Days to look back for athletes that have never been synced
        /// (use a large value such as 180 for a historical backfill)
        #[arg(long, default_value_t = 7)]
        days: i64,

        /// Sync a single athlete by Strava ID instead of all active ones
        #[arg(long)]
        athlete_id: Option<u64>,
    },
    /// Register an athlete from an already-issued authorization code
    Authorize {
        /// OAuth authorization code obtained out of band
        #[arg(long)]
        code: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db = FirestoreDb::new(&config.gcp_project_id).await?;
    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );

    match cli.command {
        Commands::Sync { days, athlete_id } => {
            let cancel = Arc::new(AtomicBool::new(false));
            let cancel_flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Ctrl-C received, stopping after the current account");
                    cancel_flag.store(true, Ordering::Relaxed);
                }
            });

            let engine = SyncEngine::new(strava, db);
            let stats = engine
                .run_pass(
                    &SyncOptions {
                        days_back: days,
                        athlete_id,
                    },
                    &cancel,
                )
                .await?;

            if stats.has_errors() {
                std::process::exit(1);
            }
        }
        Commands::Authorize { code } => {
            authorize(&strava, &db, &code).await?;
        }
    }

    Ok(())
}

/// Exchange an authorization code and store the connected athlete.
async fn authorize(strava: &StravaClient, db: &FirestoreDb, code: &str) -> anyhow::Result<()> {
    let exchange = strava.exchange_code(code).await?;

    // The exchange response embeds a summary profile; prefer the full one.
    let profile = match strava.fetch_athlete(&exchange.access_token).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "Profile fetch failed, using exchange payload");
            exchange.athlete.clone()
        }
    };

    let account = Account {
        strava_id: profile.id,
        firstname: profile.firstname,
        lastname: profile.lastname,
        email: profile.email,
        access_token: exchange.access_token,
        refresh_token: exchange.refresh_token,
        token_expires_at: exchange.expires_at,
        created_at: format_utc_rfc3339(chrono::Utc::now()),
        last_sync: None,
        is_active: true,
    };

    db.upsert_account(&account).await?;

    tracing::info!(
        athlete_id = account.strava_id,
        "Athlete connected and stored"
    );
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strava_collector=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
