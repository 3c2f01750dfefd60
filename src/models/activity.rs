// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored activity record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored activity record in Firestore.
///
/// At most one record exists per Strava activity ID. The raw payload is an
/// immutable first-capture snapshot of the API response, except for the
/// one-time upgrade from summary to detail data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID (also used as document ID, the dedup key)
    pub strava_id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    /// Activity name/title
    pub name: Option<String>,
    /// Sport type (Run, Ride, Hike, etc.)
    pub sport_type: Option<String>,
    /// Local start date/time; absent when the API omitted or mangled it
    pub start_date: Option<DateTime<Utc>>,
    /// Timezone string as reported by Strava
    pub timezone: Option<String>,
    /// Elapsed time in seconds
    pub elapsed_time: Option<i64>,
    /// Moving time in seconds
    pub moving_time: Option<i64>,
    /// Distance in meters
    pub distance: Option<f64>,
    /// Average speed in m/s
    pub average_speed: Option<f64>,
    /// Max speed in m/s
    pub max_speed: Option<f64>,
    /// Total elevation gain in meters
    pub total_elevation_gain: Option<f64>,
    /// Average heart rate in bpm
    pub average_heartrate: Option<f64>,
    /// Max heart rate in bpm
    pub max_heartrate: Option<f64>,
    /// Average cadence
    pub average_cadence: Option<f64>,
    /// Kudos count
    pub kudos_count: i64,
    /// Comment count
    pub comment_count: i64,
    /// Verbatim JSON of the last API response (summary or detail).
    /// Opaque to the engine; it is stored and passed through, never parsed.
    pub raw_data: String,
    /// True iff `raw_data` holds the detail response, not the summary
    pub has_detailed_data: bool,
    /// When this record was first stored (RFC 3339)
    pub created_at: String,
    /// When this record was last mutated (RFC 3339)
    pub updated_at: String,
}
