// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava Collector: incremental synchronization of Strava activities.
//!
//! This crate pulls activity data from the Strava API for every connected
//! athlete on a recurring schedule, refreshing OAuth tokens as they near
//! expiry, paginating under rate-limit backpressure, and upserting records
//! into Firestore with selective detail enrichment.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;
