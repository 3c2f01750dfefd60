// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching activities and managing tokens.
//!
//! Handles:
//! - Bearer credential injection on every call
//! - Rate limit detection with bounded sleep-and-retry (Retry-After)
//! - Token refresh and authorization-code exchange
//! - Paginated activity listing with raw JSON payloads

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SyncError};

/// Default backoff when Strava omits the Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Maximum sleep-and-retry cycles per request before the rate limit is
/// escalated to a transient API error.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Bounded timeout applied to every remote call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote API operations the sync engine depends on.
///
/// Page and detail payloads are raw JSON so callers can persist the response
/// verbatim and skip individual malformed records without losing the page.
#[async_trait]
pub trait StravaApi: Send + Sync {
    /// Get the authenticated athlete's profile.
    async fn fetch_athlete(&self, access_token: &str) -> Result<AthleteProfile>;

    /// Fetch one page of activity summaries started after `after` (epoch
    /// seconds). Pages are 1-based; a page shorter than `per_page` is the
    /// last one.
    async fn fetch_activity_page(
        &self,
        access_token: &str,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>>;

    /// Fetch the full detail representation of one activity.
    async fn fetch_activity_detail(&self, access_token: &str, activity_id: u64) -> Result<Value>;

    /// Exchange a refresh token for a new credential pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// Exchange an authorization code for a first credential pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse>;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self::with_endpoints(
            client_id,
            client_secret,
            "https://www.strava.com/api/v3".to_string(),
            "https://www.strava.com/oauth".to_string(),
        )
    }

    /// Create a client against alternate endpoints (used by tests).
    pub fn with_endpoints(
        client_id: String,
        client_secret: String,
        api_base: String,
        oauth_base: String,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            api_base,
            oauth_base,
            client_id,
            client_secret,
        }
    }

    /// Execute a request, absorbing rate limits by sleeping for the
    /// server-supplied delay and retrying, up to a fixed number of cycles.
    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut rate_limit_hits = 0u32;

        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| SyncError::Api("request cannot be cloned for retry".to_string()))?;

            let response = request
                .send()
                .await
                .map_err(|e| SyncError::Api(e.to_string()))?;

            match check_response(response).await {
                Err(SyncError::RateLimited { retry_after_secs }) => {
                    rate_limit_hits += 1;
                    if rate_limit_hits > MAX_RATE_LIMIT_RETRIES {
                        return Err(SyncError::Api(format!(
                            "rate limit persisted after {} retries",
                            MAX_RATE_LIMIT_RETRIES
                        )));
                    }
                    tracing::warn!(
                        retry_after_secs,
                        attempt = rate_limit_hits,
                        "Strava rate limit hit (429), backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                }
                other => return other,
            }
        }
    }

    /// Execute a request and parse the JSON body.
    async fn execute_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T> {
        self.execute(builder)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Api(format!("JSON parse error: {}", e)))
    }

    /// Generic GET request with bearer auth and JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T> {
        self.execute_json(self.http.get(url).bearer_auth(access_token))
            .await
    }

    /// POST to the OAuth token endpoint with the given grant parameters.
    async fn post_token_form<T: for<'de> Deserialize<'de>>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/token", self.oauth_base);
        self.execute_json(self.http.post(&url).form(params)).await
    }
}

/// Map a non-success response to the matching error kind.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Rate limit: honored by the caller via sleep-and-retry
    if status.as_u16() == 429 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(SyncError::RateLimited { retry_after_secs });
    }

    // Unauthorized: token expired or revoked
    if status.as_u16() == 401 {
        return Err(SyncError::CredentialInvalid(
            "Strava rejected access token (401)".to_string(),
        ));
    }

    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Api(format!("HTTP {}: {}", status, body)))
}

#[async_trait]
impl StravaApi for StravaClient {
    async fn fetch_athlete(&self, access_token: &str) -> Result<AthleteProfile> {
        let url = format!("{}/athlete", self.api_base);
        self.get_json(&url, access_token).await
    }

    async fn fetch_activity_page(
        &self,
        access_token: &str,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/athlete/activities", self.api_base);
        self.execute_json(
            self.http
                .get(&url)
                .bearer_auth(access_token)
                .query(&[
                    ("after", after.to_string()),
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ]),
        )
        .await
    }

    async fn fetch_activity_detail(&self, access_token: &str, activity_id: u64) -> Result<Value> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);
        self.get_json(&url, access_token).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse> {
        self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: AthleteProfile,
}

/// Athlete profile as returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AthleteProfile {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
