//! HTTP client for the Strava activity API.
//!
//! Requests run strictly in sequence: token refresh first, then one activity
//! page at a time, since the next page is only worth requesting once the
//! previous one came back non-empty.
//!
//! The access token lives on the client. [`StravaClient::get_valid_token`]
//! refreshes it when it is within the configured margin of expiry.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::config::StravaConfig;
use crate::error::{PipelineError, Result};

const MAX_RETRIES: u32 = 3;

/// Helper to calculate elapsed milliseconds from an Instant
#[inline]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Long-lived credentials used to mint access tokens.
#[derive(Debug, Clone)]
pub struct StravaCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl StravaCredentials {
    /// Build credentials, naming the first one that is absent or blank.
    pub fn from_parts(
        client_id: Option<String>,
        client_secret: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<Self> {
        fn required(value: Option<String>, name: &str) -> Result<String> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PipelineError::MissingCredential {
                    name: name.to_string(),
                })
        }

        Ok(Self {
            client_id: required(client_id, "STRAVA_CLIENT_ID")?,
            client_secret: required(client_secret, "STRAVA_CLIENT_SECRET")?,
            refresh_token: required(refresh_token, "STRAVA_REFRESH_TOKEN")?,
        })
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Unix timestamp (seconds)
    expires_at: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: i64,
}

/// Gear reference embedded in an activity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GearSummary {
    #[serde(default)]
    pub name: Option<String>,
}

/// Summary activity as returned by the activity listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaActivity {
    #[serde(rename = "type", default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub sport_type: Option<String>,
    /// `[lat, lng]`; empty, null, or `[null, null]` for activities without GPS
    #[serde(default)]
    pub start_latlng: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub name: Option<String>,
    /// UTC start, e.g. `2024-05-01T12:00:00Z`
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub start_date_local: Option<String>,
    /// Meters
    #[serde(default)]
    pub distance: Option<f64>,
    /// Seconds
    #[serde(default)]
    pub moving_time: Option<f64>,
    #[serde(default)]
    pub gear: Option<GearSummary>,
}

impl StravaActivity {
    /// True when either type field names `run_type`.
    pub fn is_type(&self, run_type: &str) -> bool {
        self.activity_type.as_deref() == Some(run_type)
            || self.sport_type.as_deref() == Some(run_type)
    }
}

/// Anything that can list activities recorded after a Unix timestamp.
#[allow(async_fn_in_trait)]
pub trait ActivitySource {
    async fn fetch_activities_after(&mut self, after: i64) -> Result<Vec<StravaActivity>>;
}

/// Strava API client holding its own token state.
pub struct StravaClient {
    client: Client,
    config: StravaConfig,
    credentials: StravaCredentials,
    token: Option<AccessToken>,
}

impl StravaClient {
    pub fn new(config: StravaConfig, credentials: StravaCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PipelineError::Http {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            config,
            credentials,
            token: None,
        })
    }

    fn token_is_fresh(&self, now: i64) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| now + self.config.refresh_margin_secs < t.expires_at)
    }

    /// Return a bearer token, refreshing when absent or close to expiry.
    pub async fn get_valid_token(&mut self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        if !self.token_is_fresh(now) {
            self.refresh_token().await?;
        }
        self.token
            .as_ref()
            .map(|t| t.token.clone())
            .ok_or_else(|| PipelineError::Auth {
                message: "token endpoint returned no access token".to_string(),
            })
    }

    async fn refresh_token(&mut self) -> Result<()> {
        let start = Instant::now();
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", self.credentials.refresh_token.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| PipelineError::Http {
                message: format!("Token request failed: {}", e),
                status_code: None,
            })?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Auth {
                message: format!("token endpoint returned {}: {}", status, body),
            });
        }
        if !status.is_success() {
            return Err(PipelineError::Http {
                message: "Token refresh failed".to_string(),
                status_code: Some(status.as_u16()),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| PipelineError::Auth {
            message: format!("malformed token response: {}", e),
        })?;

        if let Some(rotated) = token.refresh_token.filter(|t| !t.is_empty()) {
            self.credentials.refresh_token = rotated;
        }
        self.token = Some(AccessToken {
            token: token.access_token,
            expires_at: token.expires_at,
        });

        info!(
            "[strava] Refreshed access token, expires at {} ({} ms)",
            token.expires_at,
            elapsed_ms(start)
        );
        Ok(())
    }

    /// Send a request, retrying 429 responses with exponential backoff.
    async fn send_with_retry(&self, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut retries = 0;
        loop {
            let response = build().send().await.map_err(|e| PipelineError::Http {
                message: format!("Request error: {}", e),
                status_code: None,
            })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                // 500ms, 1s, 2s
                let wait = Duration::from_millis(500 * (1 << retries));
                retries += 1;
                warn!(
                    "[strava] 429 Too Many Requests, retry {} after {:?}",
                    retries, wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                return Err(PipelineError::Http {
                    message: format!("Activity listing failed: {}", status),
                    status_code: Some(status.as_u16()),
                });
            }
            return Ok(response);
        }
    }

    /// Fetch one page of activities started after `after`.
    pub async fn fetch_page(&mut self, after: i64, page: u32) -> Result<Vec<StravaActivity>> {
        let token = self.get_valid_token().await?;
        let url = format!(
            "{}/athlete/activities",
            self.config.api_base_url.trim_end_matches('/')
        );
        let query = [
            ("after", after.to_string()),
            ("page", page.to_string()),
            ("per_page", self.config.per_page.to_string()),
        ];

        let start = Instant::now();
        let response = self
            .send_with_retry(|| self.client.get(&url).bearer_auth(&token).query(&query))
            .await?;
        let activities: Vec<StravaActivity> =
            response.json().await.map_err(|e| PipelineError::Http {
                message: format!("Malformed activity page {}: {}", page, e),
                status_code: None,
            })?;

        debug!(
            "[strava] Page {}: {} activities ({} ms)",
            page,
            activities.len(),
            elapsed_ms(start)
        );
        Ok(activities)
    }
}

impl ActivitySource for StravaClient {
    /// Page through all activities after `after` until an empty page.
    async fn fetch_activities_after(&mut self, after: i64) -> Result<Vec<StravaActivity>> {
        let start = Instant::now();
        let mut all = Vec::new();
        let mut exhausted = false;

        for page in 1..=self.config.max_pages {
            let activities = self.fetch_page(after, page).await?;
            if activities.is_empty() {
                exhausted = true;
                break;
            }
            all.extend(activities);
        }

        if !exhausted {
            warn!(
                "[strava] Stopped after {} pages without reaching an empty page",
                self.config.max_pages
            );
        }

        info!(
            "[strava] Fetched {} activities after {} ({} ms)",
            all.len(),
            after,
            elapsed_ms(start)
        );
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(margin: i64) -> StravaClient {
        let config = StravaConfig {
            refresh_margin_secs: margin,
            ..StravaConfig::default()
        };
        let credentials = StravaCredentials {
            client_id: "1".to_string(),
            client_secret: "s".to_string(),
            refresh_token: "r".to_string(),
        };
        StravaClient::new(config, credentials).unwrap()
    }

    #[test]
    fn test_credentials_name_missing_value() {
        let err = StravaCredentials::from_parts(
            Some("id".to_string()),
            Some("  ".to_string()),
            Some("refresh".to_string()),
        )
        .unwrap_err();
        assert!(
            matches!(err, PipelineError::MissingCredential { ref name } if name == "STRAVA_CLIENT_SECRET")
        );
    }

    #[test]
    fn test_token_freshness_respects_margin() {
        let mut c = client(300);
        assert!(!c.token_is_fresh(1_000));

        c.token = Some(AccessToken {
            token: "t".to_string(),
            expires_at: 2_000,
        });
        assert!(c.token_is_fresh(1_000));
        assert!(c.token_is_fresh(1_699));
        assert!(!c.token_is_fresh(1_700));
        assert!(!c.token_is_fresh(2_500));
    }

    #[test]
    fn test_activity_deserialization() {
        let json = r#"[
            {"type":"Run","sport_type":"TrailRun","start_latlng":[46.2,6.1],"name":"Lunch Run",
             "start_date":"2024-05-01T12:00:00Z","start_date_local":"2024-05-01T14:00:00Z",
             "distance":10012.5,"moving_time":3001,"gear":{"name":"Trail Shoes"}},
            {"type":"Run","start_latlng":[],"distance":null},
            {"sport_type":"Ride"},
            {"type":"Run","start_latlng":[null,null],"name":"Indoor"}
        ]"#;
        let activities: Vec<StravaActivity> = serde_json::from_str(json).unwrap();

        assert_eq!(activities.len(), 4);
        assert!(activities[0].is_type("Run"));
        assert!(activities[0].is_type("TrailRun"));
        assert_eq!(activities[0].moving_time, Some(3001.0));
        assert_eq!(
            activities[0].gear.as_ref().and_then(|g| g.name.as_deref()),
            Some("Trail Shoes")
        );
        assert!(activities[1].start_latlng.as_ref().is_some_and(|v| v.is_empty()));
        assert!(activities[1].distance.is_none());
        assert!(!activities[2].is_type("Run"));
        assert_eq!(activities[3].start_latlng, Some(vec![None, None]));
    }
}
