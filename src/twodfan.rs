//! Check-in flow for the 2DFan site.
//!
//! The simpler sibling of the lightnovel flow: plain JSON responses, a
//! cookie-based session, one access token fetched fresh each run, and a
//! single check-in call instead of a task decomposition. The cookie header
//! is persisted in the shared [`SessionStore`] as an opaque credential of
//! the form `<uid>|<cookie header>`, so the uid needed by the user-info
//! endpoint is recoverable by the same delimiter convention the other
//! site's key uses.

use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE, USER_AGENT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::TwodfanConfig;
use crate::error::{CheckinError, Result};
use crate::report;
use crate::session::SessionStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Session-cache identity for a 2DFan account.
fn cache_identity(username: &str) -> String {
    format!("2dfan:{username}")
}

/// User statistics returned by the user-info endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TwodfanProfile {
    pub points: i64,
    pub checkins_count: i64,
    pub serial_checkins: i64,
    pub checkin_rank: i64,
}

/// Result of the check-in call.
#[derive(Debug, Clone)]
pub struct TwodfanOutcome {
    /// Points granted by this check-in (0 when already checked in).
    pub points: i64,
    pub serial_checkins: i64,
    pub checkins_count: i64,
    /// The remote reports all-zero stats when today was already claimed.
    pub already_checked: bool,
}

/// Aggregated result for the report builder.
#[derive(Debug, Clone)]
pub struct TwodfanSummary {
    pub username: String,
    pub outcome: TwodfanOutcome,
    /// Authoritative points balance after the run.
    pub points_after: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    id: Option<i64>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CheckinResponse {
    points: i64,
    serial_checkins: i64,
    checkins_count: i64,
}

/// HTTP client for the 2DFan API.
///
/// Cookies are tracked by hand (a plain name → value map) so the session
/// can round-trip through the cache file as a single string.
pub struct TwodfanClient {
    base_url: String,
    client: reqwest::Client,
    cookies: BTreeMap<String, String>,
    access_token: Option<String>,
    uid: Option<i64>,
    display_name: String,
}

impl TwodfanClient {
    /// Create a client for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Dart/2.12 (dart:io)"));
        headers.insert("Accept-Language", HeaderValue::from_static("zh-cn"));
        headers.insert("Accept-Encoding", HeaderValue::from_static("gzip"));
        headers.insert("Platform", HeaderValue::from_static("android"));
        headers.insert("Token", HeaderValue::from_static("app2dfan_test"));
        headers.insert("Referer", HeaderValue::from_static("https://api.galge.fun/"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CheckinError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            cookies: BTreeMap::new(),
            access_token: None,
            uid: None,
            display_name: String::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Serialize the session as `<uid>|<cookie header>` for the cache.
    pub fn credential(&self) -> Option<String> {
        let uid = self.uid?;
        if self.cookies.is_empty() {
            return None;
        }
        Some(format!("{uid}|{}", self.cookie_header()))
    }

    /// Restore a session from a cached credential string.
    pub fn restore(&mut self, credential: &str) -> bool {
        let Some((uid, cookies)) = credential.split_once('|') else {
            return false;
        };
        let Ok(uid) = uid.parse::<i64>() else {
            return false;
        };
        self.uid = Some(uid);
        self.cookies = cookies
            .split("; ")
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        !self.cookies.is_empty()
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn absorb_cookies(&mut self, response: &reqwest::Response) {
        for value in response.headers().get_all(SET_COOKIE) {
            let Ok(cookie) = value.to_str() else { continue };
            let head = cookie.split(';').next().unwrap_or_default();
            if let Some((name, value)) = head.split_once('=') {
                self.cookies.insert(name.trim().to_owned(), value.to_owned());
            }
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if !self.cookies.is_empty() {
            builder = builder.header("Cookie", self.cookie_header());
        }
        if let Some(token) = &self.access_token {
            builder = builder.header("Access-Token", token.clone());
        }
        builder
    }

    /// Fetch a fresh access token; required before any other call.
    pub async fn fetch_access_token(&mut self) -> Result<()> {
        tracing::info!("fetching access token");
        let response = self
            .request(reqwest::Method::POST, "/api/static/token")
            .send()
            .await
            .map_err(|e| CheckinError::Network(format!("token request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CheckinError::Network(format!(
                "token request failed: HTTP {}",
                response.status()
            )));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CheckinError::decode(format!("token response: {e}"), &[]))?;
        match body.token {
            Some(token) if !token.is_empty() => {
                self.access_token = Some(token);
                Ok(())
            }
            _ => Err(CheckinError::Auth("token response carries no token".to_owned())),
        }
    }

    /// Log in with username/password, capturing the session cookies.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        tracing::info!(%username, "logging in");
        let response = self
            .request(reqwest::Method::POST, "/api/users/sign_in")
            .json(&serde_json::json!({"login": username, "password": password}))
            .send()
            .await
            .map_err(|e| CheckinError::Network(format!("login request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CheckinError::Auth("wrong username or password".to_owned()));
        }
        if !response.status().is_success() {
            return Err(CheckinError::Network(format!(
                "login failed: HTTP {}",
                response.status()
            )));
        }

        self.absorb_cookies(&response);
        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| CheckinError::decode(format!("login response: {e}"), &[]))?;
        match body.id {
            Some(id) => {
                self.uid = Some(id);
                self.display_name = body.name;
                tracing::info!(uid = id, name = %self.display_name, "login succeeded");
                Ok(())
            }
            None => Err(CheckinError::Auth("login response carries no user id".to_owned())),
        }
    }

    /// Fetch user statistics; doubles as the session liveness check.
    pub async fn user_info(&mut self) -> Result<TwodfanProfile> {
        let uid = self
            .uid
            .ok_or_else(|| CheckinError::Auth("no uid, not logged in".to_owned()))?;

        // The double slash is part of the wire contract.
        let path = format!("/api/users//{uid}");
        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(|e| CheckinError::Network(format!("user info request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CheckinError::Auth(format!(
                "user info rejected: HTTP {}",
                response.status()
            )));
        }
        self.absorb_cookies(&response);
        response
            .json()
            .await
            .map_err(|e| CheckinError::decode(format!("user info response: {e}"), &[]))
    }

    /// Perform the daily check-in.
    pub async fn checkin(&mut self) -> Result<TwodfanOutcome> {
        tracing::info!("checking in");
        let response = self
            .request(reqwest::Method::POST, "/api/checkins")
            .send()
            .await
            .map_err(|e| CheckinError::Network(format!("check-in request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CheckinError::Api {
                code: i64::from(response.status().as_u16()),
                message: "check-in rejected".to_owned(),
            });
        }
        let body: CheckinResponse = response
            .json()
            .await
            .map_err(|e| CheckinError::decode(format!("check-in response: {e}"), &[]))?;

        // All-zero stats signal that today was already claimed.
        let already_checked =
            body.points == 0 && body.checkins_count == 0 && body.serial_checkins == 0;
        if already_checked {
            tracing::info!("already checked in today");
        } else {
            tracing::info!(
                points = body.points,
                serial = body.serial_checkins,
                total = body.checkins_count,
                "check-in succeeded"
            );
        }
        Ok(TwodfanOutcome {
            points: body.points,
            serial_checkins: body.serial_checkins,
            checkins_count: body.checkins_count,
            already_checked,
        })
    }
}

/// Run the full 2DFan check-in and return the notification message.
///
/// # Errors
///
/// Missing credentials, token/login failure, or a rejected check-in call.
pub async fn run(config: &TwodfanConfig, store: &SessionStore) -> Result<String> {
    if !config.has_credentials() {
        return Err(CheckinError::Config(
            "2dfan: no username/password configured".to_owned(),
        ));
    }

    let mut client = TwodfanClient::new(&config.base_url)?;
    client.fetch_access_token().await?;

    let identity = cache_identity(&config.username);
    let mut profile = None;

    if let Some(credential) = store.get(&identity)
        && client.restore(&credential)
    {
        match client.user_info().await {
            Ok(info) => {
                tracing::info!("cached session is live, skipping login");
                profile = Some(info);
            }
            Err(e) => tracing::warn!(error = %e, "cached session rejected"),
        }
    }

    if profile.is_none() {
        client.login(&config.username, &config.password).await?;
        if let Some(credential) = client.credential() {
            store.put(&identity, &credential);
        }
        profile = Some(client.user_info().await.map_err(|e| {
            CheckinError::Auth(format!("user info failed right after login: {e}"))
        })?);
    }

    let before = profile.unwrap_or_default();
    tracing::info!(points = before.points, "points before check-in");

    let mut outcome = client.checkin().await?;

    // Refresh for authoritative balances; fill in the stats the remote
    // omits when today was already claimed.
    let after = match client.user_info().await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(error = %e, "final profile fetch failed, reporting stale stats");
            before.clone()
        }
    };
    if outcome.already_checked {
        outcome.serial_checkins = after.serial_checkins;
        outcome.checkins_count = after.checkins_count;
    }

    let display = if client.display_name.is_empty() {
        config.username.clone()
    } else {
        client.display_name.clone()
    };
    Ok(report::twodfan_success(&TwodfanSummary {
        username: display,
        outcome,
        points_after: after.points,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_round_trips_through_restore() {
        let mut client = TwodfanClient::new("http://localhost").unwrap();
        client.uid = Some(42);
        client.cookies.insert("_session".to_owned(), "abc123".to_owned());
        client.cookies.insert("lang".to_owned(), "zh".to_owned());

        let credential = client.credential().unwrap();
        assert_eq!(credential, "42|_session=abc123; lang=zh");

        let mut restored = TwodfanClient::new("http://localhost").unwrap();
        assert!(restored.restore(&credential));
        assert_eq!(restored.uid, Some(42));
        assert_eq!(restored.cookie_header(), "_session=abc123; lang=zh");
    }

    #[test]
    fn restore_rejects_malformed_credentials() {
        let mut client = TwodfanClient::new("http://localhost").unwrap();
        assert!(!client.restore("no-delimiter"));
        assert!(!client.restore("abc|_session=x"));
        assert!(!client.restore("42|"));
    }

    #[test]
    fn credential_requires_a_session() {
        let mut client = TwodfanClient::new("http://localhost").unwrap();
        assert!(client.credential().is_none());
        client.uid = Some(7);
        assert!(client.credential().is_none());
    }
}
