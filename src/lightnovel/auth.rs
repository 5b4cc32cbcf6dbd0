//! Session acquisition for the lightnovel site.
//!
//! Resolution order: explicit key from config, then the cached key for the
//! configured account, then interactive login. Whatever wins is liveness
//! checked with a user-info fetch; a rejected explicit/cached key triggers
//! exactly one forced re-login before the run gives up. Fresh keys are
//! persisted so subsequent runs skip the login round-trip.

use super::client::{SiteClient, TaskApi, UserProfile};
use super::envelope;
use super::transport::Transport;
use crate::config::LightnovelConfig;
use crate::error::{CheckinError, Result};
use crate::session::SessionStore;

/// Where the resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Supplied directly by configuration.
    Explicit,
    /// Retrieved from the session cache.
    Cached,
    /// Obtained by username/password login during this run.
    FreshLogin,
}

/// Session-cache identity for a lightnovel account.
fn cache_identity(username: &str) -> String {
    format!("lightnovel:{username}")
}

/// Log in with username/password and return the granted security key.
///
/// # Errors
///
/// Returns [`CheckinError::Auth`] when the remote rejects the credentials
/// or the response carries no key.
pub async fn login(transport: &Transport, username: &str, password: &str) -> Result<String> {
    tracing::info!(%username, "logging in");

    let body = envelope::login_body(username, password);
    let response = transport.post_envelope("/api/user/login", &body).await?;
    let data = response
        .into_data()
        .map_err(|e| CheckinError::Auth(format!("login rejected: {e}")))?;

    let key = data
        .get("security_key")
        .and_then(|v| v.as_str())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| CheckinError::Auth("login response carries no security key".to_owned()))?;

    let uid = data.get("uid").and_then(|v| v.as_i64()).unwrap_or_default();
    tracing::info!(uid, "login succeeded");
    Ok(key.to_owned())
}

/// Resolve a usable session and return a liveness-checked client.
///
/// # Errors
///
/// [`CheckinError::Config`] when no credential path is configured,
/// [`CheckinError::Auth`] when every fallback is exhausted.
pub async fn establish(
    config: &LightnovelConfig,
    store: &SessionStore,
    transport: Transport,
) -> Result<(SiteClient, UserProfile)> {
    let identity = cache_identity(&config.username);

    let (key, source) = if !config.security_key.is_empty() {
        tracing::info!("using security key from config");
        (config.security_key.clone(), CredentialSource::Explicit)
    } else if let Some(cached) = store.get(&identity) {
        tracing::info!("using cached security key");
        (cached, CredentialSource::Cached)
    } else if config.has_login() {
        let key = login(&transport, &config.username, &config.password).await?;
        store.put(&identity, &key);
        (key, CredentialSource::FreshLogin)
    } else {
        return Err(CheckinError::Config(
            "no security_key or username/password configured".to_owned(),
        ));
    };

    let client = SiteClient::new(transport.clone(), &key)?;
    match client.user_info().await {
        Ok(profile) => {
            tracing::info!(uid = profile.uid, nickname = %profile.nickname, "session is live");
            Ok((client, profile))
        }
        Err(e) if source != CredentialSource::FreshLogin && config.has_login() => {
            tracing::warn!(error = %e, "session credential rejected, re-logging in");
            let key = login(&transport, &config.username, &config.password).await?;
            store.put(&identity, &key);

            let client = SiteClient::new(transport, &key)?;
            let profile = client.user_info().await.map_err(|e| {
                CheckinError::Auth(format!("fresh login did not pass the liveness check: {e}"))
            })?;
            tracing::info!(uid = profile.uid, "session re-established");
            Ok((client, profile))
        }
        Err(e) => Err(CheckinError::Auth(format!(
            "session credential rejected and no login fallback available: {e}"
        ))),
    }
}
