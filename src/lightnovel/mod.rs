//! Check-in flow for the lightnovel site.
//!
//! The intricate one of the two targets: every response is wrapped in a
//! compressed envelope, and the daily check-in decomposes into seven
//! interdependent tasks with partial-completion state. Layering, leaves
//! first: [`envelope`] codec, [`transport`] with bounded retry,
//! [`client`] with typed endpoint operations, [`auth`] session
//! acquisition, and the [`tasks`] orchestrator.

pub mod auth;
pub mod client;
pub mod envelope;
pub mod tasks;
pub mod transport;

use crate::config::LightnovelConfig;
use crate::error::{CheckinError, Result};
use crate::report;
use crate::session::SessionStore;

/// Run the full lightnovel check-in and return the notification message.
///
/// # Errors
///
/// Any unrecoverable failure of the run: missing credentials, exhausted
/// authentication fallbacks, task-list fetch failure, or no eligible
/// article.
pub async fn run(config: &LightnovelConfig, store: &SessionStore) -> Result<String> {
    if !config.has_credentials() {
        return Err(CheckinError::Config(
            "lightnovel: no security_key or username/password configured".to_owned(),
        ));
    }

    let transport = transport::Transport::new(&config.base_url)?;
    let (client, profile) = auth::establish(config, store, transport).await?;
    tracing::info!(
        coin = profile.coin,
        exp = profile.exp,
        "balances before check-in"
    );

    let summary = tasks::CheckinRun::new().execute(&client, &profile).await?;
    Ok(report::lightnovel_success(&summary))
}
