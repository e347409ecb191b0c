//! cli::commands::token
//!
//! Print an installation access token for use with other tools.

use anyhow::{Context as _, Result};
use serde_json::json;

use super::{load_config, print_json};
use crate::auth::InstallationTokenProvider;
use crate::cli::Context;

/// Exchange the app credentials for an installation token and print it.
///
/// `--token` is ignored here: this command exists to mint one.
pub async fn token(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;
    let provider = InstallationTokenProvider::from_config(&config)
        .context("Failed to load GitHub App credentials")?;
    let token = provider
        .token()
        .await
        .context("Failed to obtain an installation token")?;

    print_json(&json!({
        "token": token.token,
        "expires_at": token.expires_at,
    }))
}
