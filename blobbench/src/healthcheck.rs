//! The `healthcheck` command.

use anyhow::{Context, Result};
use blobbench_client::Client;

/// Probes the configured store once.
pub async fn healthcheck(client: &Client) -> Result<()> {
    tracing::debug!(url = client.base_url(), flavor = %client.flavor(), "sending healthcheck request");
    client
        .health_check()
        .await
        .with_context(|| format!("store at {} is not healthy", client.base_url()))?;

    tracing::info!("OK");
    Ok(())
}
