//! Waiting for a freshly created machine to accept connections.

use std::time::Duration;

use tokio::time::Instant;

use crate::application::ports::NetworkProbe;
use crate::domain::{DeployError, SettlePolicy};

const MIN_BACKOFF: Duration = Duration::from_millis(50);

/// Block until `host` is ready for remote access according to `policy`.
///
/// `Fixed` sleeps unconditionally. `Probe` polls TCP connectivity with
/// exponential backoff capped at `max_backoff` and gives up at `deadline`.
///
/// # Errors
///
/// Returns [`DeployError::Unreachable`] when the probe deadline passes.
pub async fn wait_until_reachable(
    probe: &impl NetworkProbe,
    host: &str,
    policy: SettlePolicy,
) -> Result<(), DeployError> {
    let (port, initial_backoff, max_backoff, deadline) = match policy {
        SettlePolicy::Fixed { delay } => {
            tracing::debug!(?delay, "fixed settle delay");
            tokio::time::sleep(delay).await;
            return Ok(());
        }
        SettlePolicy::Probe {
            port,
            initial_backoff,
            max_backoff,
            deadline,
        } => (port, initial_backoff, max_backoff, deadline),
    };

    let started = Instant::now();
    let mut backoff = initial_backoff.max(MIN_BACKOFF);
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match probe.check_tcp_connectivity(host, port).await {
            Ok(true) => {
                tracing::debug!(host, port, attempts, "reachable");
                return Ok(());
            }
            Ok(false) => tracing::debug!(host, port, attempts, "not reachable yet"),
            Err(e) => tracing::debug!(host, port, attempts, error = %format!("{e:#}"), "probe failed"),
        }

        let elapsed = started.elapsed();
        if elapsed >= deadline {
            return Err(DeployError::Unreachable {
                host: host.to_owned(),
                waited: elapsed,
            });
        }
        tokio::time::sleep(backoff.min(deadline.saturating_sub(elapsed))).await;
        backoff = backoff
            .saturating_mul(2)
            .min(max_backoff.max(MIN_BACKOFF));
    }
}
