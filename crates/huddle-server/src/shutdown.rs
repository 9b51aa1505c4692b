//! Stopping the relay.
//!
//! One `CancellationToken` is shared by the two long-lived server tasks: the
//! axum listener, which stops accepting and lets in-flight handshakes finish,
//! and the hub loop, which drops every registered connection on cancel. A
//! dropped connection closes its outbound queue, so each session's writer
//! exits and takes its reader with it.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the server-wide stop signal.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator whose token is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token handed to the listener and the hub.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether stop has been requested.
    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait up to `grace` for the listener and hub
    /// tasks to return.
    ///
    /// Tasks still running after `grace` are detached.
    pub async fn stop(&self, tasks: Vec<JoinHandle<()>>, grace: Duration) {
        self.token.cancel();
        info!(
            tasks = tasks.len(),
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            "stopping relay"
        );

        if tokio::time::timeout(grace, futures::future::join_all(tasks)).await.is_err() {
            warn!(?grace, "relay tasks still running after grace period");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        assert!(!ShutdownCoordinator::new().is_stopping());
    }

    #[tokio::test]
    async fn stop_cancels_token_and_waits() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let task = tokio::spawn(async move { token.cancelled().await });

        coord.stop(vec![task], Duration::from_secs(1)).await;
        assert!(coord.is_stopping());
        assert!(coord.token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_gives_up_after_grace() {
        let coord = ShutdownCoordinator::new();
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        coord.stop(vec![stuck], Duration::from_millis(50)).await;
        assert!(coord.is_stopping());
    }
}
