//! Shutdown signal coordination
//!
//! Lets the binary abandon an in-flight tool call on SIGINT/SIGTERM and still
//! run the fleet teardown afterwards.

use std::future::Future;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Fans a single shutdown request out to every subscriber.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        info!("Shutdown signal sent");
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for Ctrl+C or SIGTERM, then notify subscribers.
    pub async fn wait_for_shutdown_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C"),
            _ = terminate => info!("Received SIGTERM"),
        }

        self.shutdown();
    }

    /// Run `fut` to completion unless shutdown is requested first.
    ///
    /// Returns `None` when the future was abandoned.
    pub async fn run_until_shutdown<F, T>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let mut shutdown_rx = self.subscribe();

        tokio::select! {
            out = fut => Some(out),
            _ = shutdown_rx.recv() => {
                warn!("Shutdown requested, abandoning in-flight work");
                None
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        coordinator.shutdown();

        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_run_until_shutdown_completes() {
        let coordinator = ShutdownCoordinator::new();
        let out = coordinator.run_until_shutdown(async { 7 }).await;
        assert_eq!(out, Some(7));
    }

    #[tokio::test]
    async fn test_run_until_shutdown_abandons() {
        let coordinator = ShutdownCoordinator::new();
        let trigger = coordinator.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.shutdown();
        });

        let out = coordinator
            .run_until_shutdown(std::future::pending::<u32>())
            .await;
        assert_eq!(out, None);
    }
}
