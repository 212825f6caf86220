//! Graceful-drain coordinator.
//!
//! The first termination signal marks the process as draining and wakes the
//! graceful-shutdown future; a second signal forces an immediate non-zero
//! exit. The drain itself is bounded by the configured timeout in the serve
//! loop that awaits it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{info, warn};

pub struct Shutdown {
    draining: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            draining: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Mark the process as draining. Returns `true` only for the call that
    /// actually started the drain.
    pub fn trigger(&self) -> bool {
        if self.draining.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Resolve once the drain starts (immediately if it already has).
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.is_draining() {
            return;
        }
        notified.await;
    }

    /// Listen for SIGINT/SIGTERM: first signal drains, second forces exit.
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                wait_for_termination_signal().await;
                if this.trigger() {
                    info!("termination signal received, draining");
                } else {
                    warn!("second termination signal, forcing exit");
                    std::process::exit(1);
                }
            }
        });
    }
}

async fn wait_for_termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn only_the_first_trigger_starts_the_drain() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_draining());
        assert!(shutdown.trigger());
        assert!(shutdown.is_draining());
        assert!(!shutdown.trigger());
    }

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };
        shutdown.trigger();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter timed out")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        timeout(Duration::from_millis(100), shutdown.wait())
            .await
            .expect("wait should not block once draining");
    }
}
