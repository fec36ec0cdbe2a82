use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

/// Cooperative cancellation for approval operations
///
/// The coordinator owns the sending half of a watch channel. Engines hold a
/// [`ShutdownSignal`] and consult it right before committing a transition, so
/// a cancellation never leaves a half-written step behind.
pub struct ShutdownCoordinator {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: Some(self.sender.subscribe()),
        }
    }

    /// Request cancellation. Operations that already began committing finish.
    pub fn trigger(&self) {
        if !*self.sender.borrow() {
            info!("Shutdown requested, new approval commits will be refused");
        }
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Trigger on Ctrl-C. Returns once the signal has been received.
    pub async fn trigger_on_ctrl_c(&self) -> Result<()> {
        info!("Installing Ctrl-C handler for graceful shutdown");
        tokio::signal::ctrl_c().await?;
        self.trigger();
        Ok(())
    }

    /// Trigger, then give in-flight commits a grace period to drain.
    pub async fn shutdown(&self, grace: Duration) -> Result<()> {
        self.trigger();
        let drained = timeout(grace, async {
            // Every outstanding signal holder drops its receiver when done
            while self.sender.receiver_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => info!("Graceful shutdown completed"),
            Err(_) => warn!(
                holders = self.sender.receiver_count(),
                "Shutdown grace period elapsed with engines still alive"
            ),
        }
        Ok(())
    }
}

/// Receiving half handed to engines. A detached signal never fires.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl ShutdownSignal {
    pub fn detached() -> Self {
        Self { receiver: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_signal_never_cancels() {
        assert!(!ShutdownSignal::detached().is_cancelled());
    }

    #[test]
    fn trigger_reaches_every_signal() {
        let coordinator = ShutdownCoordinator::new();
        let first = coordinator.signal();
        let second = first.clone();
        assert!(!first.is_cancelled());

        coordinator.trigger();

        assert!(coordinator.is_triggered());
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_returns_once_signals_are_dropped() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();
        drop(signal);

        coordinator
            .shutdown(Duration::from_millis(200))
            .await
            .unwrap();
        assert!(coordinator.is_triggered());
    }
}
