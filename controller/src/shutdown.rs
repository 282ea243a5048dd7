use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted by shutdown")]
pub struct Interrupted;

#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownTrigger(sender), Shutdown(receiver))
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown is triggered. A dropped trigger never resolves.
    pub async fn triggered(&self) {
        let mut receiver = self.0.clone();
        if receiver.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        if self.is_triggered() {
            return Err(Interrupted);
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.triggered() => Err(Interrupted),
        }
    }
}

/// Triggers shutdown on SIGINT, or SIGTERM on unix.
pub async fn listen_for_signals(trigger: ShutdownTrigger) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
    trigger.trigger();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_trigger() {
        let (_trigger, shutdown) = channel();
        let started = tokio::time::Instant::now();

        assert_eq!(shutdown.sleep(Duration::from_secs(5)).await, Ok(()));
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_interrupts_pending_sleep() {
        let (trigger, shutdown) = channel();
        let started = tokio::time::Instant::now();

        let stop = async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.trigger();
        };
        let (result, ()) = tokio::join!(shutdown.sleep(Duration::from_secs(300)), stop);

        assert_eq!(result, Err(Interrupted));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert!(shutdown.is_triggered());
        assert_eq!(shutdown.sleep(Duration::from_secs(1)).await, Err(Interrupted));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trigger_does_not_interrupt() {
        let (trigger, shutdown) = channel();
        drop(trigger);

        assert_eq!(shutdown.sleep(Duration::from_secs(1)).await, Ok(()));
    }
}
