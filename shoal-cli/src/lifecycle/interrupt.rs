use tokio::sync::watch;
use tracing::warn;

/// Exit status after a second Ctrl-C (128 + SIGINT)
const FORCED_EXIT: i32 = 130;

/// Shutdown signal shared by every step of one command.
///
/// Registering a Ctrl-C handler replaces the default SIGINT behaviour for the
/// rest of the process, so a single listener is installed up front and each
/// step waits on the same flag.
#[derive(Clone, Debug)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    /// Listen for Ctrl-C. A second Ctrl-C exits immediately.
    pub fn ctrl_c() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                // No handler: `wait` then never resolves
                return;
            }
            let _ = tx.send(true);

            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted twice, exiting");
                std::process::exit(FORCED_EXIT);
            }
        });
        Self { rx }
    }

    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Signal driven by the returned sender
    #[cfg(test)]
    pub fn manual() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Resolves once the signal fired. Pends forever if it never can.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|&fired| fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_does_not_resolve() {
        let waited = tokio::time::timeout(Duration::from_millis(20), Interrupt::never().wait()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_fired_signal_is_seen_by_every_waiter() {
        let (tx, interrupt) = Interrupt::manual();
        tx.send(true).unwrap();

        interrupt.wait().await;
        // still fired for later steps of the same command
        interrupt.clone().wait().await;
    }
}
