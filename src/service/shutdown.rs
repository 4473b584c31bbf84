//! Shutdown signalling
//!
//! One [`Shutdown`] per process; every long-running task holds a
//! [`ShutdownToken`] and stops when it fires.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Why the process is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM, SIGINT or a user quitting the dashboard
    Graceful,
    /// SIGQUIT; same handling, logged louder
    Urgent,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Urgent => write!(f, "urgent"),
        }
    }
}

/// Process-wide shutdown trigger
pub struct Shutdown {
    tx: watch::Sender<Option<ShutdownSignal>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Request shutdown; later requests keep the first signal
    pub fn request(&self, signal: ShutdownSignal) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            info!(%signal, "shutdown requested");
            *current = Some(signal);
            true
        });
    }

    pub fn is_requested(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Cloneable handle for waiting on shutdown
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownToken {
    pub fn is_requested(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolve once shutdown is requested (or the trigger is gone)
    pub async fn wait(&mut self) -> ShutdownSignal {
        loop {
            if let Some(signal) = *self.rx.borrow_and_update() {
                return signal;
            }
            if self.rx.changed().await.is_err() {
                return ShutdownSignal::Graceful;
            }
        }
    }
}

/// Route OS signals into `shutdown`
pub fn install_signal_handlers(shutdown: Arc<Shutdown>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, name, level) in [
            (SignalKind::terminate(), "SIGTERM", ShutdownSignal::Graceful),
            (SignalKind::interrupt(), "SIGINT", ShutdownSignal::Graceful),
            (SignalKind::quit(), "SIGQUIT", ShutdownSignal::Urgent),
        ] {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move {
                let mut stream = match signal(kind) {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("Failed to install {} handler: {}", name, e);
                        return;
                    }
                };
                stream.recv().await;
                if level == ShutdownSignal::Urgent {
                    warn!("Received {}", name);
                } else {
                    info!("Received {}", name);
                }
                shutdown.request(level);
            });
        }
    }

    #[cfg(windows)]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C");
                    shutdown.request(ShutdownSignal::Graceful);
                }
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_signal_display() {
        assert_eq!(ShutdownSignal::Graceful.to_string(), "graceful");
        assert_eq!(ShutdownSignal::Urgent.to_string(), "urgent");
    }

    #[tokio::test]
    async fn test_token_wakes_on_request() {
        let shutdown = Shutdown::new();
        let mut token = shutdown.token();
        assert!(!token.is_requested());

        let waiter = tokio::spawn(async move { token.wait().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.request(ShutdownSignal::Urgent);
        shutdown.request(ShutdownSignal::Graceful);

        assert_eq!(waiter.await.unwrap(), ShutdownSignal::Urgent);
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn test_token_created_after_request() {
        let shutdown = Shutdown::new();
        shutdown.request(ShutdownSignal::Graceful);
        let mut token = shutdown.token();
        assert_eq!(token.wait().await, ShutdownSignal::Graceful);
    }
}
