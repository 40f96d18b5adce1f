//! Cooperative cancellation for the client session.
//!
//! A [`Shutdown`] is created once per session and cloned into every component
//! that blocks on the network. Triggering it is permanent: every pending
//! [`Shutdown::cancelled`] future resolves, and components are expected to
//! close their sockets and stop without starting new network work.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal. Returns `true` only for the call that actually set it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal is set, immediately if it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let res = rx.wait_for(|triggered| *triggered).await.map(|_| ());
        if res.is_err() {
            // Unreachable while `self` holds the sender.
            std::future::pending::<()>().await;
        }
    }

    /// Spawns the task that turns SIGTERM/SIGINT into a shutdown.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = wait_for_signal() => {
                    if let Err(e) = res {
                        tracing::error!("action: signal_handler | result: fail | error: {}", e);
                        return;
                    }
                }
                _ = shutdown.cancelled() => return,
            }
            if shutdown.trigger() {
                tracing::info!("action: shutdown | result: in_progress | reason: signal");
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
