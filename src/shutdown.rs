//! Single shutdown trigger fed by OS signals and by the HTTP listener.

use std::fmt;
use std::future::pending;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum ShutdownReason {
    Signal(&'static str),
    ListenerFailed(std::io::Error),
    /// Every trigger was dropped without firing.
    TriggersClosed,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "received signal {}", name),
            ShutdownReason::ListenerFailed(err) => write!(f, "http listener failed: {}", err),
            ShutdownReason::TriggersClosed => write!(f, "all shutdown triggers dropped"),
        }
    }
}

/// Sending half; cheap to clone and hand to every producer.
#[derive(Clone, Debug)]
pub struct ShutdownTrigger {
    tx: mpsc::Sender<ShutdownReason>,
}

impl ShutdownTrigger {
    /// Requests shutdown. Only the first reason is kept.
    pub fn fire(&self, reason: ShutdownReason) {
        if let Err(err) = self.tx.try_send(reason) {
            tracing::debug!(reason = %err.into_inner(), "Shutdown already requested");
        }
    }
}

/// Receiving half, owned by the lifecycle manager alone.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: mpsc::Receiver<ShutdownReason>,
}

impl ShutdownSignal {
    pub async fn wait(mut self) -> ShutdownReason {
        self.rx
            .recv()
            .await
            .unwrap_or(ShutdownReason::TriggersClosed)
    }
}

pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = mpsc::channel(1);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Fires `trigger` on SIGINT or SIGTERM.
pub async fn watch_os_signals(trigger: ShutdownTrigger) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install CTRL+C signal handler");
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM signal handler");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    let name = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    };

    tracing::info!(signal = name, "Received a signal");
    trigger.fire(ShutdownReason::Signal(name));
}
