use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Fatal,
}

impl ShutdownReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
            ShutdownReason::Fatal => "fatal error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<Option<ShutdownReason>>,
}

#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    rx: watch::Receiver<Option<ShutdownReason>>,
}

pub fn shutdown_channel() -> ShutdownTrigger {
    let (tx, _rx) = watch::channel(None);
    ShutdownTrigger { tx }
}

impl ShutdownTrigger {
    /// Sets the flag. The first reason wins; later requests are ignored.
    pub fn request(&self, reason: ShutdownReason) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    pub fn flag(&self) -> ShutdownFlag {
        ShutdownFlag {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownFlag {
    pub fn is_requested(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolves once shutdown has been requested. Never resolves if every
    /// trigger is dropped without a request.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(Option::is_some).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Registers SIGINT and SIGTERM handlers, then spawns a task that flips the
/// shutdown flag on the first one. Handlers are live when this returns.
#[cfg(unix)]
pub fn install_signal_listener(trigger: ShutdownTrigger) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let reason = tokio::select! {
            _ = sigint.recv() => ShutdownReason::Interrupt,
            _ = sigterm.recv() => ShutdownReason::Terminate,
        };
        notify(&trigger, reason);
    }))
}

#[cfg(not(unix))]
pub fn install_signal_listener(trigger: ShutdownTrigger) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => notify(&trigger, ShutdownReason::Interrupt),
            Err(error) => tracing::warn!(error = %error, "failed to listen for ctrl-c"),
        }
    }))
}

fn notify(trigger: &ShutdownTrigger, reason: ShutdownReason) {
    info!(signal = reason.as_str(), "received shutdown signal, shutting down gracefully");
    trigger.request(reason);
}
