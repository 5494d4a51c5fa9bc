use futures::{Stream, StreamExt};
use tokio::task::JoinHandle as TokioJoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Turns operator interrupts into the run's single cancellation signal.
#[derive(Debug, Clone)]
pub struct CancellationBridge {
    token: CancellationToken,
}

impl CancellationBridge {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Fires the signal. Returns `false` if it had already fired.
    pub fn interrupt(&self) -> bool {
        if self.token.is_cancelled() {
            warn!("Shutdown already in progress, waiting for the encoder to exit");
            return false;
        }

        info!("Interrupt received, stopping after the current encoder is reaped");
        self.token.cancel();
        true
    }

    /// Forwards every item of `interrupts` until the stream ends.
    pub async fn listen<S>(self, interrupts: S)
    where
        S: Stream<Item = ()>,
    {
        let mut interrupts = std::pin::pin!(interrupts);
        while interrupts.next().await.is_some() {
            self.interrupt();
        }
    }
}

/// Hooks Ctrl-C (and SIGTERM on unix) to `token` for the rest of the process.
pub fn install(token: CancellationToken) -> TokioJoinHandle<()> {
    let bridge = CancellationBridge::new(token);
    let interrupts = futures::stream::unfold((), |()| async {
        match os_interrupt().await {
            Ok(()) => Some(((), ())),
            Err(error) => {
                error!(%error, "Cannot listen for interrupts");
                None
            }
        }
    });

    tokio::spawn(bridge.listen(interrupts))
}

#[cfg(unix)]
async fn os_interrupt() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn os_interrupt() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
