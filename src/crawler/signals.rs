//! External run triggers
//!
//! Shutdown comes from SIGINT (Ctrl-C). A depth increase comes from SIGUSR1
//! on Unix; elsewhere that trigger never fires.

use tokio::sync::mpsc;

/// Payload-free triggers driving a running crawl
#[derive(Debug)]
pub struct Triggers {
    /// Requests a graceful stop
    pub shutdown: mpsc::Receiver<()>,

    /// Requests a higher depth ceiling
    pub deepen: mpsc::Receiver<()>,
}

/// Sending halves of a [`Triggers`] pair
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    pub shutdown: mpsc::Sender<()>,
    pub deepen: mpsc::Sender<()>,
}

impl Triggers {
    /// Creates triggers driven by the returned handle
    pub fn channels() -> (TriggerHandle, Self) {
        let (shutdown_tx, shutdown) = mpsc::channel(1);
        let (deepen_tx, deepen) = mpsc::channel(8);
        (
            TriggerHandle {
                shutdown: shutdown_tx,
                deepen: deepen_tx,
            },
            Self { shutdown, deepen },
        )
    }

    /// Creates triggers fed by process signals
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> std::io::Result<Self> {
        let (handle, triggers) = Self::channels();

        let shutdown = handle.shutdown;
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Graceful shutdown started");
                shutdown.send(()).await.ok();
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut usr1 = signal(SignalKind::user_defined1())?;
            let deepen = handle.deepen;
            tokio::spawn(async move {
                while usr1.recv().await.is_some() {
                    tracing::debug!("Received SIGUSR1");
                    if deepen.send(()).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok(triggers)
    }
}
