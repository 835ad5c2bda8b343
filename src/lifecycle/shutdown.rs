//! Stop notification for the executor host and its background tasks.

use tokio::sync::broadcast;

/// Fan-out stop notice.
///
/// The host's accept loop and anything else that must stop with the process
/// hold a receiver; the signal handler fires it once.
#[derive(Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self { notify }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Notify every receiver. Firing twice, or with nobody listening, is harmless.
    pub fn trigger(&self) {
        if self.notify.send(()).is_err() {
            tracing::debug!("Shutdown fired with no listeners");
        }
    }

    /// Receivers that have not been dropped yet.
    pub fn listeners(&self) -> usize {
        self.notify.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
