use std::sync::Arc;
use tokio::sync::watch;

/// Foreground/background state of the host dashboard.
///
/// Sessions do not schedule ticks while hidden, so a backgrounded tab keeps
/// its retry budget for when the user returns.
#[derive(Debug, Clone)]
pub struct Visibility {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Visibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(visible);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_visible(&self, visible: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == visible {
                false
            } else {
                *current = visible;
                true
            }
        });
        if changed {
            tracing::debug!(visible, "Host visibility changed");
        }
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the host is visible (immediately if it already is)
    pub async fn wait_visible(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let visible = *rx.borrow_and_update();
            // The sender lives in `self`, so the channel cannot close while we wait
            if visible || rx.changed().await.is_err() {
                return;
            }
        }
    }
}
