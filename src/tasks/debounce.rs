use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Delays values until they have stood unchanged for a quiet period.
///
/// Each `push` cancels the pending emission, if any, and arms a new timer, so at
/// most one timer is ever outstanding. Only the value that survives a full quiet
/// period reaches the receiving end.
pub struct Debouncer<T> {
    delay: Duration,
    tx: mpsc::UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

/// Receiving end of a [`Debouncer`].
pub struct Debounced<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> (Self, Debounced<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                tx,
                pending: None,
            },
            Debounced { rx },
        )
    }

    /// Must be called from within a Tokio runtime.
    pub fn push(&mut self, value: T) {
        self.cancel();
        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means nobody is listening any more.
            let _ = tx.send(value);
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> Debounced<T> {
    /// Next settled value. `None` once the debouncer is gone and nothing is left.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
