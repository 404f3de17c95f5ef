// ── Registry subscriptions ──
//
// Handles returned by `RegistryStore::subscribe_*`. Each one tracks the
// snapshot the caller last looked at and can wait for the next one.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::signal::Snapshot;

/// Live view of one cached registry (or of the state cache).
pub struct RegistryStream<T: Clone + Send + Sync + 'static> {
    seen: Snapshot<T>,
    rx: watch::Receiver<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> RegistryStream<T> {
    pub(crate) fn new(rx: watch::Receiver<Snapshot<T>>) -> Self {
        let seen = Arc::clone(&rx.borrow());
        Self { seen, rx }
    }

    /// The snapshot from subscription time, or from the last `changed()`.
    pub fn current(&self) -> &Snapshot<T> {
        &self.seen
    }

    /// Whatever the cache holds right now.
    pub fn latest(&self) -> Snapshot<T> {
        Arc::clone(&self.rx.borrow())
    }

    /// Resolves with the next replacement of the registry. `None` once the
    /// store is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.rx.changed().await.ok()?;
        self.seen = Arc::clone(&self.rx.borrow_and_update());
        Some(Arc::clone(&self.seen))
    }

    pub fn into_stream(self) -> RegistryWatchStream<T> {
        RegistryWatchStream {
            inner: WatchStream::new(self.rx),
        }
    }
}

/// [`Stream`] of snapshots. Yields the current one first.
pub struct RegistryWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> Stream for RegistryWatchStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
