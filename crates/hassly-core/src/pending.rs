// ── Correlation table ──
//
// Maps a request id to the caller waiting for its result. An entry leaves
// the table exactly once: either the reader completes it with the hub's
// answer, or the waiting caller removes it when its deadline fires.
// Whoever wins `remove()` decides the outcome.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::CoreError;

pub(crate) type Outcome = Result<Value, CoreError>;

struct PendingRequest {
    command: String,
    tx: oneshot::Sender<Outcome>,
    created_at: Instant,
}

/// Receiving half handed to the caller by [`PendingTable::register`].
pub(crate) struct Ticket {
    id: u64,
    rx: oneshot::Receiver<Outcome>,
}

#[derive(Default)]
pub(crate) struct PendingTable {
    entries: DashMap<u64, PendingRequest>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `id` as in flight. Fails if it already is.
    pub(crate) fn register(&self, id: u64, command: &str) -> Result<Ticket, CoreError> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(CoreError::DuplicateRequestId { id }),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(PendingRequest {
                    command: command.to_owned(),
                    tx,
                    created_at: Instant::now(),
                });
                Ok(Ticket { id, rx })
            }
        }
    }

    /// Deliver the hub's answer. Returns `false` if nobody is waiting.
    pub(crate) fn complete(&self, id: u64, outcome: Outcome) -> bool {
        let Some((_, request)) = self.entries.remove(&id) else {
            return false;
        };
        trace!(
            id,
            command = %request.command,
            elapsed_ms = request.created_at.elapsed().as_millis(),
            "request completed"
        );
        // The caller may have stopped listening; that is not our concern.
        let _ = request.tx.send(outcome);
        true
    }

    /// Drop an entry whose frame never made it onto the wire.
    pub(crate) fn discard(&self, id: u64) {
        self.entries.remove(&id);
    }

    /// Fail every in-flight request whose id matches `which`, so the ids
    /// can be issued again. Returns how many were failed.
    pub(crate) fn fail_where(&self, which: impl Fn(u64) -> bool, error: impl Fn() -> CoreError) -> usize {
        let ids: Vec<u64> = self
            .entries
            .iter()
            .map(|e| *e.key())
            .filter(|id| which(*id))
            .collect();
        ids.into_iter()
            .filter(|id| self.complete(*id, Err(error())))
            .count()
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Wait for the outcome of `ticket`, at most `timeout`.
    pub(crate) async fn wait(&self, ticket: Ticket, timeout: Duration) -> Outcome {
        let Ticket { id, mut rx } = ticket;

        if let Ok(received) = tokio::time::timeout(timeout, &mut rx).await {
            return received.map_err(|_| CoreError::Internal(format!("request {id} was abandoned")))?;
        }

        match self.entries.remove(&id) {
            Some((_, request)) => {
                debug!(id, command = %request.command, "request timed out");
                Err(CoreError::RequestTimeout {
                    command: request.command,
                    id,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
            // The reader removed the entry first; its answer is on the way.
            None => rx
                .await
                .map_err(|_| CoreError::Internal(format!("request {id} was abandoned")))?,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
