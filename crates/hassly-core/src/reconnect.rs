// ── Reconnect policy ──
//
// One cancellable retry task per session. The task sleeps, asks the
// target to reconnect, and repeats until it succeeds, the retry budget
// runs out, or it is cancelled. The budget is consumed when an attempt is
// scheduled and restored on every successful connection. A trigger that
// arrives while the task is still running re-arms it instead of being lost;
// the task only leaves the slot under the same lock that `schedule` takes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;

/// What the retry task drives.
pub(crate) trait ReconnectTarget: Send + Sync + 'static {
    /// An attempt has been scheduled and will run after `delay`.
    fn on_scheduled(&self, attempt: u32, delay: Duration);
    /// Try to connect. `true` on success.
    fn attempt(&self, attempt: u32) -> impl Future<Output = bool> + Send;
    /// The budget ran out before a connection succeeded.
    fn on_exhausted(&self);
}

/// Outcome of [`ReconnectPolicy::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Schedule {
    Started,
    AlreadyPending,
    Disabled,
}

struct Pending {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    task: Option<Pending>,
    /// The task is inside `attempt`; a socket it opened may drop before
    /// the attempt reports back.
    attempting: bool,
    /// Set when a trigger arrived during an attempt.
    rearm: bool,
}

impl Slot {
    fn owned_by(&self, generation: u64) -> bool {
        self.task.as_ref().is_some_and(|p| p.generation == generation)
    }
}

pub(crate) struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: AtomicU32,
    generations: AtomicU64,
    slot: Mutex<Slot>,
}

impl ReconnectPolicy {
    pub(crate) fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: AtomicU32::new(0),
            generations: AtomicU64::new(0),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Restore the full retry budget.
    pub(crate) fn reset(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    /// Attempts left before the policy gives up.
    pub(crate) fn remaining(&self) -> u32 {
        self.config
            .max_retries
            .saturating_sub(self.attempts.load(Ordering::SeqCst))
    }

    pub(crate) async fn is_pending(&self) -> bool {
        self.slot.lock().await.task.is_some()
    }

    /// Start the retry task unless one is already running. A running task
    /// is re-armed so it tries again once its current attempt ends.
    pub(crate) async fn schedule<T: ReconnectTarget>(self: &Arc<Self>, target: T) -> Schedule {
        if !self.config.is_enabled() {
            info!("automatic reconnection disabled");
            return Schedule::Disabled;
        }

        let mut slot = self.slot.lock().await;
        if slot.task.is_some() {
            debug!("reconnect already pending");
            if slot.attempting {
                slot.rearm = true;
            }
            return Schedule::AlreadyPending;
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(retry_loop(Arc::clone(self), target, cancel.clone(), generation));
        slot.attempting = false;
        slot.rearm = false;
        slot.task = Some(Pending {
            generation,
            cancel,
            handle,
        });
        Schedule::Started
    }

    /// Cancel the retry task and wait for it to wind down.
    pub(crate) async fn cancel(&self) {
        let pending = {
            let mut slot = self.slot.lock().await;
            slot.attempting = false;
            slot.rearm = false;
            slot.task.take()
        };
        let Some(pending) = pending else {
            return;
        };
        pending.cancel.cancel();

        // Never wait on ourselves.
        if tokio::task::try_id() == Some(pending.handle.id()) {
            return;
        }
        let _ = pending.handle.await;
        debug!("pending reconnect cancelled");
    }

    /// Consume one attempt from the budget.
    fn claim(&self) -> Option<(u32, Duration)> {
        let max = self.config.max_retries;
        let used = self
            .attempts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()?;
        Some((used + 1, self.config.delay_for(used)))
    }

    async fn begin_attempt(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        if slot.owned_by(generation) {
            slot.attempting = true;
        }
    }

    /// Leave the slot unless a re-arm arrived. `true` means keep going.
    async fn finish(&self, generation: u64) -> bool {
        let mut slot = self.slot.lock().await;
        if !slot.owned_by(generation) {
            // Cancelled; a newer task may own the slot.
            return false;
        }
        slot.attempting = false;
        if std::mem::take(&mut slot.rearm) {
            return true;
        }
        slot.task = None;
        false
    }

    /// Leave the slot unconditionally.
    async fn release(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        if slot.owned_by(generation) {
            slot.task = None;
            slot.attempting = false;
            slot.rearm = false;
        }
    }

    /// A failed attempt; the loop itself covers any re-arm it raised.
    async fn attempt_failed(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        if slot.owned_by(generation) {
            slot.attempting = false;
            slot.rearm = false;
        }
    }
}

async fn retry_loop<T: ReconnectTarget>(
    policy: Arc<ReconnectPolicy>,
    target: T,
    cancel: CancellationToken,
    generation: u64,
) {
    loop {
        let Some((attempt, delay)) = policy.claim() else {
            warn!(max_retries = policy.config.max_retries, "reconnect budget exhausted");
            policy.release(generation).await;
            target.on_exhausted();
            return;
        };

        info!(attempt, delay_ms = delay.as_millis(), "reconnect scheduled");
        target.on_scheduled(attempt, delay);

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        policy.begin_attempt(generation).await;
        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            ok = target.attempt(attempt) => ok,
        };

        if connected {
            info!(attempt, "reconnected");
            if !policy.finish(generation).await {
                return;
            }
            debug!("connection lost again during the attempt, retrying");
        } else {
            policy.attempt_failed(generation).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
