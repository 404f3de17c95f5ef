// ── Heartbeat monitor ──
//
// Sends an application-level ping on a fixed interval and arms a
// watchdog. A pong before the watchdog fires disarms it; otherwise the
// connection is forced closed, which hands control to the reconnect
// policy. WebSocket-level ping/pong frames are tracked separately as
// liveness evidence and never disarm the watchdog.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::ids::reserved;
use crate::signal::{HubSignal, SignalBus};

/// The connection as seen by the monitor.
pub(crate) trait HeartbeatLink: Send + Sync + 'static {
    fn is_open(&self) -> bool;
    /// Queue a ping frame. `false` if the socket can no longer take frames.
    fn send_probe(&self, id: u64) -> bool;
    fn force_close(&self, reason: &str);
}

/// Per-run probe state, so a late pong from an old run can never
/// satisfy a probe of the next one.
#[derive(Default)]
struct Probe {
    armed: AtomicBool,
    pong: Notify,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives the ping/pong liveness check for one session.
pub struct HeartbeatMonitor {
    interval: Duration,
    timeout: Duration,
    probe: ArcSwapOption<Probe>,
    running: Mutex<Option<Running>>,
    last_keepalive: ArcSwapOption<Instant>,
}

impl HeartbeatMonitor {
    pub(crate) fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            probe: ArcSwapOption::empty(),
            running: Mutex::new(None),
            last_keepalive: ArcSwapOption::empty(),
        }
    }

    /// Start probing over `link`. No-op (returns `false`) if already running.
    pub(crate) async fn start(&self, link: Arc<dyn HeartbeatLink>, signals: SignalBus) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("heartbeat already running");
            return false;
        }

        let probe = Arc::new(Probe::default());
        self.probe.store(Some(Arc::clone(&probe)));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            self.interval,
            self.timeout,
            probe,
            link,
            signals,
            cancel.clone(),
        ));
        *running = Some(Running { cancel, handle });
        debug!(interval_ms = self.interval.as_millis(), "heartbeat started");
        true
    }

    /// Stop probing. Safe to call when not running.
    pub(crate) async fn stop(&self) {
        if let Some(running) = self.running.lock().await.take() {
            running.cancel.cancel();
            debug!("heartbeat stopped");
        }
        self.probe.store(None);
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Record a pong for the current probe. Returns `true` if it
    /// disarmed the watchdog.
    pub(crate) fn pong_received(&self) -> bool {
        let Some(probe) = self.probe.load_full() else {
            return false;
        };
        if probe.armed.swap(false, Ordering::SeqCst) {
            probe.pong.notify_one();
            true
        } else {
            trace!("pong without an armed probe");
            false
        }
    }

    /// Record a WebSocket-level ping or pong frame.
    pub(crate) fn note_keepalive(&self) {
        self.last_keepalive.store(Some(Arc::new(Instant::now())));
    }

    /// When the last WebSocket-level keepalive frame was seen.
    pub fn last_keepalive(&self) -> Option<Instant> {
        self.last_keepalive.load_full().map(|at| *at)
    }
}

async fn run(
    interval: Duration,
    timeout: Duration,
    probe: Arc<Probe>,
    link: Arc<dyn HeartbeatLink>,
    signals: SignalBus,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !link.is_open() {
            warn!("heartbeat found the transport closed, forcing close");
            link.force_close("transport not open");
            break;
        }

        probe.armed.store(true, Ordering::SeqCst);
        if !link.send_probe(reserved::HEARTBEAT) {
            probe.armed.store(false, Ordering::SeqCst);
            warn!("failed to queue heartbeat probe, forcing close");
            link.force_close("heartbeat probe could not be sent");
            break;
        }
        signals.emit(HubSignal::Ping);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = probe.pong.notified() => trace!("heartbeat acknowledged"),
            () = tokio::time::sleep(timeout) => {
                if probe.armed.swap(false, Ordering::SeqCst) {
                    warn!(timeout_ms = timeout.as_millis(), "heartbeat timed out, forcing close");
                    link.force_close("heartbeat timeout");
                    break;
                }
                // The pong won the race; consume its permit.
                probe.pong.notified().await;
            }
        }
    }

    probe.armed.store(false, Ordering::SeqCst);
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[derive(Default)]
    struct FakeLink {
        closed: AtomicBool,
        probes: AtomicU32,
        close_reasons: std::sync::Mutex<Vec<String>>,
    }

    impl HeartbeatLink for FakeLink {
        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn send_probe(&self, id: u64) -> bool {
            assert_eq!(id, reserved::HEARTBEAT);
            self.probes.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn force_close(&self, reason: &str) {
            self.closed.store(true, Ordering::SeqCst);
            self.close_reasons.lock().unwrap().push(reason.to_owned());
        }
    }

    fn monitor() -> HeartbeatMonitor {
        HeartbeatMonitor::new(Duration::from_secs(30), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn answered_probes_keep_connection_open() {
        let monitor = monitor();
        let link = Arc::new(FakeLink::default());
        let signals = SignalBus::new();
        let mut rx = signals.subscribe();
        assert!(monitor.start(link.clone(), signals).await);

        for round in 1..=3 {
            tokio::time::sleep(Duration::from_secs(31)).await;
            assert_eq!(link.probes.load(Ordering::SeqCst), round);
            assert_eq!(rx.recv().await.unwrap().name(), "ping");
            assert!(monitor.pong_received());
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(link.is_open());
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_probe_forces_close_once() {
        let monitor = monitor();
        let link = Arc::new(FakeLink::default());
        monitor.start(link.clone(), SignalBus::new()).await;

        tokio::time::sleep(Duration::from_secs(45)).await;

        assert!(!link.is_open());
        assert_eq!(*link.close_reasons.lock().unwrap(), vec!["heartbeat timeout".to_string()]);
        assert_eq!(link.probes.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_transport_is_closed_without_probing() {
        let monitor = monitor();
        let link = Arc::new(FakeLink::default());
        link.closed.store(true, Ordering::SeqCst);
        monitor.start(link.clone(), SignalBus::new()).await;

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(link.probes.load(Ordering::SeqCst), 0);
        assert_eq!(link.close_reasons.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_is_a_noop() {
        let monitor = monitor();
        let link = Arc::new(FakeLink::default());
        assert!(monitor.start(link.clone(), SignalBus::new()).await);
        assert!(!monitor.start(link.clone(), SignalBus::new()).await);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(link.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_timers() {
        let monitor = monitor();
        let link = Arc::new(FakeLink::default());
        monitor.start(link.clone(), SignalBus::new()).await;
        monitor.stop().await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(link.probes.load(Ordering::SeqCst), 0);
        assert!(link.is_open());
        assert!(!monitor.pong_received());
    }

    #[test]
    fn keepalive_frames_are_recorded() {
        let monitor = monitor();
        assert!(monitor.last_keepalive().is_none());
        monitor.note_keepalive();
        assert!(monitor.last_keepalive().is_some());
    }
}
