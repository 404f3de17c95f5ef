// ── Live connection handle ──
//
// One `Connection` per authenticated socket. Outbound frames go through an
// unbounded channel to a writer task that owns the sink; the client's
// reader task owns the stream. Cancelling the token tears both down.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::SinkExt;
use futures_util::stream::SplitSink;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use hassly_api::{CloseCode, CloseFrame, CommandFrame, WsMessage, WsStream};

use crate::error::CoreError;
use crate::heartbeat::HeartbeatLink;

/// Grace period for flushing a close frame when the socket is torn down.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) struct Connection {
    outbound: mpsc::UnboundedSender<WsMessage>,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
    forced_reason: ArcSwapOption<String>,
}

impl Connection {
    /// Create the handle and spawn the writer task for `sink`.
    pub(crate) fn spawn_writer(sink: SplitSink<WsStream, WsMessage>) -> Arc<Self> {
        let (outbound, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(write_loop(sink, rx, cancel.clone()));

        Arc::new(Self {
            outbound,
            cancel,
            reader: Mutex::new(None),
            forced_reason: ArcSwapOption::empty(),
        })
    }

    pub(crate) async fn set_reader(&self, handle: JoinHandle<()>) {
        *self.reader.lock().await = Some(handle);
    }

    pub(crate) fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && !self.outbound.is_closed()
    }

    /// Queue a text frame. `false` once the writer is gone.
    pub(crate) fn send_text(&self, text: String) -> bool {
        self.outbound.send(WsMessage::text(text)).is_ok()
    }

    /// Tear the socket down without waiting for the hub.
    pub(crate) fn force_close(&self, reason: &str) {
        if self.forced_reason.load().is_none() {
            self.forced_reason.store(Some(Arc::new(reason.to_owned())));
        }
        self.cancel.cancel();
    }

    /// Why the socket was torn down locally, if it was.
    pub(crate) fn forced_reason(&self) -> Option<String> {
        self.forced_reason.load_full().map(|r| (*r).clone())
    }

    /// Stop both tasks. Used by the reader once the stream has ended.
    pub(crate) fn finish(&self) {
        self.cancel.cancel();
    }

    /// Send a close frame and wait, at most `timeout`, for the reader to
    /// see the hub's acknowledgement.
    pub(crate) async fn shutdown(&self, code: u16, reason: &str, timeout: Duration) -> Result<(), CoreError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        if self.outbound.send(WsMessage::Close(Some(frame))).is_err() {
            debug!("writer already gone, skipping close frame");
        }

        let reader = self.reader.lock().await.take();
        let result = match reader {
            Some(mut reader) => {
                if tokio::time::timeout(timeout, &mut reader).await.is_ok() {
                    Ok(())
                } else {
                    warn!(timeout_ms = timeout.as_millis(), "hub did not acknowledge close");
                    reader.abort();
                    Err(CoreError::Timeout {
                        operation: "Close",
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    })
                }
            }
            None => Ok(()),
        };

        self.cancel.cancel();
        result
    }
}

impl HeartbeatLink for Connection {
    fn is_open(&self) -> bool {
        Connection::is_open(self)
    }

    fn send_probe(&self, id: u64) -> bool {
        match CommandFrame::ping(id).encode() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!(error = %e, "failed to encode ping");
                false
            }
        }
    }

    fn force_close(&self, reason: &str) {
        Connection::force_close(self, reason);
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, WsMessage>,
    mut rx: mpsc::UnboundedReceiver<WsMessage>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let closing = matches!(message, WsMessage::Close(_));
        if let Err(e) = sink.send(message).await {
            warn!(error = %e, "WebSocket write failed");
            cancel.cancel();
            break;
        }
        if closing {
            trace!("close frame sent");
            break;
        }
    }

    // Best effort: flush a close frame if one has not been sent yet.
    let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, sink.close()).await;
    trace!("writer finished");
}
