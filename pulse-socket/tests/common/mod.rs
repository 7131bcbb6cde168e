//! Shared test doubles for the socket integration tests.
//!
//! `MockConnector` stands in for the WebSocket dialer: each `connect` call
//! either fails (scripted) or yields a `MockTransport` that records every
//! outbound frame and lets the test inject transport events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use pulse_core::error::{PulseError, PulseResult};
use pulse_socket::{ClientFrame, Connector, EventKind, ServerFrame, Transport, TransportEvent};

/// In-memory transport recording outbound frames.
pub struct MockTransport {
    sent: Mutex<Vec<ClientFrame>>,
    closed: AtomicBool,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl MockTransport {
    /// Inject a raw transport event, as the network would.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Inject an inbound frame built from an event name and data payload.
    pub fn emit_frame(&self, event: &str, data: serde_json::Value) {
        self.emit(TransportEvent::Frame(ServerFrame {
            event: EventKind::from_str(event),
            data,
        }));
    }

    /// Simulate the connection dropping.
    pub fn drop_connection(&self, reason: &str) {
        self.emit(TransportEvent::Closed {
            reason: reason.to_string(),
        });
    }

    /// Snapshot of every frame sent so far.
    pub fn sent_frames(&self) -> Vec<ClientFrame> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of sent frames with the given wire event name.
    pub fn sent_count(&self, event_name: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.event_name() == event_name)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn send(&self, frame: ClientFrame) -> PulseResult<()> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ConnectorState {
    fail_all: bool,
    fail_next: u32,
    dial_times: Vec<Instant>,
    transports: Vec<Arc<MockTransport>>,
}

/// Scripted connector: records dial times and hands out mock transports.
#[derive(Default)]
pub struct MockConnector {
    state: Mutex<ConnectorState>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every future dial fail.
    pub fn fail_all(&self, on: bool) {
        self.state.lock().unwrap().fail_all = on;
    }

    /// Make the next `n` dials fail, then succeed again.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().unwrap().fail_next = n;
    }

    /// Number of dial attempts seen.
    pub fn dial_count(&self) -> usize {
        self.state.lock().unwrap().dial_times.len()
    }

    /// Times of each dial attempt, in order.
    pub fn dial_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().dial_times.clone()
    }

    /// The transport produced by the `idx`-th successful dial.
    pub fn transport(&self, idx: usize) -> Arc<MockTransport> {
        Arc::clone(&self.state.lock().unwrap().transports[idx])
    }

    /// The most recently produced transport.
    pub fn last_transport(&self) -> Arc<MockTransport> {
        let state = self.state.lock().unwrap();
        Arc::clone(state.transports.last().expect("no transport dialed yet"))
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _url: &str,
    ) -> PulseResult<(Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let mut state = self.state.lock().unwrap();
        state.dial_times.push(Instant::now());

        if state.fail_all || state.fail_next > 0 {
            if state.fail_next > 0 {
                state.fail_next -= 1;
            }
            return Err(PulseError::Socket("dial refused".into()));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let _ = event_tx.send(TransportEvent::Opened);
        let transport = Arc::new(MockTransport {
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            event_tx,
        });
        state.transports.push(Arc::clone(&transport));
        Ok((transport as Arc<dyn Transport>, event_rx))
    }
}

/// Let spawned tasks and timers drain. Under a paused clock this advances
/// virtual time without real waiting.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
}
