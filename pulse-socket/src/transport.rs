//! Transport seam for the real-time channel.
//!
//! A [`Transport`] is one physical duplex connection, replaced wholesale on
//! every reconnect. It carries outbound [`ClientFrame`]s fire-and-forget and
//! emits [`TransportEvent`]s (lifecycle + inbound frames) on a channel owned
//! by the connection manager. [`Connector`] is the factory seam the manager
//! dials through, so tests can substitute a scripted in-memory transport.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use pulse_core::error::{PulseError, PulseResult};

use crate::events::ServerFrame;
use crate::registry::ChannelType;

/// Outbound wire requests.
///
/// Serialized as JSON text frames `{"event": <name>, "data": <object>}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// Post-connect authentication handshake carrying the bearer token.
    Authenticate { token: String },
    /// Subscribe to a channel.
    Subscribe { channel: ChannelType, target: String },
    /// Unsubscribe from a channel.
    Unsubscribe { channel: ChannelType, target: String },
    /// Ask the server which rooms this connection is in.
    GetRooms,
    /// Liveness probe.
    Ping,
}

impl ClientFrame {
    /// The wire event name for this request.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::GetRooms => "get_rooms",
            Self::Ping => "ping",
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> serde_json::Value {
        let data = match self {
            Self::Authenticate { token } => serde_json::json!({ "token": token }),
            Self::Subscribe { channel, target } | Self::Unsubscribe { channel, target } => {
                serde_json::json!({ "type": channel.as_str(), "target": target })
            }
            Self::GetRooms | Self::Ping => serde_json::json!({}),
        };
        serde_json::json!({ "event": self.event_name(), "data": data })
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_text(&self) -> String {
        self.to_json().to_string()
    }
}

/// Low-level lifecycle events and inbound frames from one transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// The connection is established and ready for frames.
    Opened,
    /// An inbound application frame.
    Frame(ServerFrame),
    /// The connection closed, with the close reason if the peer gave one.
    Closed { reason: String },
    /// A transport-level error. The connection is unusable afterwards.
    Error { message: String },
}

/// One physical duplex connection.
///
/// `send` is fire-and-forget: frames are queued to a writer task and
/// delivery failures surface as transport events, never synchronously.
pub trait Transport: Send + Sync {
    /// Queue a frame for sending.
    fn send(&self, frame: ClientFrame) -> PulseResult<()>;

    /// Request the connection be closed. Idempotent.
    fn close(&self);
}

/// Factory for opening transports, one new physical connection per call.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial the endpoint. On success returns the transport handle and the
    /// receiver for its event stream (which starts with `Opened`).
    async fn connect(
        &self,
        url: &str,
    ) -> PulseResult<(Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>)>;
}

enum WriterCommand {
    Frame(ClientFrame),
    Close,
}

/// Production transport over a WebSocket connection.
///
/// The socket is split into a writer task draining a command queue and a
/// reader task mapping inbound messages to [`TransportEvent`]s.
pub struct WsTransport {
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
}

impl Transport for WsTransport {
    fn send(&self, frame: ClientFrame) -> PulseResult<()> {
        self.writer_tx
            .send(WriterCommand::Frame(frame))
            .map_err(|_| PulseError::SocketDisconnected)
    }

    fn close(&self) {
        // Writer gone means the socket is already down; nothing to close.
        let _ = self.writer_tx.send(WriterCommand::Close);
    }
}

/// Connector dialing real WebSocket endpoints.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> PulseResult<(Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| PulseError::Socket(format!("websocket connect failed: {e}")))?;
        debug!("websocket established to {url}");

        let (mut sink, mut source) = stream.split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<WriterCommand>();

        // The handshake completed, so the connection is open from the
        // manager's point of view before any inbound frame arrives.
        let _ = event_tx.send(TransportEvent::Opened);

        // Writer task: drains the command queue until close or sink failure.
        tokio::spawn(async move {
            while let Some(command) = writer_rx.recv().await {
                match command {
                    WriterCommand::Frame(frame) => {
                        if let Err(e) = sink.send(Message::Text(frame.to_text())).await {
                            warn!("websocket send failed: {e}");
                            break;
                        }
                    }
                    WriterCommand::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        // Reader task: maps inbound messages to transport events.
        tokio::spawn(async move {
            let mut terminal_sent = false;
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => match ServerFrame::from_json_str(&text) {
                        Ok(frame) => {
                            if event_tx.send(TransportEvent::Frame(frame)).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("discarding malformed frame: {e}"),
                    },
                    Ok(Message::Close(close_frame)) => {
                        let reason = close_frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                        let _ = event_tx.send(TransportEvent::Closed { reason });
                        terminal_sent = true;
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_))
                    | Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        let _ = event_tx.send(TransportEvent::Error {
                            message: e.to_string(),
                        });
                        terminal_sent = true;
                        break;
                    }
                }
            }
            if !terminal_sent {
                // Stream exhausted without a close frame counts as a disconnect.
                let _ = event_tx.send(TransportEvent::Closed {
                    reason: "stream ended".to_string(),
                });
            }
        });

        let transport = Arc::new(WsTransport { writer_tx }) as Arc<dyn Transport>;
        Ok((transport, event_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_event_names() {
        assert_eq!(
            ClientFrame::Authenticate { token: "t".into() }.event_name(),
            "authenticate"
        );
        assert_eq!(ClientFrame::GetRooms.event_name(), "get_rooms");
        assert_eq!(ClientFrame::Ping.event_name(), "ping");
    }

    #[test]
    fn test_authenticate_wire_form() {
        let frame = ClientFrame::Authenticate { token: "T1".into() };
        let json = frame.to_json();
        assert_eq!(json["event"], "authenticate");
        assert_eq!(json["data"]["token"], "T1");
    }

    #[test]
    fn test_subscribe_wire_form() {
        let frame = ClientFrame::Subscribe {
            channel: ChannelType::Keyword,
            target: "rust".into(),
        };
        let json = frame.to_json();
        assert_eq!(json["event"], "subscribe");
        assert_eq!(json["data"]["type"], "keyword");
        assert_eq!(json["data"]["target"], "rust");
    }

    #[test]
    fn test_ping_wire_form_has_empty_data() {
        let json = ClientFrame::Ping.to_json();
        assert_eq!(json["event"], "ping");
        assert!(json["data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_to_text_is_compact_json() {
        let text = ClientFrame::GetRooms.to_text();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["event"], "get_rooms");
    }
}
