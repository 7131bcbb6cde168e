//! Inbound socket event types.
//!
//! Defines all event kinds streamed from the Pulse server and the typed
//! payloads carried by them. Wire frames are JSON text messages of the
//! form `{"event": <name>, "data": <object>}`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use pulse_core::error::PulseResult;

/// All inbound event kinds emitted by the Pulse server.
///
/// These map 1:1 to the server's event names for the real-time channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Server acknowledged the connection (`connected`).
    Connected,
    /// Authentication handshake succeeded (`auth_success`).
    AuthSuccess,
    /// Authentication handshake failed (`auth_error`).
    AuthError,
    /// A channel subscription was accepted (`subscribed`).
    Subscribed,
    /// A channel subscription was removed (`unsubscribed`).
    Unsubscribed,
    /// A subscribe request was rejected (`subscribe_error`).
    SubscribeError,
    /// A pushed notification payload (`message`).
    Message,
    /// Liveness reply to a client ping (`pong`).
    Pong,
    /// Answer to a `get_rooms` request (`rooms`).
    Rooms,
    /// Unknown/unhandled event kind.
    Unknown(String),
}

impl EventKind {
    /// Parse an event name string from the server.
    pub fn from_str(s: &str) -> Self {
        match s {
            "connected" => Self::Connected,
            "auth_success" => Self::AuthSuccess,
            "auth_error" => Self::AuthError,
            "subscribed" => Self::Subscribed,
            "unsubscribed" => Self::Unsubscribed,
            "subscribe_error" => Self::SubscribeError,
            "message" => Self::Message,
            "pong" => Self::Pong,
            "rooms" => Self::Rooms,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Convert to the server event name string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::AuthSuccess => "auth_success",
            Self::AuthError => "auth_error",
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
            Self::SubscribeError => "subscribe_error",
            Self::Message => "message",
            Self::Pong => "pong",
            Self::Rooms => "rooms",
            Self::Unknown(s) => s.as_str(),
        }
    }

    /// Whether this event is part of the authentication handshake.
    pub fn is_auth_event(&self) -> bool {
        matches!(self, Self::AuthSuccess | Self::AuthError)
    }

    /// Whether this event acknowledges a subscription change.
    pub fn is_subscription_event(&self) -> bool {
        matches!(self, Self::Subscribed | Self::Unsubscribed | Self::SubscribeError)
    }

    /// All known event name strings the server can emit.
    pub fn all_event_names() -> &'static [&'static str] {
        &[
            "connected",
            "auth_success",
            "auth_error",
            "subscribed",
            "unsubscribed",
            "subscribe_error",
            "message",
            "pong",
            "rooms",
        ]
    }
}

/// An inbound frame with its event kind and raw data payload.
#[derive(Debug, Clone)]
pub struct ServerFrame {
    /// The kind of event.
    pub event: EventKind,
    /// The event payload data from the server.
    pub data: serde_json::Value,
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ServerFrame {
    /// Parse a frame from its JSON text form.
    pub fn from_json_str(text: &str) -> PulseResult<Self> {
        let raw: RawFrame = serde_json::from_str(text)?;
        Ok(Self {
            event: EventKind::from_str(&raw.event),
            data: raw.data,
        })
    }

    /// Try to parse the data as a Notification (for `message` frames).
    pub fn as_notification(&self) -> Option<Notification> {
        if self.event == EventKind::Message {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }

    /// Try to parse the data as a SubscriptionAck.
    pub fn as_subscription_ack(&self) -> Option<SubscriptionAck> {
        if matches!(self.event, EventKind::Subscribed | EventKind::Unsubscribed) {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }

    /// Extract the room list from a `rooms` frame.
    pub fn as_rooms(&self) -> Option<Vec<String>> {
        if self.event == EventKind::Rooms {
            serde_json::from_value::<RoomsPayload>(self.data.clone())
                .ok()
                .map(|p| p.rooms)
        } else {
            None
        }
    }
}

/// Category of a pushed notification, from the envelope's `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Alert,
    Notification,
    DataUpdate,
    System,
    Unknown(String),
}

impl NotificationKind {
    /// Parse a notification type string from the envelope.
    pub fn from_str(s: &str) -> Self {
        match s {
            "alert" => Self::Alert,
            "notification" => Self::Notification,
            "data_update" => Self::DataUpdate,
            "system" => Self::System,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Convert to the envelope type string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Alert => "alert",
            Self::Notification => "notification",
            Self::DataUpdate => "data_update",
            Self::System => "system",
            Self::Unknown(s) => s.as_str(),
        }
    }
}

/// Notification envelope pushed on `message` frames.
///
/// Content semantics are the server's business; the client treats the
/// payload as opaque beyond this envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Server-assigned notification id.
    #[serde(default)]
    pub id: String,
    /// Notification category string (see [`NotificationKind`]).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Severity level ("info", "warning", "error").
    #[serde(default)]
    pub level: String,
    /// Optional short title.
    #[serde(default)]
    pub title: Option<String>,
    /// Optional body text.
    #[serde(default)]
    pub content: Option<String>,
    /// Structured payload data.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Server-side timestamp.
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

impl Notification {
    /// The typed notification category.
    pub fn kind(&self) -> NotificationKind {
        NotificationKind::from_str(&self.kind)
    }
}

/// Acknowledgment payload for `subscribed`/`unsubscribed` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionAck {
    /// Channel type string.
    #[serde(rename = "type")]
    pub channel: String,
    /// Channel target.
    pub target: String,
    /// Full room name, present on `subscribed` acks.
    #[serde(default)]
    pub room: Option<String>,
}

#[derive(Deserialize)]
struct RoomsPayload {
    #[serde(default)]
    rooms: Vec<String>,
}
