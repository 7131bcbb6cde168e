//! Pulse Socket - real-time notification client.
//!
//! This crate maintains the live channel to the Pulse server:
//! - Connection lifecycle over a pluggable transport (WebSocket in production)
//! - Authentication handshake with the REST-supplied bearer token
//! - Durable channel subscriptions, replayed against every new transport
//! - Automatic reconnection with linear backoff and a bounded attempt budget
//! - Ordered event dispatch to registered listeners

pub mod dispatcher;
pub mod events;
pub mod manager;
pub mod registry;
pub mod transport;

// Re-export key types
pub use dispatcher::{Dispatcher, ListenerId};
pub use events::{EventKind, Notification, NotificationKind, ServerFrame, SubscriptionAck};
pub use manager::{ConnectionState, ReconnectPolicy, SocketManager};
pub use registry::{ChannelType, Subscription, SubscriptionRegistry};
pub use transport::{ClientFrame, Connector, Transport, TransportEvent, WsConnector};
