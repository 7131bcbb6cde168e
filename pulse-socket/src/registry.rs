//! Durable subscription registry.
//!
//! Holds the set of channels the client wants active, independent of
//! transport state. The registry survives transport replacement and is
//! replayed in full against every new connection.

use serde::{Deserialize, Serialize};

/// Channel type, matching the server's room types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    /// Per-user direct channel.
    User,
    /// Events for one tracked keyword.
    Keyword,
    /// Site-wide broadcast channel.
    Global,
    /// Operational/system announcements.
    System,
}

impl ChannelType {
    /// Parse a channel type string. Returns None for unknown types.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "keyword" => Some(Self::Keyword),
            "global" => Some(Self::Global),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Convert to the server channel type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Keyword => "keyword",
            Self::Global => "global",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One desired channel subscription, unique by (type, target).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    /// Channel type.
    pub channel: ChannelType,
    /// Channel target (user id, keyword, etc.).
    pub target: String,
}

impl Subscription {
    /// Create a new subscription entry.
    pub fn new(channel: ChannelType, target: impl Into<String>) -> Self {
        Self {
            channel,
            target: target.into(),
        }
    }

    /// The server-side room name for this subscription (`"{type}:{target}"`).
    pub fn room_name(&self) -> String {
        format!("{}:{}", self.channel.as_str(), self.target)
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.room_name())
    }
}

/// Insertion-ordered, duplicate-free set of desired subscriptions.
///
/// Not owned by any transport: entries persist across reconnects and are
/// replayed against each new connection.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a subscription if absent. Returns true if this is a new entry,
    /// letting the caller decide whether a wire request is needed.
    pub fn add(&mut self, channel: ChannelType, target: impl Into<String>) -> bool {
        let sub = Subscription::new(channel, target);
        if self.entries.contains(&sub) {
            return false;
        }
        self.entries.push(sub);
        true
    }

    /// Remove a subscription if present. Returns true if an entry was removed.
    pub fn remove(&mut self, channel: &ChannelType, target: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|s| !(s.channel == *channel && s.target == target));
        self.entries.len() != before
    }

    /// Whether the given subscription is tracked.
    pub fn contains(&self, channel: &ChannelType, target: &str) -> bool {
        self.entries
            .iter()
            .any(|s| s.channel == *channel && s.target == target)
    }

    /// Number of tracked subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate subscriptions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    /// Invoke `send_fn` for every tracked subscription, in insertion order.
    ///
    /// Called once per successful transport open to re-establish every
    /// subscription against the new connection.
    pub fn replay_all<F: FnMut(&Subscription)>(&self, mut send_fn: F) {
        for sub in &self.entries {
            send_fn(sub);
        }
    }
}
