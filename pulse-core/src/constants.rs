//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Pulse";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// REST API path prefix.
pub const API_PREFIX: &str = "api";

/// Default REST request timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Base delay between socket reconnection attempts, in milliseconds.
/// Attempt `n` (1-indexed) waits `n` times this value.
pub const SOCKET_RECONNECT_BASE_DELAY_MS: u64 = 5_000;

/// Maximum number of consecutive socket reconnection attempts before
/// the connection is declared failed.
pub const SOCKET_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// How long a `get_rooms` request waits for the server's answer.
pub const GET_ROOMS_TIMEOUT_SECS: u64 = 5;

/// Channel/room type string constants matching the server's room types.
pub mod channels {
    pub const USER: &str = "user";
    pub const KEYWORD: &str = "keyword";
    pub const GLOBAL: &str = "global";
    pub const SYSTEM: &str = "system";

    /// All valid channel types.
    pub const ALL: &[&str] = &[USER, KEYWORD, GLOBAL, SYSTEM];
}
