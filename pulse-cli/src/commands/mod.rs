//! CLI command implementations.

pub mod listen;
pub mod status;

use pulse_api::ApiClient;
use pulse_core::config::ConfigHandle;
use pulse_core::error::{PulseError, PulseResult};
use pulse_socket::ChannelType;

/// Helper to create an API client from config.
pub async fn create_api_client(config: &ConfigHandle) -> PulseResult<ApiClient> {
    let server_config = config.read().await.server.clone();
    if server_config.address.is_empty() {
        return Err(PulseError::MissingConfig("server address".into()));
    }
    ApiClient::new(&server_config)
}

/// Parse a `type:target` channel argument.
pub fn parse_channel(arg: &str) -> PulseResult<(ChannelType, String)> {
    let (kind, target) = arg
        .split_once(':')
        .ok_or_else(|| PulseError::Config(format!("invalid channel '{arg}', expected type:target")))?;
    let channel = ChannelType::from_str(kind)
        .ok_or_else(|| PulseError::Config(format!("unknown channel type '{kind}'")))?;
    if target.is_empty() {
        return Err(PulseError::Config(format!("empty channel target in '{arg}'")));
    }
    Ok((channel, target.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel() {
        let (channel, target) = parse_channel("keyword:rust").unwrap();
        assert_eq!(channel, ChannelType::Keyword);
        assert_eq!(target, "rust");
    }

    #[test]
    fn test_parse_channel_with_colon_in_target() {
        let (channel, target) = parse_channel("user:org:7").unwrap();
        assert_eq!(channel, ChannelType::User);
        assert_eq!(target, "org:7");
    }

    #[test]
    fn test_parse_channel_rejects_bad_input() {
        assert!(parse_channel("keyword").is_err());
        assert!(parse_channel("mystery:x").is_err());
        assert!(parse_channel("keyword:").is_err());
    }
}
