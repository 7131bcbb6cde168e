//! Listen command - stream live notifications from the server.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use dialoguer::Password;
use tracing::warn;

use pulse_core::config::ConfigHandle;
use pulse_core::error::PulseResult;
use pulse_socket::{
    ConnectionState, EventKind, Notification, ReconnectPolicy, SocketManager, WsConnector,
};

/// Run the listen command.
pub async fn run(
    config: ConfigHandle,
    channels: Vec<String>,
    token: Option<String>,
    username: Option<String>,
    anonymous: bool,
    ping_interval: u64,
) -> PulseResult<()> {
    // Parse channel arguments up front so a typo fails before connecting.
    let mut subscriptions = Vec::with_capacity(channels.len());
    for arg in &channels {
        subscriptions.push(super::parse_channel(arg)?);
    }

    // Token: arg > REST login > anonymous.
    let token = if anonymous {
        None
    } else if token.is_some() {
        token
    } else {
        Some(login(&config, username).await?)
    };

    let (socket_url, policy) = {
        let cfg = config.read().await;
        if !cfg.is_server_configured() {
            return Err(pulse_core::error::PulseError::MissingConfig(
                "server address".into(),
            ));
        }
        (cfg.socket_url(), ReconnectPolicy::from_config(&cfg.socket))
    };

    println!(
        "{} Connecting to {}...",
        style("[1/2]").bold().dim(),
        socket_url
    );

    let manager = SocketManager::new(socket_url, Arc::new(WsConnector::new())).with_policy(policy);

    // Print incoming notifications as they arrive.
    manager.on(EventKind::Message, |data| {
        match serde_json::from_value::<Notification>(data.clone()) {
            Ok(n) => {
                let label = style(format!("[{}]", n.kind)).cyan();
                let title = n.title.as_deref().unwrap_or("(untitled)");
                let body = n.content.as_deref().unwrap_or("");
                println!("  {label} {} {title} {body}", level_badge(&n.level));
            }
            Err(_) => println!("  {} {data}", style("[message]").cyan()),
        }
    });
    manager.on(EventKind::Subscribed, |data| {
        println!("  {} {data}", style("subscribed").green());
    });
    manager.on(EventKind::SubscribeError, |data| {
        println!("  {} {data}", style("subscribe failed").red());
    });
    manager.on(EventKind::AuthError, |data| {
        println!(
            "  {} authentication rejected: {data} (public events only)",
            style("WARN").yellow()
        );
    });

    for (channel, target) in subscriptions {
        manager.subscribe(channel, target).await;
    }

    let mut state_rx = manager.state_receiver();
    manager.connect(token).await?;

    println!(
        "{} Listening for events... (Ctrl+C to stop)",
        style("[2/2]").bold().dim()
    );
    println!();

    let mut ping_timer = tokio::time::interval(Duration::from_secs(ping_interval.max(1)));
    ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_timer.tick().await;

    loop {
        tokio::select! {
            _ = ping_timer.tick(), if ping_interval > 0 => {
                manager.ping().await;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow();
                match state {
                    ConnectionState::Connected => {
                        println!("  {} connected", style("OK").green().bold());
                    }
                    ConnectionState::Reconnecting => {
                        println!("  {} connection lost, retrying...", style("WARN").yellow());
                    }
                    ConnectionState::Failed => {
                        println!(
                            "  {} reconnection attempts exhausted, giving up",
                            style("FAIL").red().bold()
                        );
                        break;
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Disconnecting...");
                break;
            }
        }
    }

    manager.disconnect().await;
    Ok(())
}

/// Log in over REST to obtain the socket bearer token.
async fn login(config: &ConfigHandle, username: Option<String>) -> PulseResult<String> {
    let api = super::create_api_client(config).await?;

    let user = match username {
        Some(u) => u,
        None => {
            let configured = config.read().await.server.username.clone();
            if configured.is_empty() {
                return Err(pulse_core::error::PulseError::MissingConfig(
                    "username (use --username, --token, or --anonymous)".into(),
                ));
            }
            configured
        }
    };

    let password = Password::new()
        .with_prompt(format!("Password for {user}"))
        .interact()
        .map_err(|e| pulse_core::error::PulseError::Internal(e.to_string()))?;

    match api.login(&user, &password).await {
        Ok(token) => Ok(token),
        Err(e) => {
            warn!("login failed: {e}");
            Err(e)
        }
    }
}

/// Colored severity badge for a notification level.
fn level_badge(level: &str) -> console::StyledObject<String> {
    let label = level.to_uppercase();
    match level {
        "error" => style(label).red().bold(),
        "warning" => style(label).yellow(),
        _ => style(label).dim(),
    }
}
