//! Status command - show configuration and server reachability.

use console::style;

use pulse_core::config::ConfigHandle;
use pulse_core::error::PulseResult;

use crate::OutputFormat;

/// Run the status command.
pub async fn run(config: ConfigHandle, format: OutputFormat) -> PulseResult<()> {
    let cfg = config.read().await;
    let address = cfg.server.address.clone();
    let socket_url = cfg.socket_url();
    let max_attempts = cfg.socket.max_reconnect_attempts;
    let base_delay_ms = cfg.socket.reconnect_base_delay_ms;
    drop(cfg);

    let (reachable, latency_ms, version) = if address.is_empty() {
        (false, None, None)
    } else {
        let api = super::create_api_client(&config).await?;
        match api.health_check().await {
            Ok(latency) => {
                let version = api.health().await.ok().and_then(|h| h.version);
                (true, Some(latency.as_millis() as u64), version)
            }
            Err(_) => (false, None, None),
        }
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "server_address": address,
                "socket_url": socket_url,
                "server_reachable": reachable,
                "latency_ms": latency_ms,
                "server_version": version,
                "reconnect": {
                    "base_delay_ms": base_delay_ms,
                    "max_attempts": max_attempts,
                },
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!(
                "Server:      {}",
                if address.is_empty() { "(unconfigured)" } else { address.as_str() }
            );
            println!("Socket:      {socket_url}");
            if reachable {
                println!(
                    "Reachable:   {} ({} ms)",
                    style("yes").green(),
                    latency_ms.unwrap_or_default()
                );
                if let Some(v) = version {
                    println!("Version:     {v}");
                }
            } else {
                println!("Reachable:   {}", style("no").red());
            }
            println!("Reconnect:   every {base_delay_ms}ms * attempt, max {max_attempts} attempts");
        }
    }

    Ok(())
}
