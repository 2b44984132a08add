//! Cane monitor: connect to the smart cane and print obstacle reports
//!
//! Shows link state changes and reconnect attempts as they happen.
//!
//! Run with: cargo run --example cane_monitor
//!
//! To look for a differently named device:
//!   SMARTCANE_DEVICE_NAME=MyCane cargo run --example cane_monitor

use smartcane_assistant::{BleTransport, Config, LinkEvent, LinkManager, LogSpeaker, Result};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,smartcane_assistant=info")
        .init();

    let config = Config::load(None)?;
    println!("Looking for {}...\n", config.link.device_name);

    let transport = BleTransport::new().await?;
    let link = LinkManager::new(transport, Arc::new(LogSpeaker), config.link);
    let mut events = link.subscribe();

    link.connect().await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(LinkEvent::StateChanged { from, to }) => println!("Link: {} -> {}", from, to),
                Ok(LinkEvent::Obstacle(message)) => println!("Obstacle: {}", message),
                Ok(LinkEvent::ReconnectAttemptFailed { attempt, reason }) => {
                    println!("Reconnect attempt {} failed: {}", attempt, reason)
                }
                Ok(LinkEvent::ReconnectCancelled { attempts }) => {
                    println!("Reconnect loop stopped after {} attempts", attempts)
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    link.shutdown().await;
    println!("\nDone.");
    Ok(())
}
