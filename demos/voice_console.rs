//! Voice console: type what you would say to the assistant
//!
//! Each line read from stdin is handled as a recognized transcript.
//! Replies are spoken with the configured speech program.
//!
//! Run with: cargo run --example voice_console
//!
//! To use a configuration file:
//!   cargo run --example voice_console -- smartcane.toml

use smartcane_assistant::{
    Assistant, AssistantParts, BleTransport, CommandLauncher, CommandSpeaker, Config,
    FixedGeolocator, Geolocator, LinkManager, NominatimClient, Result, Speaker,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smartcane_assistant=debug".parse().unwrap()),
        )
        .init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(path.as_deref())?;
    println!("Assistant variant: {:?}", config.variant);

    let speaker: Arc<dyn Speaker> = Arc::new(CommandSpeaker::new(
        config.voice.program.clone(),
        config.voice.language.clone(),
        config.voice_profile(),
    ));
    let transport = BleTransport::new().await?;
    let link = LinkManager::new(transport, speaker.clone(), config.link.clone());

    let geolocator = config
        .assistant
        .fixed_position
        .map(|position| Arc::new(FixedGeolocator::new(position)) as Arc<dyn Geolocator>);
    let geocoder = NominatimClient::new(
        &config.assistant.geocoder_url,
        &config.assistant.user_agent,
        config.assistant.geocoder_timeout(),
    )?;
    let launcher = CommandLauncher::new(config.assistant.opener.clone());

    let assistant = Assistant::new(
        config,
        AssistantParts {
            link: link.clone(),
            speaker,
            launcher: Arc::new(launcher),
            geolocator,
            geocoder: Arc::new(geocoder),
        },
    );

    let _obstacles = link.on_obstacle(|message| println!("  [cane] {}", message));

    assistant.greet();
    println!("Type a command (Ctrl-D to quit):");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let transcript = line.trim();
        if transcript.is_empty() {
            continue;
        }
        let intent = assistant.handle_transcript(transcript).await;
        println!("  -> {:?} (link {})", intent, link.state());
    }

    link.shutdown().await;
    Ok(())
}
