//! Scene switcher example
//!
//! Cycles through every scene in a running OBS instance, printing the
//! `SwitchScenes` events the service sends back.
//!
//! Run with: cargo run --example scene_switcher -- [address] [port]

use obsws::ObsClient;
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| obsws::client::DEFAULT_ADDRESS.to_string());
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => obsws::client::DEFAULT_PORT,
    };

    let client = ObsClient::builder()
        .address(address)
        .port(port)
        .on_event(|event| {
            if event["update-type"] == "SwitchScenes" {
                println!("Now showing: {}", event["scene-name"]);
            }
        })
        .build()?;

    let version = client.request("GetVersion", json!({}))?;
    println!(
        "Connected to obs-websocket {} (OBS {})",
        version["obs-websocket-version"], version["obs-studio-version"]
    );

    let list = client.request("GetSceneList", json!({}))?;
    let scenes: Vec<String> = list["scenes"]
        .as_array()
        .map(|scenes| {
            scenes
                .iter()
                .filter_map(|s| s["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    println!("Found {} scenes", scenes.len());

    for scene in &scenes {
        tracing::info!(scene = %scene, "Switching scene");
        if !client.emit(&json!({"request-type": "SetCurrentScene", "scene-name": scene})) {
            tracing::warn!(scene = %scene, "Switch request not sent");
        }
        std::thread::sleep(Duration::from_secs(2));
    }

    client.terminate()?;
    Ok(())
}
