//! Sends a JSON state file to a connected renderer once per second and prints each reply.
//!
//! ```text
//! cargo run --example render_loop -- ./largestate.json ipc:///tmp/statelink
//! ```

use std::time::Duration;

use statelink::{Endpoint, EndpointSettings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let state_path = args.next().unwrap_or_else(|| "./largestate.json".to_string());
    let address = args
        .next()
        .unwrap_or_else(|| "ipc:///tmp/statelink".to_string());

    let state: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&state_path)?)?;
    let mut endpoint = Endpoint::from_settings(EndpointSettings::new(address)).await?;
    info!(address = %endpoint.local_address(), state = %state_path, "waiting for renderer");

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        match endpoint.exchange(&state).await {
            Ok(reply) => println!("Received reply: {}", String::from_utf8_lossy(&reply)),
            Err(e) if e.is_timeout() => error!("renderer did not answer: {}", e),
            // The endpoint drops the peer on failure; the next tick waits for a new one.
            Err(e) => error!("exchange failed: {}", e),
        }
    }

    println!("{}", endpoint.stats());
    endpoint.close().await?;
    Ok(())
}
