//! Connects to a bound endpoint and answers every state with an HTML page.
//!
//! ```text
//! cargo run --example renderer -- ipc:///tmp/statelink
//! ```

use statelink::{Address, Responder, ResponderConfig};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn render(state: &serde_json::Value) -> String {
    let title = state
        .get("title")
        .and_then(|t| t.as_str())
        .unwrap_or("statelink");
    format!(
        "<!DOCTYPE html><html><head><title>{}</title></head><body><pre>{}</pre></body></html>",
        title, state
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let address: Address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ipc:///tmp/statelink".to_string())
        .parse()?;

    let mut responder = Responder::connect(&address, ResponderConfig::default()).await?;
    responder
        .serve(|request| async move {
            match serde_json::from_slice::<serde_json::Value>(&request) {
                Ok(state) => render(&state),
                Err(e) => {
                    warn!("state is not valid JSON: {}", e);
                    format!("<!-- invalid state: {} -->", e)
                }
            }
        })
        .await?;
    Ok(())
}
