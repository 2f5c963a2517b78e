//! Dashboard session example
//!
//! Usage:
//!   NETADMIN_BASE_URL=http://localhost:8080 \
//!   NETADMIN_ACCESS_TOKEN=... NETADMIN_REFRESH_TOKEN=... \
//!   cargo run --example dashboard_session

use netadmin_client::{AdminClient, ApiRequest, AuthTokens, ClientConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::from_env()?;
    let access = std::env::var("NETADMIN_ACCESS_TOKEN").unwrap_or_default();
    let refresh = std::env::var("NETADMIN_REFRESH_TOKEN").unwrap_or_default();
    let site = std::env::var("NETADMIN_SITE").unwrap_or_else(|_| "default".to_string());

    println!("=== Network Admin Client Example ===");
    println!("Backend: {}", config.base_url);
    println!("Site:    {}", site);
    println!();

    let client = AdminClient::new(config)?;
    client.establish_session(&AuthTokens::new(access, refresh));
    client.site().select(site);

    // Dashboard widgets load in parallel; an expired token is refreshed once
    // and every widget request is replayed with the new one.
    let (devices, ssids, stats) = tokio::join!(
        client.execute(ApiRequest::get("/v1/device_management/list").query("page", 1)),
        client.get("/v1/ssid_management/list"),
        client.get("/v1/statistics/overview"),
    );

    for (name, result) in [("devices", devices), ("ssids", ssids), ("stats", stats)] {
        match result {
            Ok(resp) if resp.is_success() => println!("✓ {name}: {}", resp.data.unwrap_or_default()),
            Ok(resp) => println!("! {name}: code {} {}", resp.code, resp.message.unwrap_or_default()),
            Err(e) => println!("✗ {name}: {}", serde_json::to_string(&e.to_body())?),
        }
    }

    if let Some(tokens) = client.tokens().tokens() {
        println!();
        println!("Session still valid ({} chars of access token)", tokens.access_token.len());
    }

    Ok(())
}
