//! Session walkthrough against a running backend
//!
//! Usage:
//!   COSTANZA_EMAIL=a@x.com COSTANZA_PASSWORD=secret cargo run --example session_demo

use costanza_rs_client::{
    ClientConfig, CostanzaApi, FileStorage, NoopNavigator, RequestGateway, SessionManager,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let storage_path =
        std::env::var("COSTANZA_SESSION_FILE").unwrap_or_else(|_| "costanza-session.json".to_string());

    println!("=== Costanza Client Example ===");
    println!("Backend: {}", config.api_url());
    println!("Session file: {}", storage_path);
    println!();

    let storage = Arc::new(FileStorage::open(&storage_path)?);
    let session = SessionManager::new(config, storage, Arc::new(NoopNavigator))?;
    session.hydrate().await;

    if let Some(user) = session.user() {
        println!("✓ Restored session for {} <{}>", user.username, user.email);
    } else {
        let email = std::env::var("COSTANZA_EMAIL")?;
        let password = std::env::var("COSTANZA_PASSWORD")?;
        match session.login_with_password(&email, &password).await {
            Ok(user) => println!("✓ Logged in as {}", user.username),
            Err(e) => {
                println!("! Login failed: {}", e.detail().unwrap_or("unexpected error"));
                for (field, messages) in e.field_errors() {
                    println!("  {field}: {}", messages.join(", "));
                }
                return Ok(());
            }
        }
    }
    println!();

    let gateway = RequestGateway::new(Arc::clone(&session));
    let api = CostanzaApi::new(gateway);

    // Expired tokens are renewed transparently here
    match api.trails().await {
        Ok(trails) => println!("Trails: {}", serde_json::to_string_pretty(&trails)?),
        Err(e) if e.is_session_expired() => println!("! Session expired, please log in again"),
        Err(e) => println!("! Request failed: {}", e),
    }

    Ok(())
}
