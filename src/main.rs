mod config;
mod error;
mod handlers;
mod models;
mod services;
mod web; // Upload form and result page

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;

use config::AppConfig;
use handlers::RequestHandler;
use services::{GeminiService, InferenceClient, StagingStore};
use web::server::create_router;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    log::info!("🚀 Starting Calorie Advisor...");

    // A missing API key stops us here, before any request is accepted
    let config = AppConfig::from_env()?;

    let gemini = GeminiService::new(&config.gemini)?;
    log::info!("✅ Gemini service initialized with model: {}", gemini.model());
    let client = Arc::new(gemini) as Arc<dyn InferenceClient>;

    let staging = StagingStore::new(&config.staging_dir);
    log::info!("✅ Staging directory: {}", staging.dir().display());

    let request_handler = Arc::new(RequestHandler::new(staging, client, config.instruction.clone()));
    log::info!("✅ Request handler initialized");

    let app = create_router(request_handler, &config.static_dir, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    log::info!("🌐 Web server listening on {}", config.bind_addr);

    println!("\n🍽️ Calorie Advisor is running!");
    println!("🌐 Open http://{} and upload a food photo", config.bind_addr);
    println!("\n🛑 Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("🛑 Shutting down...");
        })
        .await
        .context("Web server stopped unexpectedly")?;

    Ok(())
}
