//! Runboard server - leaderboard and analytics backend
//!
//! Serves the game client's submission endpoint and the dashboard's
//! ranking/history/analytics queries over SQLite.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin runboard
//! ```
//!
//! ## Environment Variables
//!
//! - BIND_ADDR - Listen address (default: 0.0.0.0:<PORT>)
//! - PORT - Listen port when BIND_ADDR is unset (default: 8080)
//! - RUNBOARD_DB_PATH - SQLite database path (default: data/runboard.db)
//! - GAME_API_TOKEN - Bearer token required on /api/game/submit (optional)
//! - DISPLAY_UTC_OFFSET_HOURS - Fixed offset for activity labels (default: 9)
//! - SUBMISSIONS_ENABLED - Set false to close the submit endpoint with 410 (default: true)
//! - RUST_LOG - Logging level (optional, default: info)

use runboard::config::Config;
use runboard::server::{router, AppState};
use runboard::store::GameStore;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("🚀 Starting runboard...");
    log::info!("📊 Configuration:");
    log::info!("   BIND_ADDR: {}", config.bind_addr);
    log::info!("   DB path: {}", config.db_path);
    log::info!("   Display offset: UTC{:+}h", config.display_utc_offset_hours);
    log::info!(
        "   Submissions: {}",
        if config.submissions_enabled {
            "enabled"
        } else {
            "disabled (410 Gone)"
        }
    );
    log::info!(
        "   Submission auth: {}",
        if config.api_token.is_some() {
            "bearer token"
        } else {
            "open"
        }
    );

    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = GameStore::open(&config.db_path)?;
    log::info!(
        "🗄️  Database ready: {} devices, {} results recorded",
        store.device_count()?,
        store.total_plays()?
    );

    let state = AppState::new(store, &config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("✅ Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
