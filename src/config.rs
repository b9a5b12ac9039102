use std::env;

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: String,
    /// Bearer token required on the submission endpoint.
    /// If unset, submissions are accepted without authentication.
    pub api_token: Option<String>,
    /// Fixed UTC offset (hours) used when formatting activity labels.
    /// The deployed dashboard renders in JST, so the default is +9.
    pub display_utc_offset_hours: i32,
    /// Operational kill switch: when false the submission endpoint
    /// answers 410 Gone without touching storage.
    pub submissions_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Every variable has a default; nothing is required to boot a
    /// local instance.
    pub fn from_env() -> Self {
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{}", port));

        let db_path =
            env::var("RUNBOARD_DB_PATH").unwrap_or_else(|_| "data/runboard.db".to_string());

        let api_token = env::var("GAME_API_TOKEN").ok().filter(|t| !t.is_empty());

        let display_utc_offset_hours = env::var("DISPLAY_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9);

        let submissions_enabled = env::var("SUBMISSIONS_ENABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        Self {
            bind_addr,
            db_path,
            api_token,
            display_utc_offset_hours,
            submissions_enabled,
        }
    }
}
