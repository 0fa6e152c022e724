use std::env;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub db_max_connections: u32,
    /// Seconds between usage audits; 0 disables the periodic audit
    pub audit_interval_secs: u64,
    /// Whether the audit rewrites drifted in_use flags or only reports them
    pub audit_repair: bool,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            db_path: get_env("DB_PATH", "assets.db"),
            db_max_connections: get_env("DB_MAX_CONNECTIONS", "5")
                .parse()
                .unwrap_or(5),
            audit_interval_secs: get_env("AUDIT_INTERVAL_SECS", "300")
                .parse()
                .unwrap_or(300),
            audit_repair: parse_bool(&get_env("AUDIT_REPAIR", "true")),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
