//! Server configuration, loaded from environment variables at startup.

/// Runtime configuration for taskmate-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://taskmate.db"`).
    /// `"sqlite::memory:"` keeps everything in process.
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for daily-rotated log files. Logs go to stdout only when unset.
    pub log_dir: Option<String>,

    /// Comma-separated list of allowed CORS origins. `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// Trailing conversation messages consulted per chat turn.
    pub history_window: usize,

    /// OpenAI-compatible chat-completions endpoint used when the rule
    /// classifier cannot recognise an utterance. No fallback when unset.
    pub oracle_url: Option<String>,

    pub oracle_model: String,

    pub oracle_api_key: Option<String>,

    /// Per-request timeout for the oracle, in seconds.
    pub oracle_timeout_secs: u64,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("TASKMATE_BIND", "0.0.0.0:3000"),
            database_url: env_or("TASKMATE_DATABASE_URL", "sqlite://taskmate.db"),
            log_level: env_or("TASKMATE_LOG", "info"),
            log_json: env_flag("TASKMATE_LOG_JSON", false),
            log_dir: env_opt("TASKMATE_LOG_DIR"),
            cors_allowed_origins: env_opt("TASKMATE_CORS_ORIGINS"),
            enable_swagger: env_flag("TASKMATE_ENABLE_SWAGGER", true),
            history_window: parse_env("TASKMATE_HISTORY_WINDOW", 20),
            oracle_url: env_opt("TASKMATE_ORACLE_URL"),
            oracle_model: env_or("TASKMATE_ORACLE_MODEL", "gpt-4o"),
            oracle_api_key: env_opt("TASKMATE_ORACLE_API_KEY"),
            oracle_timeout_secs: parse_env("TASKMATE_ORACLE_TIMEOUT_SECS", 30),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            database_url: "sqlite::memory:".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: None,
            enable_swagger: true,
            history_window: 20,
            oracle_url: None,
            oracle_model: "gpt-4o".to_owned(),
            oracle_api_key: None,
            oracle_timeout_secs: 30,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
