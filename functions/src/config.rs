use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub admin: AdminConfig,
    pub push: PushConfig,
    pub sweep: SweepConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin of the admin dashboard, used for CORS.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Shared secret the dashboard sends as a bearer token.
    /// When unset every endpoint is open (local development only).
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Base URL of the messaging API (e.g. `https://cloud.example.com/v1`).
    /// When unset, pushes are logged instead of delivered.
    pub endpoint: Option<String>,
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Whether the background sweep worker runs on an interval.
    pub enabled: bool,
    /// Seconds between two background sweeps.
    pub interval_seconds: u64,
    /// Half-width of the reminder window around "24h before" and "1h before" start.
    pub reminder_window_minutes: i64,
    /// Events whose end is older than this many days get archived.
    pub archive_after_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for mutating function endpoints
    pub per_second: u32,
    /// Burst size for mutating function endpoints
    pub burst: u32,
}

fn parse_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let push = PushConfig {
            endpoint: non_empty("PUSH_ENDPOINT"),
            project_id: non_empty("PUSH_PROJECT_ID"),
            api_key: non_empty("PUSH_API_KEY"),
            timeout_seconds: env::var("PUSH_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        };

        if push.endpoint.is_some() && (push.project_id.is_none() || push.api_key.is_none()) {
            return Err(ConfigError::MissingEnv(
                "PUSH_PROJECT_ID and PUSH_API_KEY (required with PUSH_ENDPOINT)".to_string(),
            ));
        }

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/events.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            admin: AdminConfig {
                api_key: non_empty("ADMIN_API_KEY"),
            },
            push,
            sweep: SweepConfig {
                enabled: parse_bool("SWEEP_ENABLED", true),
                interval_seconds: env::var("SWEEP_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300u64),
                reminder_window_minutes: env::var("REMINDER_WINDOW_MINUTES")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("REMINDER_WINDOW_MINUTES".to_string()))?,
                archive_after_days: env::var("ARCHIVE_AFTER_DAYS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("ARCHIVE_AFTER_DAYS".to_string()))?,
            },
            rate_limit: RateLimitConfig {
                per_second: env::var("RATE_LIMIT_PER_SECOND")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                burst: env::var("RATE_LIMIT_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/events.db".to_string(),
                max_connections: 5,
            },
            admin: AdminConfig { api_key: None },
            push: PushConfig {
                endpoint: None,
                project_id: None,
                api_key: None,
                timeout_seconds: 10,
            },
            sweep: SweepConfig {
                enabled: true,
                interval_seconds: 300,
                reminder_window_minutes: 15,
                archive_after_days: 7,
            },
            rate_limit: RateLimitConfig {
                per_second: 2,
                burst: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        env::set_var("EVENT_FUNCTIONS_TEST_FLAG", "Yes");
        assert!(parse_bool("EVENT_FUNCTIONS_TEST_FLAG", false));
        env::set_var("EVENT_FUNCTIONS_TEST_FLAG", "0");
        assert!(!parse_bool("EVENT_FUNCTIONS_TEST_FLAG", true));
        env::set_var("EVENT_FUNCTIONS_TEST_FLAG", "maybe");
        assert!(parse_bool("EVENT_FUNCTIONS_TEST_FLAG", true));
        env::remove_var("EVENT_FUNCTIONS_TEST_FLAG");
        assert!(!parse_bool("EVENT_FUNCTIONS_TEST_FLAG", false));
    }

    #[test]
    fn blank_values_count_as_unset() {
        env::set_var("EVENT_FUNCTIONS_TEST_KEY", "   ");
        assert_eq!(non_empty("EVENT_FUNCTIONS_TEST_KEY"), None);
        env::set_var("EVENT_FUNCTIONS_TEST_KEY", "abc");
        assert_eq!(
            non_empty("EVENT_FUNCTIONS_TEST_KEY").as_deref(),
            Some("abc")
        );
        env::remove_var("EVENT_FUNCTIONS_TEST_KEY");
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.sweep.reminder_window_minutes, 15);
        assert_eq!(config.sweep.archive_after_days, 7);
        assert!(config.admin.api_key.is_none());
        assert!(config.push.endpoint.is_none());
    }
}
