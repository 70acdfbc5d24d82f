use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub api_timeout_secs: u64,
    pub autosave_debounce_ms: u64,
    pub tick_interval_ms: u64,
    pub sync_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            api_timeout_secs: 10,
            autosave_debounce_ms: 3000,
            tick_interval_ms: 1000,
            sync_interval_secs: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            // Fallback to current directory .env for backward compatibility
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            // Load base config from TOML file
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;
        let defaults = Config::default();

        let api_base_url = settings
            .get_string("exam_api.base_url")
            .or_else(|_| env::var("EXAM_API_URL"))
            .unwrap_or(defaults.api_base_url);

        let api_timeout_secs = settings
            .get_int("exam_api.timeout_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.api_timeout_secs);

        let autosave_debounce_ms = settings
            .get_int("session.autosave_debounce_ms")
            .ok()
            .or_else(|| {
                env::var("AUTOSAVE_DEBOUNCE_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.autosave_debounce_ms);

        let tick_interval_ms = settings
            .get_int("session.tick_interval_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.tick_interval_ms);

        let sync_interval_secs = settings
            .get_int("session.sync_interval_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.sync_interval_secs);

        Ok(Config {
            api_base_url,
            api_timeout_secs,
            autosave_debounce_ms,
            tick_interval_ms,
            sync_interval_secs,
        })
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}
