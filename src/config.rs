use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::store::StoreConfig;

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("HABITLOG_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HABITLOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        // Conventional Supabase variables win over the file
        if let Ok(url) = env::var("SUPABASE_URL") {
            config.store.supabase.url = url;
        }
        if let Some(key) = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .or_else(|| env::var("SUPABASE_KEY").ok())
        {
            config.store.supabase.service_key = key;
        }
        if let Ok(port) = env::var("PORT") {
            config.server.port = port
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid PORT: {}", port))?;
        }

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        Ok(config)
    }

    /// Validate the store section into the runtime store configuration.
    pub fn store_runtime(&self) -> Result<StoreConfig> {
        self.store.to_runtime()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackendKind,
    pub supabase: SupabaseSection,
}

impl StoreSection {
    pub fn to_runtime(&self) -> Result<StoreConfig> {
        match self.backend {
            // Data would vanish on restart; release builds always need Supabase
            StoreBackendKind::Memory if cfg!(debug_assertions) => Ok(StoreConfig::Memory),
            StoreBackendKind::Memory => {
                bail!("the memory store backend is only available in debug builds")
            }
            StoreBackendKind::Supabase => {
                let supabase = &self.supabase;

                let mut missing = Vec::new();
                if supabase.url.trim().is_empty() {
                    missing.push("SUPABASE_URL");
                }
                if supabase.service_key.trim().is_empty() {
                    missing.push("SUPABASE_SERVICE_ROLE_KEY");
                }
                if !missing.is_empty() {
                    bail!(
                        "missing required Supabase configuration: {}",
                        missing.join(", ")
                    );
                }

                let url = supabase.url.trim();
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    bail!("SUPABASE_URL must be an http(s) URL, got '{}'", url);
                }
                if supabase.timeout_secs == 0 {
                    bail!("store.supabase.timeout_secs must be greater than zero");
                }

                let schema = match supabase.schema.trim() {
                    "" => "public".to_string(),
                    s => s.to_string(),
                };

                Ok(StoreConfig::Supabase {
                    url: url.to_string(),
                    service_key: supabase.service_key.trim().to_string(),
                    schema,
                    timeout: Duration::from_secs(supabase.timeout_secs),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    #[default]
    Supabase,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupabaseSection {
    pub url: String,
    pub service_key: String,
    pub schema: String,
    pub timeout_secs: u64,
}

impl Default for SupabaseSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            schema: "public".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
