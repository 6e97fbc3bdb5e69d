use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_storage_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            key: default_storage_key(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_storage_key() -> String {
    "adaptiq-user-progress".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            api_base: default_api_base(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_api_base() -> String {
    "https://api.anthropic.com".to_string()
}

impl AnalysisConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file means defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

fn validate(config: &Config) -> Result<()> {
    // Validate storage
    if config.storage.key.trim().is_empty() {
        anyhow::bail!("storage.key must not be empty");
    }

    // Validate server
    if config.server.bind.parse::<std::net::SocketAddr>().is_err() {
        anyhow::bail!(
            "server.bind must be a socket address like 127.0.0.1:7340, got '{}'",
            config.server.bind
        );
    }

    // Validate analysis
    if config.analysis.max_tokens == 0 {
        anyhow::bail!("analysis.max_tokens must be > 0");
    }
    if config.analysis.timeout_secs == 0 {
        anyhow::bail!("analysis.timeout_secs must be > 0");
    }

    match config.analysis.provider.as_str() {
        "disabled" | "anthropic" => {}
        other => anyhow::bail!(
            "Unknown analysis provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }

    Ok(())
}
