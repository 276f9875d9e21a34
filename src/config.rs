use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiConfig {
    /// Bearer token required for /api/* endpoints. If empty, all requests are rejected.
    #[serde(default)]
    pub token: String,
}

/// Lead management backend the tools read from and write to.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Recorded as `agentId` on every communication log entry.
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default = "default_company")]
    pub company: String,
    #[serde(default = "default_info_link")]
    pub info_link: String,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            persona: default_persona(),
            company: default_company(),
            info_link: default_info_link(),
            default_timezone: default_timezone(),
            session_timeout_secs: default_session_timeout(),
        }
    }
}

fn default_agent_id() -> String {
    "sarah-voice-agent".to_string()
}

fn default_persona() -> String {
    "Sarah".to_string()
}

fn default_company() -> String {
    "Daily Event Insurance".to_string()
}

fn default_info_link() -> String {
    "https://dailyeventinsurance.com/partners".to_string()
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

fn default_session_timeout() -> u64 {
    1800
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScriptsConfig {
    /// TOML script catalog. The compiled-in catalog is used when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file from same directory as config.toml
        let env_path = config_dir().join(".env");
        match dotenvy::from_path(&env_path) {
            Ok(()) => tracing::info!("Loaded .env from {}", env_path.display()),
            Err(dotenvy::Error::Io(_)) => {
                tracing::debug!(
                    "No .env file at {}, using environment only",
                    env_path.display()
                );
            }
            Err(e) => tracing::warn!("Failed to parse .env: {e}"),
        }

        let path = config_path();
        tracing::info!("Loading config from {}", path.display());

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            format!(
                "Failed to read config at {}: {}. Copy config.example.toml to {}",
                path.display(),
                e,
                path.display()
            )
        })?;

        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.backend.base_url = config.backend.base_url.trim_end_matches('/').to_string();

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Allow env var overrides for secrets
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("API_BASE_URL") {
            self.backend.base_url = v;
        }
        if let Some(v) = lookup("AGENT_API_KEY") {
            self.backend.api_key = v;
        }
        if let Some(v) = lookup("LEAD_LINE_API_TOKEN") {
            self.api.token = v;
        }
    }
}

fn config_dir() -> PathBuf {
    if let Ok(p) = std::env::var("LEAD_LINE_CONFIG") {
        // If pointing to a file, use its parent directory
        let path = PathBuf::from(p);
        return path.parent().map(|p| p.to_path_buf()).unwrap_or(path);
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".lead-line")
}

fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("LEAD_LINE_CONFIG") {
        return PathBuf::from(p);
    }

    config_dir().join("config.toml")
}
