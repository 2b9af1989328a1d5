use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.beads-fleet/config.toml`.
///
/// Every section is optional; missing keys fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl Config {
    /// Load config from the default path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_qa_rounds == 0 {
            return Err(ConfigError::Validation(
                "pipeline.max_qa_rounds must be at least 1".into(),
            ));
        }
        if self.agent.log_tail_bytes == 0 {
            return Err(ConfigError::Validation(
                "agent.log_tail_bytes must be greater than 0".into(),
            ));
        }
        if self.agent.binary.trim().is_empty() {
            return Err(ConfigError::Validation("agent.binary must not be empty".into()));
        }
        if self.tracker.binary.trim().is_empty() {
            return Err(ConfigError::Validation("tracker.binary must not be empty".into()));
        }
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".beads-fleet")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Shared repository holding the epics and the workflow instructions.
    #[serde(default = "default_factory_repo")]
    pub factory_repo: PathBuf,
    #[serde(default = "default_factory_repo_name")]
    pub factory_repo_name: String,
    /// Parent directory of the per-app repositories.
    #[serde(default = "default_apps_root")]
    pub apps_root: PathBuf,
    /// QA passes allowed before an epic is flagged for human review.
    #[serde(default = "default_max_qa_rounds")]
    pub max_qa_rounds: u32,
}

impl PipelineConfig {
    /// Working directory for a per-app agent.
    pub fn app_repo(&self, app_name: &str) -> PathBuf {
        self.apps_root.join(app_name)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            factory_repo: default_factory_repo(),
            factory_repo_name: default_factory_repo_name(),
            apps_root: default_apps_root(),
            max_qa_rounds: default_max_qa_rounds(),
        }
    }
}

fn default_apps_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dev")
        .join("claude_projects")
}
fn default_factory_repo_name() -> String {
    "cycle-apps-factory".into()
}
fn default_factory_repo() -> PathBuf {
    default_apps_root().join(default_factory_repo_name())
}
fn default_max_qa_rounds() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Worker executable. `CLAUDE_BIN` overrides it at runtime.
    #[serde(default = "default_agent_binary")]
    pub binary: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_max_turns")]
    pub default_max_turns: u32,
    #[serde(default = "default_allowed_tools")]
    pub default_allowed_tools: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_log_tail_bytes")]
    pub log_tail_bytes: u64,
    /// Prepended to `PATH` in the worker's environment.
    #[serde(default)]
    pub extra_path: Option<String>,
}

impl AgentConfig {
    /// The worker binary after applying the `CLAUDE_BIN` override.
    pub fn resolved_binary(&self) -> String {
        std::env::var("CLAUDE_BIN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.binary.clone())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: default_agent_binary(),
            log_dir: default_log_dir(),
            default_model: default_model(),
            default_max_turns: default_max_turns(),
            default_allowed_tools: default_allowed_tools(),
            output_format: default_output_format(),
            log_tail_bytes: default_log_tail_bytes(),
            extra_path: None,
        }
    }
}

fn default_agent_binary() -> String {
    "claude".into()
}
fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("beads-web-agent-logs")
}
fn default_model() -> String {
    "sonnet".into()
}
fn default_max_turns() -> u32 {
    200
}
fn default_allowed_tools() -> String {
    "Bash,Read,Write,Edit,Glob,Grep".into()
}
fn default_output_format() -> String {
    "stream-json".into()
}
fn default_log_tail_bytes() -> u64 {
    8192
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_tracker_binary")]
    pub binary: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            binary: default_tracker_binary(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_tracker_binary() -> String {
    "bd".into()
}
fn default_cache_ttl_secs() -> u64 {
    10
}
