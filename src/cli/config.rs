//! Configuration management for careline
//!
//! Provides TOML-based configuration with defaults, environment overrides
//! and validation.
//! Location: ~/.careline/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::errors::{CareError, Result};

/// Placeholder values shipped in sample `.env` files
const PLACEHOLDER_KEYS: &[&str] = &["", "your_key_here", "your_groq_key_here"];

/// Complete configuration for careline
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub paths: PathsConfig,
    pub emergency: EmergencyConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,

    /// Deployment environment (from CARELINE_ENV)
    #[serde(skip)]
    pub environment: Environment,

    /// Groq API key (from GROQ_API_KEY, never written to disk)
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// Language model connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// File system paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub records_file: String,
    pub session_dir: String,
    pub alert_history_file: String,
}

/// Emergency detection and alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyConfig {
    /// Minimum urgency that raises an alert
    pub urgency_threshold: u8,
    pub auto_alert: bool,
    pub keywords: Vec<String>,
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Turns kept per patient before the oldest are evicted
    pub max_turns: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// Deployment environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse an environment name, falling back to development
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }
}

/// Default emergency keyword list used by the classifier fast-path
pub fn default_emergency_keywords() -> Vec<String> {
    [
        "chest pain",
        "heart attack",
        "shortness of breath",
        "difficulty breathing",
        "severe headache",
        "stroke",
        "unconscious",
        "bleeding heavily",
        "severe allergic reaction",
        "suicide",
        "overdose",
        "can't breathe",
        "severe pain",
        "emergency",
        "911",
        "ambulance",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.0,
            max_tokens: 1000,
            timeout_secs: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            records_file: "~/.careline/records.json".to_string(),
            session_dir: "~/.careline/sessions".to_string(),
            alert_history_file: "~/.careline/alert_history.json".to_string(),
        }
    }
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            urgency_threshold: 7,
            auto_alert: true,
            keywords: default_emergency_keywords(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_turns: 50 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults, then apply the
    /// process environment (including `.env`)
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = if let Some(config_path) = path {
            Self::load_from_file(&config_path)?
        } else {
            Self::load_default()?
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CareError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| CareError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".careline").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Apply environment overrides through `lookup`
    ///
    /// Recognised: GROQ_API_KEY, CARELINE_MODEL, CARELINE_ENV, CARELINE_LOG.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key = lookup("GROQ_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !PLACEHOLDER_KEYS.contains(&k.as_str()));

        if let Some(model) = lookup("CARELINE_MODEL").filter(|m| !m.trim().is_empty()) {
            self.llm.model = model.trim().to_string();
        }

        if let Some(level) = lookup("CARELINE_LOG").filter(|l| !l.trim().is_empty()) {
            self.logging.level = level.trim().to_string();
        }

        if let Some(env) = lookup("CARELINE_ENV") {
            self.environment = Environment::parse(&env);
        }
        self.apply_environment_preset();
    }

    fn apply_environment_preset(&mut self) {
        match self.environment {
            Environment::Production => {
                self.llm.temperature = 0.0;
                self.emergency.auto_alert = true;
            }
            Environment::Development => {
                self.llm.temperature = 0.1;
            }
            Environment::Testing => {
                if let Some(parent) = Path::new(&self.paths.records_file).parent() {
                    self.paths.records_file = parent
                        .join("test_records.json")
                        .to_string_lossy()
                        .into_owned();
                }
                self.emergency.auto_alert = false;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(CareError::Config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(CareError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.emergency.urgency_threshold > 10 {
            return Err(CareError::Config(format!(
                "urgency_threshold must be between 0 and 10, got {}",
                self.emergency.urgency_threshold
            )));
        }

        if self.memory.max_turns == 0 {
            return Err(CareError::Config(
                "max_turns must be greater than 0".to_string(),
            ));
        }

        crate::logger::parse_level(&self.logging.level)?;

        Ok(())
    }

    /// Non-fatal configuration issues worth reporting to the operator
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.api_key.is_none() {
            issues.push("Groq API key not configured (running in offline mode)".to_string());
        }

        let records = self.records_file();
        if !records.exists() {
            issues.push(format!("Records file not found: {}", records.display()));
        }

        if self.environment == Environment::Production && !self.emergency.auto_alert {
            issues.push("Automatic emergency alerts disabled in production".to_string());
        }

        issues
    }

    /// Label/value pairs describing the effective configuration
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Environment", self.environment.as_str().to_string()),
            ("Model", self.llm.model.clone()),
            ("LLM endpoint", self.llm.base_url.clone()),
            ("Temperature", format!("{:.1}", self.llm.temperature)),
            (
                "API key",
                if self.api_key.is_some() { "configured" } else { "not configured" }.to_string(),
            ),
            ("Records file", self.records_file().display().to_string()),
            ("Session dir", self.session_dir().display().to_string()),
            ("Alert history", self.alert_history_file().display().to_string()),
            ("Alert threshold", format!("{}/10", self.emergency.urgency_threshold)),
            (
                "Auto alerts",
                if self.emergency.auto_alert { "enabled" } else { "disabled" }.to_string(),
            ),
        ]
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CareError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CareError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CareError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn records_file(&self) -> PathBuf {
        Self::expand_path(&self.paths.records_file)
    }

    pub fn session_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.session_dir)
    }

    pub fn alert_history_file(&self) -> PathBuf {
        Self::expand_path(&self.paths.alert_history_file)
    }
}
