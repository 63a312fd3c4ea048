use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".worktracker";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_REPORT_TIME: &str = "02:00";
const DEFAULT_AI_ENDPOINT: &str = "https://api.openai.com/v1/responses";
const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";

pub const API_KEY_ENV: &str = "WORKTRACKER_AI_API_KEY";
pub const CRON_SECRET_ENV: &str = "WORKTRACKER_CRON_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    pub report_time: String,
    pub ai_endpoint: String,
    pub ai_model: String,
    pub ai_api_key: Option<String>,
    pub ai_timeout_seconds: u64,
    pub cron_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_root_dir().join("db").join("worktracker.db"),
            api_port: 7180,
            report_time: DEFAULT_REPORT_TIME.to_string(),
            ai_endpoint: DEFAULT_AI_ENDPOINT.to_string(),
            ai_model: DEFAULT_AI_MODEL.to_string(),
            ai_api_key: None,
            ai_timeout_seconds: 30,
            cron_secret: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn load_or_default() -> Result<Self> {
        Self::load().or_else(|_| {
            let config = Self::default();
            config.ensure_bootstrap_dirs()?;
            config.save()?;
            Ok(config)
        })
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_dirs(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    /// API key with the environment override taking precedence over the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.ai_api_key
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }

    /// Shared trigger secret with the environment override taking precedence.
    pub fn resolve_cron_secret(&self) -> Option<String> {
        std::env::var(CRON_SECRET_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.cron_secret
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }

    pub fn parse_report_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.report_time)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "report_time" => {
                parse_hhmm(value)?;
                self.report_time = value.to_string();
            }
            "ai_endpoint" => {
                self.ai_endpoint = value.trim().trim_end_matches('/').to_string();
            }
            "ai_model" => {
                self.ai_model = value.trim().to_string();
            }
            "ai_api_key" => {
                self.ai_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "ai_timeout_seconds" => {
                self.ai_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("ai_timeout_seconds must be a number"))?
                    .max(5);
            }
            "cron_secret" => {
                self.cron_secret = (!value.trim().is_empty()).then_some(value.to_string());
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, api_port|api.port, report_time|report.time, ai_endpoint|ai.endpoint, ai_model|ai.model, ai_api_key|ai.api_key, ai_timeout_seconds|ai.timeout_seconds, cron_secret|cron.secret"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "report_time" => Some(self.report_time.clone()),
            "ai_endpoint" => Some(self.ai_endpoint.clone()),
            "ai_model" => Some(self.ai_model.clone()),
            "ai_api_key" => Some(
                self.ai_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "ai_timeout_seconds" => Some(self.ai_timeout_seconds.to_string()),
            "cron_secret" => Some(
                self.cron_secret
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "report_time" | "report.time" => "report_time",
        "ai_endpoint" | "ai.endpoint" => "ai_endpoint",
        "ai_model" | "ai.model" => "ai_model",
        "ai_api_key" | "ai.api_key" => "ai_api_key",
        "ai_timeout_seconds" | "ai.timeout_seconds" => "ai_timeout_seconds",
        "cron_secret" | "cron.secret" => "cron_secret",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 02:00 (24-hour format)"))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
