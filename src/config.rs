use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub name: String,
    pub well_known_url: String,
    pub username: String,
    pub password_command: String,
}

#[derive(Debug)]
pub struct StatsConfig {
    /// Senders per page served by get_sender_stats when the caller gives no
    /// limit, and rows printed by the one-shot report.
    pub page_size: u32,
    /// Default preview count for get_previews.
    pub preview_limit: u32,
    /// Messages requested per listing page while scanning.
    pub scan_page_size: u32,
    /// Fallback folder-name match when an account exposes no inbox role.
    pub inbox_regex: String,
}

#[derive(Debug)]
pub struct Config {
    pub accounts: Vec<AccountConfig>,
    pub stats: StatsConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config file: {}", e),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    stats: RawStatsConfig,
    #[serde(default)]
    account: BTreeMap<String, RawAccountFields>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStatsConfig {
    #[serde(default = "default_page_size")]
    page_size: u32,
    #[serde(default = "default_preview_limit")]
    preview_limit: u32,
    #[serde(default = "default_scan_page_size")]
    scan_page_size: u32,
    #[serde(default = "default_inbox_regex")]
    inbox_regex: String,
}

impl Default for RawStatsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            preview_limit: default_preview_limit(),
            scan_page_size: default_scan_page_size(),
            inbox_regex: default_inbox_regex(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAccountFields {
    well_known_url: Option<String>,
    username: Option<String>,
    password_command: Option<String>,
}

fn default_page_size() -> u32 {
    50
}

fn default_preview_limit() -> u32 {
    10
}

fn default_scan_page_size() -> u32 {
    100
}

fn default_inbox_regex() -> String {
    "^INBOX$".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Regex::new(&raw.stats.inbox_regex).map_err(|e| {
            ConfigError::Parse(format!(
                "invalid regex '{}' for inbox_regex: {}",
                raw.stats.inbox_regex, e
            ))
        })?;

        if raw.stats.page_size == 0 {
            return Err(ConfigError::Parse(
                "page_size must be greater than 0".to_string(),
            ));
        }
        if raw.stats.scan_page_size == 0 {
            return Err(ConfigError::Parse(
                "scan_page_size must be greater than 0".to_string(),
            ));
        }

        let mut accounts = Vec::new();
        for (name, account) in raw.account {
            let account_name = name.clone();
            accounts.push(AccountConfig {
                name,
                well_known_url: require_field(
                    account.well_known_url,
                    &format!("missing well_known_url in [account.{}]", account_name),
                )?,
                username: require_field(
                    account.username,
                    &format!("missing username in [account.{}]", account_name),
                )?,
                password_command: require_field(
                    account.password_command,
                    &format!("missing password_command in [account.{}]", account_name),
                )?,
            });
        }

        if accounts.is_empty() {
            return Err(ConfigError::Parse(
                "at least one [account.NAME] section is required".to_string(),
            ));
        }

        Ok(Config {
            accounts,
            stats: StatsConfig {
                page_size: raw.stats.page_size,
                preview_limit: raw.stats.preview_limit,
                scan_page_size: raw.stats.scan_page_size,
                inbox_regex: raw.stats.inbox_regex,
            },
        })
    }
}

fn require_field(value: Option<String>, err: &str) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::Parse(err.to_string()))
}
