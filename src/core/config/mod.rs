use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::core::activity::{ActivityConfig, ProjectRef};
use crate::core::layout::LayoutConfig;
use crate::core::scrobble::ScrobbleConfig;

pub const LASTFM_API_KEY_VAR: &str = "HOMEFEED_LASTFM_API_KEY";

#[derive(Debug, Clone, Default)]
pub struct ConfigService;

impl ConfigService {
    pub fn name(&self) -> &'static str {
        "config"
    }

    pub fn status(&self) -> &'static str {
        "ready"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    pub scrobble: Option<ScrobbleConfig>,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub projects: Vec<ProjectRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

/// One feed widget: where to fetch from and how to render each entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub force_https: bool,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_layout_template")]
    pub layout_template: String,
    pub entry_template: String,
    pub category_base_url: Option<String>,
    #[serde(default)]
    pub max_retries: usize,
}

fn default_limit() -> usize {
    5
}

fn default_date_format() -> String {
    "%B %e".to_string()
}

fn default_layout_template() -> String {
    "<div class='feed-container'>{entries}</div>".to_string()
}

impl FeedConfig {
    /// The URL to fetch, with an http scheme upgraded to https when the feed
    /// asks for it. Mixed-content feeds on https pages need the upgrade.
    pub fn fetch_url(&self) -> String {
        if self.force_https {
            if let Some(rest) = self.url.strip_prefix("http://") {
                return format!("https://{rest}");
            }
        }
        self.url.clone()
    }
}

pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let mut config: SiteConfig = toml::from_str(&raw)?;
    apply_env_overlay(&mut config);
    validate(&config)?;
    Ok(config)
}

fn apply_env_overlay(config: &mut SiteConfig) {
    if let Some(scrobble) = config.scrobble.as_mut() {
        if scrobble.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var(LASTFM_API_KEY_VAR) {
                scrobble.api_key = key;
            }
        }
    }
}

fn validate(config: &SiteConfig) -> Result<(), ConfigError> {
    let mut seen_names = std::collections::HashSet::new();
    for feed in &config.feeds {
        if feed.name.trim().is_empty() {
            return Err(ConfigError::Invalid("feed name must not be empty".into()));
        }
        if !seen_names.insert(feed.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate feed name: {}",
                feed.name
            )));
        }
        if feed.url.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "feed {} must have a url",
                feed.name
            )));
        }
        if feed.limit == 0 {
            return Err(ConfigError::Invalid(format!(
                "feed {} must have a positive entry limit",
                feed.name
            )));
        }
        if !feed.layout_template.contains("{entries}") {
            return Err(ConfigError::Invalid(format!(
                "feed {} layout template is missing the {{entries}} slot",
                feed.name
            )));
        }
        if feed.entry_template.contains("{categories}") && feed.category_base_url.is_none() {
            return Err(ConfigError::Invalid(format!(
                "feed {} uses {{categories}} but has no category_base_url",
                feed.name
            )));
        }
        validate_date_format(&feed.name, &feed.date_format)?;
    }
    if config.layout.padding_divisor <= 0.0 || config.layout.margin_divisor <= 0.0 {
        return Err(ConfigError::Invalid(
            "layout divisors must be positive".into(),
        ));
    }
    if let Some(scrobble) = &config.scrobble {
        if scrobble.user.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "scrobble user must not be empty".into(),
            ));
        }
        if scrobble.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "scrobble api_key is empty and {LASTFM_API_KEY_VAR} is not set"
            )));
        }
    }
    Ok(())
}

/// Reject strftime strings chrono cannot format. An invalid specifier would
/// otherwise only surface as a panic at render time.
fn validate_date_format(feed_name: &str, format: &str) -> Result<(), ConfigError> {
    let has_error = StrftimeItems::new(format).any(|item| matches!(item, Item::Error));
    if has_error {
        return Err(ConfigError::Invalid(format!(
            "feed {feed_name} has an invalid date format: {format}"
        )));
    }
    Ok(())
}
