//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (per-range API tokens, the Sheets access token) are referenced
//! by env-var name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::types::RangeSpec;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub sheets: SheetsConfig,
    pub pacing: PacingConfig,
    pub scraper: ScraperConfig,
    pub pricing: PricingConfig,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    pub ranges: Vec<RangeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    /// Spreadsheet holding every range's listing table.
    pub spreadsheet_id: String,
    /// Env var carrying the OAuth bearer token for the Sheets API.
    pub access_token_env: String,
}

/// Traffic-shaping pause between ranges. Wide on purpose: the spread hides
/// any detectable request cadence from the marketplace.
#[derive(Debug, Deserialize, Clone)]
pub struct PacingConfig {
    #[serde(default = "default_min_pause_secs")]
    pub min_pause_secs: u64,
    #[serde(default = "default_max_pause_secs")]
    pub max_pause_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperConfig {
    /// Seconds to wait for a product page to render its offer block.
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    /// Randomized delay window between product pages, in seconds.
    #[serde(default = "default_min_page_delay_secs")]
    pub min_page_delay_secs: u64,
    #[serde(default = "default_max_page_delay_secs")]
    pub max_page_delay_secs: u64,
    /// Seller names excluded from the competitor pool (our own storefronts).
    #[serde(default)]
    pub exclude_sellers: Vec<String>,
    /// User agents rotated per browser session.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    /// When true, submission payloads are logged instead of sent.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_snapshot_dir")]
    pub dir: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_snapshot_dir(),
        }
    }
}

/// One seller range: a named slice of the listing table plus the env var
/// holding its marketplace API token.
#[derive(Debug, Deserialize, Clone)]
pub struct RangeConfig {
    pub name: String,
    pub sheet_range: String,
    pub token_env: String,
}

fn default_min_pause_secs() -> u64 {
    25 * 60
}

fn default_max_pause_secs() -> u64 {
    40 * 60
}

fn default_page_timeout_secs() -> u64 {
    60
}

fn default_min_page_delay_secs() -> u64 {
    5
}

fn default_max_page_delay_secs() -> u64 {
    10
}

fn default_snapshot_dir() -> String {
    "report".to_string()
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.ranges.is_empty(), "No ranges configured");
        anyhow::ensure!(
            self.pacing.min_pause_secs <= self.pacing.max_pause_secs,
            "pacing.min_pause_secs must not exceed pacing.max_pause_secs"
        );
        anyhow::ensure!(
            self.scraper.min_page_delay_secs <= self.scraper.max_page_delay_secs,
            "scraper.min_page_delay_secs must not exceed scraper.max_page_delay_secs"
        );
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Build the ordered list of range specs, resolving each API token from
    /// the environment. Fails fast at startup if any token is missing.
    pub fn range_specs(&self) -> Result<Vec<RangeSpec>> {
        self.ranges
            .iter()
            .map(|r| {
                let token = Self::resolve_env(&r.token_env)
                    .with_context(|| format!("API token for range '{}'", r.name))?;
                Ok(RangeSpec {
                    range_name: r.name.clone(),
                    sheet_range: r.sheet_range.clone(),
                    api_token: SecretString::new(token),
                })
            })
            .collect()
    }

    /// The Sheets API bearer token, resolved from the environment.
    pub fn sheets_token(&self) -> Result<SecretString> {
        Ok(SecretString::new(Self::resolve_env(
            &self.sheets.access_token_env,
        )?))
    }
}
