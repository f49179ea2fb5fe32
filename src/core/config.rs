use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Where transaction rows come from. At least one of the two must be
/// set; a local CSV snapshot wins over the live sheet when both are.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SourceConfig {
    /// Published-CSV export URL of the Google Sheet.
    pub sheet_url: Option<String>,
    /// Path to a local CSV file with the same column layout.
    pub csv_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub exchange_rate: Option<ExchangeRateProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            exchange_rate: Some(ExchangeRateProviderConfig {
                base_url: "https://api.exchangerate-api.com".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub source: SourceConfig,
    /// Reporting currency all outputs are expressed in.
    pub currency: String,
    /// Manual current values per ticker, in the reporting currency,
    /// for instruments with no market price feed.
    #[serde(default)]
    pub overrides: HashMap<String, f64>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "folio", "folio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        if config.source.sheet_url.is_none() && config.source.csv_path.is_none() {
            bail!("Config must set source.sheet_url or source.csv_path");
        }
        if config.currency.trim().is_empty() {
            bail!("Config must set a reporting currency");
        }
        debug!("Successfully loaded config");
        Ok(config)
    }
}
