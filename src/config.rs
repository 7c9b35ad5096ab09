use crate::aggregate::ProductFilter;
use crate::constants;
use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a pipeline run needs. Defaults are the fixed Makro setup; a
/// TOML file may override any field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub urls: Vec<String>,
    pub results_dir: PathBuf,
    pub filter: ProductFilter,
    pub layout: PageLayout,
    pub http: HttpConfig,
    pub plot: PlotConfig,
}

/// CSS selectors locating product cards and their name/price elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayout {
    pub card: String,
    pub name: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            urls: constants::DEFAULT_URLS.iter().map(|u| u.to_string()).collect(),
            results_dir: PathBuf::from(constants::RESULTS_DIR),
            filter: ProductFilter::Categories(
                constants::DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            ),
            layout: PageLayout::default(),
            http: HttpConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            card: constants::CARD_SELECTOR.to_string(),
            name: constants::NAME_SELECTOR.to_string(),
            price: constants::PRICE_SELECTOR.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: constants::DEFAULT_TIMEOUT_SECONDS,
            user_agent: constants::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: constants::DEFAULT_PLOT_WIDTH,
            height: constants::DEFAULT_PLOT_HEIGHT,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Like [`Config::load`], but a missing file means the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_seconds == 0 {
            return Err(TrackerError::Config("http.timeout_seconds must be positive".into()));
        }
        if self.plot.width == 0 || self.plot.height == 0 {
            return Err(TrackerError::Config("plot dimensions must be positive".into()));
        }
        if let Some(url) = self.urls.iter().find(|u| u.trim().is_empty()) {
            return Err(TrackerError::Config(format!("invalid empty url entry: {url:?}")));
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.results_dir.join(constants::STORE_FILE)
    }

    pub fn grouped_path(&self) -> PathBuf {
        self.results_dir.join(constants::GROUPED_FILE)
    }

    pub fn gallery_path(&self) -> PathBuf {
        self.results_dir.join(constants::GALLERY_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.results_dir.join(constants::RUN_SUMMARY_FILE)
    }
}
