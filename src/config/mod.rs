use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use url::Url;

pub mod selectors;

pub use selectors::{ReviewerIdSource, SelectorSet};

use crate::logging::LoggingConfig;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraping: ScrapingConfig,
    pub selectors: SelectorSet,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
    /// Target identifiers processed by `run` when none are given on the command line
    pub targets: Vec<String>,
}

/// Which page capability drives the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Headless Chromium through Playwright (requires the `browser` feature)
    Browser,
    /// Plain HTTP fetch plus HTML parsing; no client-side interaction
    Static,
}

impl Default for Backend {
    /// The browser when it is compiled in, plain HTTP otherwise
    fn default() -> Self {
        if cfg!(feature = "browser") {
            Backend::Browser
        } else {
            Backend::Static
        }
    }
}

/// How coordinated items are read off a product page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateMode {
    /// Click each carousel item and re-read the shared detail pane
    Carousel,
    /// Derive each item's product id and load its own page
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub base_url: String,
    /// Product page path, `{id}` is replaced by the target identifier
    pub product_path: String,
    /// Listing page path used by product discovery, `{page}` is the page number
    pub listing_path: String,
    pub backend: Backend,
    pub coordinate_mode: CoordinateMode,
    pub include_reviews: bool,
    pub workers: usize,
    pub page_load_timeout_seconds: u64,
    pub element_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub auto_scroll: bool,
    /// Pause between handing targets to pooled workers
    pub dispatch_delay_ms: u64,
    /// Minimum interval between two navigations to the same host
    pub request_delay_ms: u64,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub disable_images: bool,
    pub disable_css: bool,
    pub user_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub json_path: PathBuf,
    pub sheet_path: PathBuf,
    /// Also write one pretty JSON file per product into this directory
    pub per_product_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraping: ScrapingConfig::default(),
            selectors: SelectorSet::default(),
            export: ExportConfig::default(),
            logging: LoggingConfig {
                log_directory: get_data_directory().join("logs"),
                ..LoggingConfig::default()
            },
            targets: Vec::new(),
        }
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://shop.adidas.jp".to_string(),
            product_path: "products/{id}/".to_string(),
            listing_path: "item/?order=11&gender=mens&limit=100&page={page}".to_string(),
            backend: Backend::default(),
            coordinate_mode: CoordinateMode::Carousel,
            include_reviews: true,
            workers: 1,
            page_load_timeout_seconds: 30,
            element_timeout_ms: 3000,
            poll_interval_ms: 250,
            settle_delay_ms: 1000,
            auto_scroll: true,
            dispatch_delay_ms: 500,
            request_delay_ms: 0,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            disable_images: false,
            disable_css: false,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            json_path: PathBuf::from("dist/json/products.json"),
            sheet_path: PathBuf::from("dist/sheets/products.xml"),
            per_product_dir: None,
        }
    }
}

impl ScrapingConfig {
    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid base_url '{}': {}", self.base_url, e))
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_seconds)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn dispatch_delay(&self) -> Duration {
        Duration::from_millis(self.dispatch_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from default locations
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path();

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            info!("No configuration file found, using defaults");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from specific file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: AppConfig = toml::from_str(&content)?;

        config.validate()?;

        info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    /// Save configuration to the given path, or the default location
    pub async fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&config_path, content).await?;

        info!("Configuration saved to: {}", config_path.display());
        Ok(config_path)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let base = self.scraping.base()?;
        if base.cannot_be_a_base() {
            return Err(anyhow::anyhow!("base_url must be an absolute http(s) address"));
        }

        if !self.scraping.product_path.contains("{id}") {
            return Err(anyhow::anyhow!("product_path must contain the {{id}} placeholder"));
        }

        if self.scraping.workers == 0 {
            return Err(anyhow::anyhow!("Scraping workers must be > 0"));
        }

        if self.scraping.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Scraping poll_interval_ms must be > 0"));
        }

        if self.scraping.user_agents.is_empty() {
            return Err(anyhow::anyhow!("At least one user agent must be configured"));
        }

        for (name, selector) in self.selectors.required() {
            if selector.trim().is_empty() {
                return Err(anyhow::anyhow!("Selector '{}' must not be empty", name));
            }
        }

        Ok(())
    }
}

/// Get the default data directory
fn get_data_directory() -> PathBuf {
    directories::ProjectDirs::from("com", "shopscrape", "shopscrape")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("data"))
}

/// Get the configuration file path
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "shopscrape", "shopscrape")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from(config: &mut AppConfig, var: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = var("SHOPSCRAPE_BASE_URL") {
            config.scraping.base_url = base_url;
        }

        if let Some(workers) = var("SHOPSCRAPE_WORKERS").and_then(|v| v.parse::<usize>().ok()) {
            config.scraping.workers = workers;
        }

        if let Some(backend) = var("SHOPSCRAPE_BACKEND") {
            match backend.to_lowercase().as_str() {
                "browser" => config.scraping.backend = Backend::Browser,
                "static" => config.scraping.backend = Backend::Static,
                _ => {}
            }
        }

        if let Some(headless) = var("SHOPSCRAPE_HEADLESS") {
            config.scraping.headless = headless.to_lowercase() == "true";
        }

        if let Some(path) = var("SHOPSCRAPE_JSON_PATH") {
            config.export.json_path = PathBuf::from(path);
        }

        if let Some(path) = var("SHOPSCRAPE_SHEET_PATH") {
            config.export.sheet_path = PathBuf::from(path);
        }

        if let Some(log_level) = var("SHOPSCRAPE_LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scraping.coordinate_mode, CoordinateMode::Carousel);
        assert_eq!(config.scraping.workers, 1);
    }

    #[test]
    fn test_default_backend_is_one_this_build_can_start() {
        let backend = AppConfig::default().scraping.backend;
        if cfg!(feature = "browser") {
            assert_eq!(backend, Backend::Browser);
        } else {
            assert_eq!(backend, Backend::Static);
        }

        let config: AppConfig = toml::from_str("[scraping]\nworkers = 2\n").unwrap();
        assert_eq!(config.scraping.backend, backend);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.scraping.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scraping.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scraping.product_path = "products/".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.selectors.product.name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.targets = vec!["IE3439".to_string(), "IF9280".to_string()];
        config.scraping.coordinate_mode = CoordinateMode::Direct;
        config.save(Some(&path)).await.unwrap();

        let loaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.targets, config.targets);
        assert_eq!(loaded.scraping.coordinate_mode, CoordinateMode::Direct);
        assert_eq!(loaded.selectors, config.selectors);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            targets = ["IE3439"]

            [scraping]
            backend = "static"
            workers = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.scraping.backend, Backend::Static);
        assert_eq!(config.scraping.workers, 4);
        assert_eq!(config.scraping.base_url, "https://shop.adidas.jp");
        assert_eq!(config.export.json_path, PathBuf::from("dist/json/products.json"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SHOPSCRAPE_WORKERS", "3"),
            ("SHOPSCRAPE_BACKEND", "browser"),
            ("SHOPSCRAPE_HEADLESS", "false"),
            ("SHOPSCRAPE_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        ConfigOverrides::apply_from(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.scraping.workers, 3);
        assert_eq!(config.scraping.backend, Backend::Browser);
        assert!(!config.scraping.headless);
        assert_eq!(config.logging.level, "debug");
    }
}
