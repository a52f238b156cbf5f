use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use miette::{Context, IntoDiagnostic, Result};
use serde::Deserialize;

use crate::{
    search::{SearchTuning, SEARCH_BASE_URL},
    types::{AudioCodec, Bitrate},
};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "songgrab.toml";

/// Prefix of the environment variables overriding the config file,
/// e.g. `SONGGRAB_DOWNLOAD__CONCURRENCY=4`
pub const ENV_PREFIX: &str = "SONGGRAB";

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub search: SearchSettings,
    pub download: DownloadSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub max_results: usize,
    pub load_timeout_secs: u64,
    pub scroll_passes: usize,
    pub scroll_delay_ms: u64,
    pub expand_settle_ms: u64,
    pub after_expand_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 20,
            load_timeout_secs: 60,
            scroll_passes: 7,
            scroll_delay_ms: 1500,
            expand_settle_ms: 1000,
            after_expand_ms: 3000,
        }
    }
}

impl SearchSettings {
    pub fn tuning(&self) -> SearchTuning {
        SearchTuning {
            base_url: SEARCH_BASE_URL.to_string(),
            load_timeout: Duration::from_secs(self.load_timeout_secs),
            scroll_passes: self.scroll_passes,
            scroll_delay: Duration::from_millis(self.scroll_delay_ms),
            expand_settle: Duration::from_millis(self.expand_settle_ms),
            after_expand: Duration::from_millis(self.after_expand_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub out_dir: PathBuf,
    pub concurrency: usize,
    pub codec: AudioCodec,
    pub quality: Bitrate,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("music"),
            concurrency: 3,
            codec: AudioCodec::default(),
            quality: Bitrate::default(),
        }
    }
}

impl Settings {
    /// Load the settings from the defaults, the config file and the environment,
    /// the latter taking precedence.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
        };

        Self::from_sources(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(
        file: File<config::FileSourceFile, FileFormat>,
        env: Environment,
    ) -> Result<Self> {
        Config::builder()
            .add_source(file)
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()
            .into_diagnostic()
            .wrap_err("Could not read the configuration")?
            .try_deserialize()
            .into_diagnostic()
            .wrap_err("Invalid configuration")
    }
}
