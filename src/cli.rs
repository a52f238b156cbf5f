use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::{settings::Settings, types::AudioCodec};

macro_rules! arg_env {
    ($v:literal) => {
        concat!("SONGGRAB_", $v)
    };
}

/// Search a music streaming catalog from the terminal, pick tracks,
/// and download their audio.
///
/// Searching drives a Chrome browser through a WebDriver service
/// (e.g. `chromedriver --port=9515`). Downloading needs `yt-dlp`,
/// and `ffmpeg` to convert the audio.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// The path to a TOML configuration file.
    /// Defaults to `songgrab.toml` in the working directory, if it exists.
    #[arg(long, env=arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// The path to the output directory
    #[arg(long, env=arg_env!("OUT"))]
    pub out: Option<PathBuf>,

    /// The number of tracks downloaded at the same time
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=16), env=arg_env!("CONCURRENCY"))]
    pub concurrency: Option<u16>,

    /// The default number of tracks to look for in a search
    #[arg(long, value_parser = clap::value_parser!(u16).range(5..=50), env=arg_env!("MAX_RESULTS"))]
    pub max_results: Option<u16>,

    /// The audio codec to convert the downloads to, when `ffmpeg` is available
    #[arg(long, value_enum, env=arg_env!("CODEC"))]
    pub codec: Option<AudioCodec>,

    /// The URL of the WebDriver service driving the browser
    #[arg(long, env=arg_env!("WEBDRIVER_URL"))]
    pub webdriver_url: Option<String>,

    /// Show the browser window instead of running it headless
    #[arg(long, env=arg_env!("HEADED"))]
    pub headed: bool,

    /// The maximum level of the logs
    #[arg(long, default_value_t = Level::INFO, env=arg_env!("LOG_LEVEL"))]
    pub log_level: Level,

    /// A first query to search right away
    #[arg(long, short)]
    pub query: Option<String>,
}

impl Args {
    /// Apply the command-line overrides on top of the loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(out) = &self.out {
            settings.download.out_dir = out.clone();
        }
        if let Some(concurrency) = self.concurrency {
            settings.download.concurrency = concurrency.into();
        }
        if let Some(max_results) = self.max_results {
            settings.search.max_results = max_results.into();
        }
        if let Some(codec) = self.codec {
            settings.download.codec = codec;
        }
        if let Some(url) = &self.webdriver_url {
            settings.browser.webdriver_url = url.clone();
        }
        if self.headed {
            settings.browser.headless = false;
        }
    }
}
