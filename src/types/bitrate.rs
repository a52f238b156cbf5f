use std::{fmt::Display, str::FromStr};

use serde::Deserialize;

/// Target audio bitrate, written the way `yt-dlp` expects it (e.g. `192K`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Bitrate(u16);

impl Bitrate {
    pub const fn kbps(value: u16) -> Self {
        Self(value)
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Self::kbps(192)
    }
}

impl FromStr for Bitrate {
    type Err = Box<dyn std::error::Error + Sync + Send>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(num_prefix) = s.trim().to_lowercase().strip_suffix('k') {
            let value: u16 = num_prefix.parse()?;
            if value == 0 {
                return Err(Box::from("Bitrate must be greater than 0K"));
            }
            Ok(Self(value))
        } else {
            Err(Box::from("Bitrate does not end with 'K'"))
        }
    }
}

impl TryFrom<String> for Bitrate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse().map_err(|err| format!("invalid bitrate '{value}': {err}"))
    }
}

impl Display for Bitrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}K", self.0)
    }
}
