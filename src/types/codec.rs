use clap::ValueEnum;
use serde::Deserialize;

/// Audio codec the extractor converts to when a transcoder is available
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Mp3,
    M4a,
    Opus,
    Vorbis,
    Flac,
}

impl AudioCodec {
    /// Name of the codec as given to `--audio-format`
    pub fn as_str(self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::M4a => "m4a",
            AudioCodec::Opus => "opus",
            AudioCodec::Vorbis => "vorbis",
            AudioCodec::Flac => "flac",
        }
    }
}
