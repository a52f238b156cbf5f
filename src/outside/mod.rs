mod command;
mod ffmpeg;
mod ytdl;

pub use ffmpeg::{Ffmpeg, TranscoderProbe};
pub use ytdl::{ExtractOptions, Extractor, Ytdl};
