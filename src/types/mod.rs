mod bitrate;
mod codec;
mod track;

pub use bitrate::Bitrate;
pub use codec::AudioCodec;
pub use track::{DownloadJob, DownloadOutcome, SearchKind, SearchResult};
