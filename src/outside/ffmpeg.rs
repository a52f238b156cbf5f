use std::fmt::Debug;

use super::command::{assert_success_command, FFMPEG};

/// Tells whether the extractor can hand its output over to a transcoder
pub trait TranscoderProbe: Sync + Debug {
    fn is_transcoder_available(&self) -> bool;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug, Default)]
pub struct Ffmpeg;

impl TranscoderProbe for Ffmpeg {
    /// Check that the `ffmpeg` binary is reachable and runs
    fn is_transcoder_available(&self) -> bool {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version")).is_ok()
    }
}
