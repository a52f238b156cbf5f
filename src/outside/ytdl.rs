use std::{
    ffi::OsStr,
    fmt::Debug,
    path::Path,
    process::{Command, Output},
};

use super::command::{assert_success_command, last_line, run_command, Capture, YT_DL, YT_DLP};
use crate::{
    result::{bail, Error, Result},
    types::{AudioCodec, Bitrate},
};

/// What the extractor should do with the fetched stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOptions {
    /// Take the best already-available format as-is
    BestNoTranscode,

    /// Take the best audio and convert it to `codec` at `quality`
    Transcode { codec: AudioCodec, quality: Bitrate },
}

/// Interface for fetching the audio of a media URL into a file
pub trait Extractor: Sync + Debug {
    /// Download the media at `url`.
    ///
    /// `output_template` is an extractor-side template: its placeholders
    /// are filled by the tool from the media metadata.
    fn extract(&self, url: &str, output_template: &Path, options: &ExtractOptions) -> Result<()>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program,
/// or [youtube-dl](https://github.com/ytdl-org/youtube-dl) if the former is missing
#[derive(Debug)]
pub struct Ytdl {
    program: &'static str,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new() -> Result<Self> {
        // Check `yt-dlp`
        if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self { program: YT_DLP })
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            // Check `youtube-dl`
            Ok(Self { program: YT_DL })
        } else {
            bail("Neither yt-dlp nor youtube-dl found")
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Run the command and check if it failed with saying the stream is unavailable.
    /// In that case, return [`Error::UnavailableStream`].
    ///
    /// In other cases, return the output handle, with stderr captured.
    fn run_check_availability<F>(&self, f: F) -> Result<Output>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let res = run_command(self.program, f, Capture::STDERR)?;

        if is_unavailable(&res.stderr) {
            Err(Error::UnavailableStream)
        } else {
            Ok(res)
        }
    }
}

impl Extractor for Ytdl {
    fn extract(&self, url: &str, output_template: &Path, options: &ExtractOptions) -> Result<()> {
        let res = self
            .run_check_availability(|cmd| {
                let cmd = cmd
                    .arg("-q")
                    .arg("--no-playlist")
                    .args([OsStr::new("-o"), output_template.as_os_str()]);

                let cmd = match options {
                    ExtractOptions::BestNoTranscode => cmd.args(["-f", "best"]),
                    ExtractOptions::Transcode { codec, quality } => cmd
                        .args(["-f", "bestaudio/best"])
                        .arg("--extract-audio")
                        .args(["--audio-format", codec.as_str()])
                        .args(["--audio-quality", &quality.to_string()]),
                };

                cmd.arg("--").arg(url)
            })
            .map_err(|err| err.wrap_err_with(|| format!("Could not run {}", self.program)))?;

        if res.status.success() {
            Ok(())
        } else {
            match last_line(&res.stderr) {
                Some(line) => bail(format!("{} exited with {}: {line}", self.program, res.status)),
                None => bail(format!("{} exited with {}", self.program, res.status)),
            }
        }
    }
}

fn is_unavailable(stderr: &[u8]) -> bool {
    String::from_utf8_lossy(stderr)
        .lines()
        .any(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"))
}
