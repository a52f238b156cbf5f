use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::Path,
    thread,
};

use crossbeam_channel::unbounded;
use tracing::{debug, error, info, warn};

use crate::{
    outside::{ExtractOptions, Extractor, TranscoderProbe},
    types::{AudioCodec, Bitrate, DownloadJob, DownloadOutcome},
};

/// Output file name, relative to the output directory.
///
/// The media id is appended to the title so that two tracks sharing the
/// same title in one batch do not write to the same file.
pub const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

/// Fans out download jobs to the extractor on a fixed-size pool of threads
#[derive(Debug)]
pub struct Dispatcher<'a> {
    extractor: &'a dyn Extractor,
    transcoder: &'a dyn TranscoderProbe,
    out_dir: &'a Path,
    codec: AudioCodec,
    quality: Bitrate,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        extractor: &'a dyn Extractor,
        transcoder: &'a dyn TranscoderProbe,
        out_dir: &'a Path,
        codec: AudioCodec,
        quality: Bitrate,
    ) -> Self {
        Self {
            extractor,
            transcoder,
            out_dir,
            codec,
            quality,
        }
    }

    /// Pick the extraction options depending on the host having a transcoder
    pub fn extract_options(&self) -> ExtractOptions {
        if self.transcoder.is_transcoder_available() {
            info!(
                "Transcoder found, audio will be converted to {} at {}",
                self.codec.as_str(),
                self.quality
            );
            ExtractOptions::Transcode {
                codec: self.codec,
                quality: self.quality,
            }
        } else {
            warn!("No transcoder found, downloading the best available format as-is");
            ExtractOptions::BestNoTranscode
        }
    }

    /// Download every job and return one outcome per job, in the jobs order.
    ///
    /// At most `concurrency` extractions run at the same time. `on_done` is
    /// called from the worker threads as soon as a job resolves, with the
    /// job index in `jobs`.
    pub fn download_all<F>(
        &self,
        jobs: &[DownloadJob],
        concurrency: usize,
        on_done: F,
    ) -> Vec<DownloadOutcome>
    where
        F: Fn(usize, &DownloadOutcome) + Sync,
    {
        if jobs.is_empty() {
            return Vec::new();
        }

        let options = self.extract_options();
        let template = self.out_dir.join(OUTPUT_TEMPLATE);
        let workers = concurrency.clamp(1, jobs.len());
        info!("Downloading {} tracks with {workers} workers", jobs.len());

        let (input, queue) = unbounded::<(usize, &DownloadJob)>();
        let (done, output) = unbounded::<(usize, DownloadOutcome)>();

        // Fill the input channel with all the jobs, then drop it to
        // let the workers stop once the queue is drained
        for task in jobs.iter().enumerate() {
            // Cannot fail, the receiving end is still alive
            let _ = input.send(task);
        }
        drop(input);

        let mut outcomes: Vec<Option<DownloadOutcome>> = vec![None; jobs.len()];

        thread::scope(|scope| {
            for id in 0..workers {
                let queue = queue.clone();
                let done = done.clone();
                let on_done = &on_done;
                let options = &options;
                let template = &template;

                let spawned = thread::Builder::new()
                    .name(format!("dl-{id}"))
                    .spawn_scoped(scope, move || {
                        debug!("Worker started, waiting for a track");
                        for (idx, job) in queue {
                            let outcome = self.run_one(job, template, options);
                            on_done(idx, &outcome);
                            if done.send((idx, outcome)).is_err() {
                                break;
                            }
                        }
                        debug!("Queue drained. Stopping the worker");
                    });

                if let Err(err) = spawned {
                    error!("Could not spawn download worker {id}: {err}");
                }
            }

            // Only the workers hold senders now, so the loop below
            // ends once all of them are done
            drop(done);
            for (idx, outcome) in &output {
                outcomes[idx] = Some(outcome);
            }
        });

        outcomes
            .into_iter()
            .zip(jobs)
            .map(|(outcome, job)| {
                outcome.unwrap_or_else(|| {
                    DownloadOutcome::failure(format!(
                        "Failed to download '{}': no worker picked it up",
                        job.title
                    ))
                })
            })
            .collect()
    }

    /// Run a single extraction. Errors and panics both end up as a failure outcome.
    fn run_one(
        &self,
        job: &DownloadJob,
        template: &Path,
        options: &ExtractOptions,
    ) -> DownloadOutcome {
        info!("Downloading '{}' from {}", job.title, job.url);

        let res = catch_unwind(AssertUnwindSafe(|| {
            self.extractor.extract(&job.url, template, options)
        }));

        match res {
            Ok(Ok(())) => {
                info!("'{}' downloaded", job.title);
                DownloadOutcome::success(format!(
                    "Downloaded '{}' into {}",
                    job.title,
                    self.out_dir.display()
                ))
            }
            Ok(Err(err)) => {
                error!("Could not download '{}': {err}", job.title);
                DownloadOutcome::failure(format!("Failed to download '{}': {err}", job.title))
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Extraction of '{}' panicked: {reason}", job.title);
                DownloadOutcome::failure(format!("Failed to download '{}': {reason}", job.title))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use super::*;
    use crate::result::{bail, Result};

    #[derive(Debug)]
    struct Transcoder(bool);

    impl TranscoderProbe for Transcoder {
        fn is_transcoder_available(&self) -> bool {
            self.0
        }
    }

    /// Extractor that records its calls, optionally failing or stalling on some URLs
    #[derive(Debug, Default)]
    struct FakeExtractor {
        fail_on: Vec<&'static str>,
        panic_on: Vec<&'static str>,
        slow_on: Vec<&'static str>,
        calls: Mutex<Vec<(String, PathBuf, ExtractOptions)>>,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl Extractor for FakeExtractor {
        fn extract(&self, url: &str, template: &Path, options: &ExtractOptions) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);

            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), template.to_path_buf(), *options));

            let pause = if self.slow_on.contains(&url) { 80 } else { 10 };
            thread::sleep(Duration::from_millis(pause));
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self.panic_on.contains(&url) {
                panic!("extractor blew up on {url}");
            }
            if self.fail_on.contains(&url) {
                return bail(format!("HTTP Error 403 on {url}"));
            }
            Ok(())
        }
    }

    fn job(title: &str, url: &str) -> DownloadJob {
        DownloadJob {
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    fn dispatcher<'a>(
        extractor: &'a FakeExtractor,
        transcoder: &'a Transcoder,
    ) -> Dispatcher<'a> {
        Dispatcher::new(
            extractor,
            transcoder,
            Path::new("music"),
            AudioCodec::Mp3,
            Bitrate::kbps(192),
        )
    }

    #[test]
    fn failing_item_does_not_affect_the_others() {
        let extractor = FakeExtractor {
            fail_on: vec!["u2"],
            ..Default::default()
        };
        let transcoder = Transcoder(true);

        let outcomes = dispatcher(&extractor, &transcoder).download_all(
            &[job("A", "u1"), job("B", "u2")],
            3,
            |_, _| {},
        );

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert!(outcomes[0].message.contains("'A'"));
        assert!(!outcomes[1].success);
        assert!(outcomes[1].message.contains("'B'"));
        assert!(outcomes[1].message.contains("HTTP Error 403"));
    }

    #[test]
    fn outcomes_follow_submission_order_not_completion_order() {
        let extractor = FakeExtractor {
            slow_on: vec!["u1"],
            fail_on: vec!["u3"],
            ..Default::default()
        };
        let transcoder = Transcoder(true);
        let completed = Mutex::new(Vec::new());

        let jobs = [job("A", "u1"), job("B", "u2"), job("C", "u3"), job("D", "u4")];
        let outcomes = dispatcher(&extractor, &transcoder).download_all(&jobs, 4, |idx, _| {
            completed.lock().unwrap().push(idx)
        });

        let success: Vec<bool> = outcomes.iter().map(|o| o.success).collect();
        assert_eq!(success, [true, true, false, true]);
        for (outcome, job) in outcomes.iter().zip(&jobs) {
            assert!(outcome.message.contains(&format!("'{}'", job.title)));
        }

        // The slow first item finished last, yet sits first in the outcomes
        let completed = completed.into_inner().unwrap();
        assert_eq!(completed.len(), 4);
        assert_eq!(completed.last(), Some(&0));
    }

    #[test]
    fn missing_transcoder_requests_best_format_for_every_item() {
        let extractor = FakeExtractor::default();
        let transcoder = Transcoder(false);

        let jobs = [job("A", "u1"), job("B", "u2"), job("C", "u3")];
        dispatcher(&extractor, &transcoder).download_all(&jobs, 3, |_, _| {});

        let calls = extractor.calls.into_inner().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls
            .iter()
            .all(|(_, _, options)| *options == ExtractOptions::BestNoTranscode));
    }

    #[test]
    fn available_transcoder_requests_configured_codec() {
        let extractor = FakeExtractor::default();
        let transcoder = Transcoder(true);

        dispatcher(&extractor, &transcoder).download_all(&[job("A", "u1")], 3, |_, _| {});

        let calls = extractor.calls.into_inner().unwrap();
        assert_eq!(
            calls[0].2,
            ExtractOptions::Transcode {
                codec: AudioCodec::Mp3,
                quality: Bitrate::kbps(192),
            }
        );
        assert_eq!(calls[0].1, Path::new("music").join(OUTPUT_TEMPLATE));
    }

    #[test]
    fn concurrency_is_bounded_by_the_pool_size() {
        let extractor = FakeExtractor::default();
        let transcoder = Transcoder(true);

        let jobs: Vec<_> = (0..10).map(|n| job(&format!("T{n}"), "u")).collect();
        let outcomes = dispatcher(&extractor, &transcoder).download_all(&jobs, 3, |_, _| {});

        assert_eq!(outcomes.len(), 10);
        assert!(outcomes.iter().all(|o| o.success));
        let max = extractor.max_running.load(Ordering::SeqCst);
        assert!((1..=3).contains(&max), "max concurrent extractions was {max}");
    }

    #[test]
    fn zero_concurrency_still_downloads_everything() {
        let extractor = FakeExtractor::default();
        let transcoder = Transcoder(true);

        let outcomes =
            dispatcher(&extractor, &transcoder).download_all(&[job("A", "u1"), job("B", "u2")], 0, |_, _| {});

        assert_eq!(outcomes.len(), 2);
        assert_eq!(extractor.max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_extraction_becomes_a_failure() {
        let extractor = FakeExtractor {
            panic_on: vec!["u1"],
            ..Default::default()
        };
        let transcoder = Transcoder(true);

        let outcomes = dispatcher(&extractor, &transcoder).download_all(
            &[job("A", "u1"), job("B", "u2")],
            2,
            |_, _| {},
        );

        assert!(!outcomes[0].success);
        assert!(outcomes[0].message.contains("extractor blew up on u1"));
        assert!(outcomes[1].success);
    }

    #[test]
    fn empty_batch_yields_no_outcome() {
        let extractor = FakeExtractor::default();
        let transcoder = Transcoder(true);

        let outcomes = dispatcher(&extractor, &transcoder).download_all(&[], 3, |_, _| {});

        assert!(outcomes.is_empty());
        assert!(extractor.calls.into_inner().unwrap().is_empty());
    }
}
