use std::{
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
};

use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect, Select};
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::{
    browser::{Launcher, Session},
    dispatcher::Dispatcher,
    search::{search, SearchReport, SearchRequest},
    settings::Settings,
    types::{DownloadJob, SearchKind, SearchResult},
};

const MIN_RESULTS: usize = 5;
const MAX_RESULTS: usize = 50;

/// What to do once a selection has been handled
enum Next {
    Reselect,
    NewSearch,
    Quit,
}

/// Interactive terminal front: search, select, download, repeat
pub struct Shell<'a, L: Launcher> {
    runtime: &'a Runtime,
    session: &'a mut Session<L>,
    dispatcher: Dispatcher<'a>,
    settings: &'a Settings,
    theme: ColorfulTheme,

    results: Vec<SearchResult>,
    /// Ids of the selected results, kept across selection prompts
    selected: HashSet<String>,
}

impl<'a, L: Launcher> Shell<'a, L> {
    pub fn new(
        runtime: &'a Runtime,
        session: &'a mut Session<L>,
        dispatcher: Dispatcher<'a>,
        settings: &'a Settings,
    ) -> Self {
        Self {
            runtime,
            session,
            dispatcher,
            settings,
            theme: ColorfulTheme::default(),
            results: Vec::new(),
            selected: HashSet::new(),
        }
    }

    /// Run until the user quits.
    ///
    /// Only a failure to start the browser or to talk to the terminal ends
    /// the loop with an error: search and download problems are reported
    /// and the loop goes on.
    pub fn run(&mut self, first_query: Option<String>) -> Result<()> {
        let mut next_query = first_query;

        loop {
            let query = match next_query.take() {
                Some(query) => query,
                None => self.prompt_query()?,
            };
            let query = query.trim().to_string();
            if query.is_empty() {
                return Ok(());
            }

            let request = SearchRequest {
                query,
                kind: self.prompt_kind()?,
                max_results: self.prompt_max_results()?,
            };

            let report = self.search(&request)?;
            for warning in &report.warnings {
                println!("{} {warning}", "warning:".yellow().bold());
            }

            self.results = report.results;
            self.selected.clear();

            if self.results.is_empty() {
                println!(
                    "No track found for '{}'. Try other words, or check that the catalog is reachable.",
                    request.query
                );
                continue;
            }
            println!(
                "{} Found {} tracks for '{}' ({} search)",
                "✔".green(),
                self.results.len(),
                request.query,
                request.kind
            );

            loop {
                let jobs = self.prompt_selection()?;
                if jobs.is_empty() {
                    println!("{} No track selected", "warning:".yellow().bold());
                } else if self.confirm_download(&jobs)? {
                    self.download(&jobs);
                }

                match self.prompt_next()? {
                    Next::Reselect => continue,
                    Next::NewSearch => break,
                    Next::Quit => return Ok(()),
                }
            }
        }
    }

    fn search(&mut self, request: &SearchRequest) -> Result<SearchReport> {
        let tuning = self.settings.search.tuning();
        let session = &mut *self.session;

        self.runtime.block_on(async {
            let browser = session.browser().await?;
            Ok::<_, miette::Report>(search(browser, request, &tuning).await)
        })
    }

    fn download(&self, jobs: &[DownloadJob]) {
        let total = jobs.len();
        println!(
            "Downloading {total} tracks into {}",
            self.settings.download.out_dir.display()
        );

        let resolved = AtomicUsize::new(0);
        let outcomes = self.dispatcher.download_all(
            jobs,
            self.settings.download.concurrency,
            |idx, outcome| {
                let n = resolved.fetch_add(1, Ordering::SeqCst) + 1;
                let mark = if outcome.success {
                    "✔".green().to_string()
                } else {
                    "✘".red().to_string()
                };
                println!("[{n}/{total}] #{} {mark} {}", idx + 1, outcome.message);
            },
        );

        println!();
        for (idx, outcome) in outcomes.iter().enumerate() {
            if outcome.success {
                println!("{:>3}. {}", idx + 1, outcome.message.green());
            } else {
                println!("{:>3}. {}", idx + 1, outcome.message.red());
            }
        }

        let succeeded = outcomes.iter().filter(|outcome| outcome.success).count();
        if succeeded < total {
            warn!("{} of {total} downloads failed", total - succeeded);
        }
        println!("All downloads attempted: {succeeded}/{total} succeeded");
    }

    fn prompt_query(&self) -> Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt("Song, artist or keywords (empty to quit)")
            .allow_empty(true)
            .interact_text()
            .into_diagnostic()
    }

    fn prompt_kind(&self) -> Result<SearchKind> {
        let kinds = [SearchKind::Keyword, SearchKind::Artist];
        let idx = Select::with_theme(&self.theme)
            .with_prompt("Search by")
            .items(&["Keyword", "Artist name"])
            .default(0)
            .interact()
            .into_diagnostic()?;
        Ok(kinds[idx])
    }

    fn prompt_max_results(&self) -> Result<usize> {
        Input::<usize>::with_theme(&self.theme)
            .with_prompt(format!(
                "How many tracks to look for ({MIN_RESULTS}-{MAX_RESULTS})"
            ))
            .default(
                self.settings
                    .search
                    .max_results
                    .clamp(MIN_RESULTS, MAX_RESULTS),
            )
            .validate_with(|n: &usize| {
                if (MIN_RESULTS..=MAX_RESULTS).contains(n) {
                    Ok(())
                } else {
                    Err(format!("Pick a number between {MIN_RESULTS} and {MAX_RESULTS}"))
                }
            })
            .interact_text()
            .into_diagnostic()
    }

    /// Let the user pick among the last results, with the previous
    /// selection pre-checked
    fn prompt_selection(&mut self) -> Result<Vec<DownloadJob>> {
        let labels: Vec<String> = self
            .results
            .iter()
            .map(|result| format!("{}  {}", result.title, result.url.dimmed()))
            .collect();
        let defaults: Vec<bool> = self
            .results
            .iter()
            .map(|result| self.selected.contains(&result.id))
            .collect();

        let picked = MultiSelect::with_theme(&self.theme)
            .with_prompt("Tracks to download (space to toggle, enter to confirm)")
            .items(&labels)
            .defaults(&defaults)
            .interact()
            .into_diagnostic()?;

        self.selected = picked
            .into_iter()
            .map(|idx| self.results[idx].id.clone())
            .collect();
        debug!("{} tracks selected", self.selected.len());

        Ok(self
            .results
            .iter()
            .filter(|result| self.selected.contains(&result.id))
            .map(DownloadJob::from)
            .collect())
    }

    fn confirm_download(&self, jobs: &[DownloadJob]) -> Result<bool> {
        println!("Selected {} tracks:", jobs.len());
        for job in jobs {
            println!("  - {}", job.title);
        }

        Confirm::with_theme(&self.theme)
            .with_prompt(format!("Download these {} tracks?", jobs.len()))
            .default(true)
            .interact()
            .into_diagnostic()
    }

    fn prompt_next(&self) -> Result<Next> {
        let idx = Select::with_theme(&self.theme)
            .with_prompt("What next?")
            .items(&["Select again from these results", "New search", "Quit"])
            .default(1)
            .interact()
            .into_diagnostic()?;

        Ok(match idx {
            0 => Next::Reselect,
            1 => Next::NewSearch,
            _ => Next::Quit,
        })
    }
}
