//! Scraping of the catalog search page.
//!
//! The page renders its results lazily, so the routine expands the songs
//! shelf and then scrolls a bounded number of times, re-reading the track
//! links after every scroll. Every DOM step can fail when the page layout
//! changes: such failures degrade the result set and are reported as
//! [`SearchWarning`]s, they never abort the search.

use std::{collections::HashSet, fmt::Display, time::Duration};

use miette::Result;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::{
    browser::{Browser, Probe},
    types::{SearchKind, SearchResult},
};

pub const SEARCH_BASE_URL: &str = "https://music.youtube.com/";

/// Any search result row, used to detect that the page has rendered
pub const RESULT_ITEM: &str = "ytmusic-responsive-list-item-renderer";
pub const SHELF_HEADING: &str = "h2.title.style-scope.ytmusic-shelf-renderer";
pub const SHELF_HEADING_TEXT: &str = "yt-formatted-string";
pub const SHELF_TAG: &str = "ytmusic-shelf-renderer";
pub const SHELF_BUTTON: &str = "button";
pub const RESULTS_CONTAINER: &str = "div#contents.style-scope.ytmusic-section-list-renderer";
pub const TRACK_ANCHOR: &str = "a.yt-simple-endpoint.style-scope.yt-formatted-string";

pub const SONGS_SHELF_LABEL: &str = "Songs";
pub const SHOW_ALL_LABEL: &str = "Show all";

/// Marker of a link pointing to a playable track
const WATCH_MARKER: &str = "watch";
const MUSIC_PREFIX: &str = "https://music.";
const MEDIA_PREFIX: &str = "https://www.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub kind: SearchKind,
    pub max_results: usize,
}

/// Timings of the scraping steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTuning {
    pub base_url: String,
    pub load_timeout: Duration,
    pub scroll_passes: usize,
    pub scroll_delay: Duration,
    pub expand_settle: Duration,
    pub after_expand: Duration,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            base_url: SEARCH_BASE_URL.to_string(),
            load_timeout: Duration::from_secs(60),
            scroll_passes: 7,
            scroll_delay: Duration::from_millis(1500),
            expand_settle: Duration::from_secs(1),
            after_expand: Duration::from_secs(3),
        }
    }
}

/// Degraded conditions met during a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchWarning {
    NavigationFailed(String),
    LoadTimeout,
    SectionNotFound,
    ExpandControlMissing,
    DomQueryFailed(String),
}

impl Display for SearchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchWarning::NavigationFailed(err) => {
                write!(f, "Could not open the search page: {err}")
            }
            SearchWarning::LoadTimeout => write!(
                f,
                "Search results did not load in time. The network may be down \
                or the page layout may have changed"
            ),
            SearchWarning::SectionNotFound => write!(
                f,
                "No '{SONGS_SHELF_LABEL}' section on the page, results may be incomplete"
            ),
            SearchWarning::ExpandControlMissing => write!(
                f,
                "No '{SHOW_ALL_LABEL}' button in the '{SONGS_SHELF_LABEL}' section, \
                results may be incomplete"
            ),
            SearchWarning::DomQueryFailed(err) => write!(f, "Page lookup failed: {err}"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SearchReport {
    pub results: Vec<SearchResult>,
    pub warnings: Vec<SearchWarning>,
}

/// Build the search page URL, with the query form-encoded (spaces become `+`)
pub fn search_url(base_url: &str, query: &str) -> String {
    let query: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{base_url}search?q={query}")
}

/// Turn a track link into its canonical watch-page URL.
/// Return None if the link does not point to a track.
pub fn normalize_track_url(href: &str) -> Option<String> {
    if !href.contains(WATCH_MARKER) {
        return None;
    }

    match href.strip_prefix(MUSIC_PREFIX) {
        Some(rest) => Some(format!("{MEDIA_PREFIX}{rest}")),
        None => Some(href.to_string()),
    }
}

/// Search the catalog and return at most `request.max_results` distinct
/// tracks, in the order they appeared on the page.
pub async fn search<B: Browser>(
    browser: &mut B,
    request: &SearchRequest,
    tuning: &SearchTuning,
) -> SearchReport {
    let mut report = SearchReport::default();
    if request.max_results == 0 {
        return report;
    }

    let url = search_url(&tuning.base_url, &request.query);
    info!("Searching '{}' by {} ({url})", request.query, request.kind);

    if let Err(err) = browser.navigate(&url).await {
        warn!("{err:?}");
        report
            .warnings
            .push(SearchWarning::NavigationFailed(err.to_string()));
        return report;
    }

    match browser.wait_for(RESULT_ITEM, tuning.load_timeout).await {
        Ok(Probe::Found(_)) => debug!("Search results rendered"),
        Ok(Probe::NotFound | Probe::TimedOut) => {
            warn!("No search result after {:?}", tuning.load_timeout);
            report.warnings.push(SearchWarning::LoadTimeout);
            return report;
        }
        Err(err) => {
            warn!("Waiting for the search results failed: {err:?}");
            report
                .warnings
                .push(SearchWarning::DomQueryFailed(err.to_string()));
            return report;
        }
    }

    expand_songs_shelf(browser, tuning, &mut report.warnings).await;

    let mut seen = HashSet::new();
    for pass in 1..=tuning.scroll_passes {
        if report.results.len() >= request.max_results {
            break;
        }

        let res = harvest_pass(
            browser,
            tuning,
            request.max_results,
            &mut seen,
            &mut report.results,
        )
        .await;

        if let Err(err) = res {
            warn!("Scroll pass {pass} failed: {err:?}");
            report
                .warnings
                .push(SearchWarning::DomQueryFailed(err.to_string()));
        }

        info!(
            "Scrolled {pass}/{}, {} tracks found so far",
            tuning.scroll_passes,
            report.results.len()
        );
    }

    report.results.truncate(request.max_results);
    info!("Search done, {} tracks found", report.results.len());
    report
}

/// Click the "Show all" button of the songs shelf, if there is one.
/// Any failure is recorded as a warning.
async fn expand_songs_shelf<B: Browser>(
    browser: &mut B,
    tuning: &SearchTuning,
    warnings: &mut Vec<SearchWarning>,
) {
    let shelf = match find_songs_shelf(browser).await {
        Ok(Probe::Found(shelf)) => shelf,
        Ok(Probe::NotFound | Probe::TimedOut) => {
            warn!("'{SONGS_SHELF_LABEL}' section not found, continuing unexpanded");
            warnings.push(SearchWarning::SectionNotFound);
            return;
        }
        Err(err) => {
            warn!("Could not look for the '{SONGS_SHELF_LABEL}' section: {err:?}");
            warnings.push(SearchWarning::DomQueryFailed(err.to_string()));
            return;
        }
    };

    let res = async {
        let Probe::Found(button) = find_show_all_button(browser, &shelf).await? else {
            return Ok(false);
        };

        browser.scroll_into_view(&button).await?;
        tokio::time::sleep(tuning.expand_settle).await;
        browser.click(&button).await?;
        Ok::<_, miette::Report>(true)
    }
    .await;

    match res {
        Ok(true) => {
            info!("Expanded the '{SONGS_SHELF_LABEL}' section");
            tokio::time::sleep(tuning.after_expand).await;
        }
        Ok(false) => {
            warn!("'{SHOW_ALL_LABEL}' button not found in the '{SONGS_SHELF_LABEL}' section");
            warnings.push(SearchWarning::ExpandControlMissing);
        }
        Err(err) => {
            warn!("Could not expand the '{SONGS_SHELF_LABEL}' section: {err:?}");
            warnings.push(SearchWarning::DomQueryFailed(err.to_string()));
        }
    }
}

/// Find the shelf whose heading reads the songs label
async fn find_songs_shelf<B: Browser>(browser: &mut B) -> Result<Probe<B::Element>> {
    let headings = browser.find_all(None, SHELF_HEADING).await?;
    debug!("{} shelf headings on the page", headings.len());

    for heading in &headings {
        // A heading without a readable label is skipped, not fatal
        let label = match heading_label(browser, heading).await {
            Ok(Some(label)) => label,
            Ok(None) => continue,
            Err(err) => {
                debug!("Skipping unreadable heading: {err:?}");
                continue;
            }
        };

        if label == SONGS_SHELF_LABEL {
            return Ok(match browser.ancestor(heading, SHELF_TAG).await? {
                Some(shelf) => Probe::Found(shelf),
                None => Probe::NotFound,
            });
        }
    }

    Ok(Probe::NotFound)
}

async fn heading_label<B: Browser>(
    browser: &mut B,
    heading: &B::Element,
) -> Result<Option<String>> {
    let texts = browser.find_all(Some(heading), SHELF_HEADING_TEXT).await?;
    match texts.first() {
        Some(text) => Ok(Some(browser.text(text).await?.trim().to_string())),
        None => Ok(None),
    }
}

async fn find_show_all_button<B: Browser>(
    browser: &mut B,
    shelf: &B::Element,
) -> Result<Probe<B::Element>> {
    for button in browser.find_all(Some(shelf), SHELF_BUTTON).await? {
        if browser.text(&button).await?.contains(SHOW_ALL_LABEL) {
            return Ok(Probe::Found(button));
        }
    }
    Ok(Probe::NotFound)
}

/// Scroll once, wait for the lazy content, then collect the new tracks.
/// Stop collecting as soon as `max_results` tracks are known.
async fn harvest_pass<B: Browser>(
    browser: &mut B,
    tuning: &SearchTuning,
    max_results: usize,
    seen: &mut HashSet<String>,
    results: &mut Vec<SearchResult>,
) -> Result<()> {
    browser.scroll_to_bottom().await?;
    tokio::time::sleep(tuning.scroll_delay).await;

    let containers = browser.find_all(None, RESULTS_CONTAINER).await?;
    let Some(container) = containers.first() else {
        debug!("Results container not on the page yet");
        return Ok(());
    };

    for anchor in browser.find_all(Some(container), TRACK_ANCHOR).await? {
        if results.len() >= max_results {
            break;
        }

        let Some(href) = browser.attr(&anchor, "href").await? else {
            continue;
        };
        let Some(url) = normalize_track_url(&href) else {
            continue;
        };

        if seen.contains(&url) {
            continue;
        }

        // Only mark the track seen once its title is read, so that a later
        // pass picks it up again when this read fails
        let title = browser.text(&anchor).await?.trim().to_string();
        debug!("Found '{title}' at {url}");
        seen.insert(url.clone());
        results.push(SearchResult::new(title, url));
    }

    Ok(())
}
