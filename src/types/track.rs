use std::fmt::Display;

/// How the user phrased the search. The catalog page is the same for both,
/// it only changes how the search is reported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    #[default]
    Keyword,
    Artist,
}

impl Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchKind::Keyword => write!(f, "keyword"),
            SearchKind::Artist => write!(f, "artist"),
        }
    }
}

/// A track found on the search page.
///
/// `id` is the canonical watch-page URL and is what selections refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub id: String,
}

impl SearchResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            title: title.into(),
            id: url.clone(),
            url,
        }
    }
}

/// A track submitted to the download dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub title: String,
    pub url: String,
}

impl From<&SearchResult> for DownloadJob {
    fn from(result: &SearchResult) -> Self {
        Self {
            title: result.title.clone(),
            url: result.url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub success: bool,
    pub message: String,
}

impl DownloadOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
