use std::fmt::Display;

use miette::miette;

#[derive(Debug)]
pub enum Error {
    UnavailableStream,

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Miette(miette!("{err}"))
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::UnavailableStream => miette!("Unavailable stream"),
            Error::Miette(err) => err,
        }
    }
}

impl Display for Error {
    /// Render the whole cause chain on a single line, for per-item messages
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnavailableStream => write!(f, "stream is unavailable"),
            Error::Miette(report) => {
                let mut first = true;
                for cause in report.chain() {
                    if !first {
                        write!(f, ": ")?;
                    }
                    write!(f, "{cause}")?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Build an error out of a simple message
pub fn err_msg<D: Display + std::fmt::Debug + Send + Sync + 'static>(msg: D) -> Error {
    Error::Miette(miette!("{msg}"))
}

/// Shorthand for returning an error out of a simple message
pub fn bail<T, D: Display + std::fmt::Debug + Send + Sync + 'static>(msg: D) -> Result<T> {
    Err(err_msg(msg))
}
