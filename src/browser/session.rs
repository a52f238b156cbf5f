use async_trait::async_trait;
use miette::{miette, Context, Result};
use tracing::{info, warn};

use super::Browser;

/// Creates browsers on demand
#[async_trait]
pub trait Launcher: Send + Sync {
    type Browser: Browser;

    async fn launch(&self) -> Result<Self::Browser>;
}

/// One browser, launched on first use and reused by every later search
/// until [`Session::close`] is called.
pub struct Session<L: Launcher> {
    launcher: L,
    browser: Option<L::Browser>,
}

impl<L: Launcher> Session<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            browser: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.browser.is_some()
    }

    /// Get the session browser, launching it if needed.
    ///
    /// A launch failure is returned as-is: without a browser no search can run.
    pub async fn browser(&mut self) -> Result<&mut L::Browser> {
        if self.browser.is_none() {
            info!("Starting the browser session");
            let browser = self
                .launcher
                .launch()
                .await
                .wrap_err("Could not start the browser session")?;
            self.browser = Some(browser);
        }

        self.browser
            .as_mut()
            .ok_or_else(|| miette!("Browser session is not available"))
    }

    /// Release the browser, if one was launched. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(err) = browser.close().await {
                warn!("{err:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use serde_json::Value;

    use super::*;
    use crate::browser::Probe;

    /// Browser that does nothing but count how often it was closed
    struct NullBrowser {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Browser for NullBrowser {
        type Element = ();

        async fn navigate(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn wait_for(&mut self, _selector: &str, _timeout: Duration) -> Result<Probe<()>> {
            Ok(Probe::TimedOut)
        }

        async fn find_all(&mut self, _scope: Option<&()>, _selector: &str) -> Result<Vec<()>> {
            Ok(vec![])
        }

        async fn ancestor(&mut self, _element: &(), _tag: &str) -> Result<Option<()>> {
            Ok(None)
        }

        async fn text(&mut self, _element: &()) -> Result<String> {
            Ok(String::new())
        }

        async fn attr(&mut self, _element: &(), _name: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn click(&mut self, _element: &()) -> Result<()> {
            Ok(())
        }

        async fn scroll_into_view(&mut self, _element: &()) -> Result<()> {
            Ok(())
        }

        async fn scroll_to_bottom(&mut self) -> Result<()> {
            Ok(())
        }

        async fn execute(&mut self, _script: &str, _args: Vec<Value>) -> Result<Value> {
            Ok(Value::Null)
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        fail: bool,
        launched: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Launcher for CountingLauncher {
        type Browser = NullBrowser;

        async fn launch(&self) -> Result<NullBrowser> {
            self.launched.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(miette!("chromedriver is not running"));
            }
            Ok(NullBrowser {
                closed: self.closed.clone(),
            })
        }
    }

    #[tokio::test]
    async fn launches_lazily_and_only_once() {
        let mut session = Session::new(CountingLauncher::default());
        assert!(!session.is_open());
        assert_eq!(session.launcher.launched.load(Ordering::SeqCst), 0);

        session.browser().await.unwrap();
        session.browser().await.unwrap();

        assert!(session.is_open());
        assert_eq!(session.launcher.launched.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_releases_the_browser_once() {
        let mut session = Session::new(CountingLauncher::default());
        session.browser().await.unwrap();

        session.close().await;
        session.close().await;

        assert!(!session.is_open());
        assert_eq!(session.launcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let mut session = Session::new(CountingLauncher {
            fail: true,
            ..Default::default()
        });

        let err = session.browser().await.err().unwrap();
        assert_eq!(err.to_string(), "Could not start the browser session");
        assert!(!session.is_open());
    }
}
