use std::time::Duration;

use async_trait::async_trait;
use fantoccini::{elements::Element, error::CmdError, Client, ClientBuilder, Locator};
use indoc::indoc;
use miette::{Context, IntoDiagnostic, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{Browser, Launcher, Probe};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.documentElement.scrollHeight);";

const SCROLL_INTO_VIEW: &str = indoc! {"
    arguments[0].scrollIntoView({ behavior: 'smooth', block: 'center' });
"};

/// Browser driven through a running WebDriver service (e.g. chromedriver)
pub struct FantocciniBrowser {
    client: Client,
}

impl FantocciniBrowser {
    /// Open a new Chrome session on the WebDriver service at `webdriver_url`
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self> {
        let mut args = vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            // English labels keep the section and button lookups stable
            "lang=en-US",
        ];
        if headless {
            args.push("--headless");
        }

        let mut caps = Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": args,
                "prefs": { "intl.accept_languages": "en,en_US" },
            }),
        );

        debug!("Connecting to WebDriver at {webdriver_url} (headless: {headless})");
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(webdriver_url)
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not open a browser session on {webdriver_url}"))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for FantocciniBrowser {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not navigate to {url}"))
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<Probe<Element>> {
        let res = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await;

        match res {
            Ok(element) => Ok(Probe::Found(element)),
            Err(CmdError::WaitTimeout) => Ok(Probe::TimedOut),
            Err(err) => Err(err)
                .into_diagnostic()
                .wrap_err_with(|| format!("Could not wait for '{selector}'")),
        }
    }

    async fn find_all(&mut self, scope: Option<&Element>, selector: &str) -> Result<Vec<Element>> {
        let res = match scope {
            Some(element) => element.find_all(Locator::Css(selector)).await,
            None => self.client.find_all(Locator::Css(selector)).await,
        };

        res.into_diagnostic()
            .wrap_err_with(|| format!("Could not query '{selector}'"))
    }

    async fn ancestor(&mut self, element: &Element, tag: &str) -> Result<Option<Element>> {
        let xpath = format!("./ancestor::{tag}[1]");
        match element.find(Locator::XPath(&xpath)).await {
            Ok(ancestor) => Ok(Some(ancestor)),
            Err(err) if err.is_no_such_element() => Ok(None),
            Err(err) => Err(err)
                .into_diagnostic()
                .wrap_err_with(|| format!("Could not look up the '{tag}' ancestor")),
        }
    }

    async fn text(&mut self, element: &Element) -> Result<String> {
        element.text().await.into_diagnostic()
    }

    async fn attr(&mut self, element: &Element, name: &str) -> Result<Option<String>> {
        element.attr(name).await.into_diagnostic()
    }

    async fn click(&mut self, element: &Element) -> Result<()> {
        element.click().await.into_diagnostic()
    }

    async fn scroll_into_view(&mut self, element: &Element) -> Result<()> {
        let element = serde_json::to_value(element).into_diagnostic()?;
        self.execute(SCROLL_INTO_VIEW, vec![element]).await?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.execute(SCROLL_TO_BOTTOM, vec![]).await?;
        Ok(())
    }

    async fn execute(&mut self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .execute(script, args)
            .await
            .into_diagnostic()
            .wrap_err("Could not execute script")
    }

    async fn close(&mut self) -> Result<()> {
        info!("Closing the browser session");
        self.client
            .clone()
            .close()
            .await
            .into_diagnostic()
            .wrap_err("Could not close the browser session")
    }
}

/// Launches [`FantocciniBrowser`] sessions against a fixed WebDriver endpoint
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    pub webdriver_url: String,
    pub headless: bool,
}

#[async_trait]
impl Launcher for WebDriverLauncher {
    type Browser = FantocciniBrowser;

    async fn launch(&self) -> Result<FantocciniBrowser> {
        FantocciniBrowser::connect(&self.webdriver_url, self.headless).await
    }
}
