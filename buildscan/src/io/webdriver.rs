//! WebDriver-backed [`Session`] built on `fantoccini`.
//!
//! `fantoccini` is async; the scanners are strictly sequential, so the session
//! owns a small tokio runtime and blocks on each command. The runtime also
//! hosts the Ctrl-C listener, which keeps running while the main thread is
//! blocked on a prompt or a wait.

use anyhow::{Context, Result};
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::context::Interrupt;
use crate::core::locator::Locator;
use crate::exit_codes;
use crate::io::config::ScanConfig;
use crate::io::session::{Scope, Session};

pub struct WebDriverSession {
    runtime: Runtime,
    client: Client,
}

impl WebDriverSession {
    /// Start a Chrome session through the configured WebDriver endpoint.
    pub fn connect(config: &ScanConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .context("build tokio runtime")?;

        info!(webdriver_url = %config.webdriver_url, "connecting to WebDriver");
        let capabilities = chrome_capabilities(config);
        let client = runtime
            .block_on(
                ClientBuilder::native()
                    .capabilities(capabilities)
                    .connect(&config.webdriver_url),
            )
            .with_context(|| {
                format!(
                    "connect to WebDriver at {} (is chromedriver running?)",
                    config.webdriver_url
                )
            })?;

        Ok(Self { runtime, client })
    }

    /// Route Ctrl-C into `interrupt`. A second Ctrl-C exits immediately.
    pub fn install_interrupt_handler(&self, interrupt: Interrupt) {
        self.runtime.spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    warn!("could not listen for Ctrl-C");
                    return;
                }
                if interrupt.is_set() {
                    eprintln!("\nInterrupted twice, exiting.");
                    std::process::exit(exit_codes::INTERRUPTED);
                }
                eprintln!("\nInterrupt received; stopping after the current item.");
                interrupt.trigger();
            }
        });
    }

    /// End the WebDriver session, closing the browser window.
    pub fn close(self) -> Result<()> {
        let Self { runtime, client } = self;
        runtime
            .block_on(client.close())
            .context("close WebDriver session")
    }
}

fn chrome_capabilities(config: &ScanConfig) -> serde_json::Map<String, Value> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--log-level=3".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    if let Some(dir) = &config.user_data_dir {
        args.push(format!("--user-data-dir={}", dir.display()));
    }

    let mut caps = serde_json::Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-logging", "enable-automation"],
        }),
    );
    caps
}

fn to_locator(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::Css(selector) => fantoccini::Locator::Css(selector),
        Locator::XPath(expression) => fantoccini::Locator::XPath(expression),
    }
}

impl Session for WebDriverSession {
    type Element = Element;

    fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "navigate");
        self.runtime
            .block_on(self.client.goto(url))
            .with_context(|| format!("navigate to {url}"))
    }

    fn current_url(&self) -> Result<String> {
        let url = self
            .runtime
            .block_on(self.client.current_url())
            .context("read current url")?;
        Ok(url.to_string())
    }

    fn find_all(&self, scope: Scope<'_, Element>, locator: &Locator) -> Result<Vec<Element>> {
        let target = to_locator(locator);
        let found = match scope {
            Scope::Page => self.runtime.block_on(self.client.find_all(target)),
            Scope::Within(element) => self.runtime.block_on(element.find_all(target)),
        };
        found.with_context(|| format!("find {locator}"))
    }

    fn text(&self, element: &Element) -> Result<String> {
        let text = self
            .runtime
            .block_on(element.prop("textContent"))
            .context("read textContent")?;
        Ok(text.unwrap_or_default())
    }

    fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        self.runtime
            .block_on(element.attr(name))
            .with_context(|| format!("read attribute {name}"))
    }

    fn value(&self, element: &Element) -> Result<Option<String>> {
        self.runtime
            .block_on(element.prop("value"))
            .context("read value")
    }

    fn click(&self, element: &Element) -> Result<()> {
        self.runtime
            .block_on(element.click())
            .context("click element")
    }

    fn execute(&self, script: &str, target: Option<&Element>) -> Result<Value> {
        let args = match target {
            Some(element) => vec![serde_json::to_value(element).context("encode script target")?],
            None => Vec::new(),
        };
        self.runtime
            .block_on(self.client.execute(script, args))
            .context("execute script")
    }
}
