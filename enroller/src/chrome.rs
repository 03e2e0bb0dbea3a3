//! Chromium page driver bound to an existing, logged-in browser profile.

use std::path::PathBuf;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::driver::{DriverFut, PageDriver};
use crate::error::AutomationFault;

const CLICKABLE_JS: &str = r"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return !this.disabled
        && rect.width > 0
        && rect.height > 0
        && style.visibility !== 'hidden'
        && style.display !== 'none';
}";

const CURSOR_JS: &str = r"function() { return window.getComputedStyle(this).cursor; }";

/// Which browser profile to drive.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    /// Profile directory name inside `user_data_dir`, e.g. `Profile 1`.
    pub profile_directory: String,
    pub user_data_dir: PathBuf,
    /// Defaults to the browser chromiumoxide finds on the system.
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
}

impl BrowserProfile {
    #[must_use]
    pub fn new(profile_directory: impl Into<String>, user_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_directory: profile_directory.into(),
            user_data_dir: user_data_dir.into(),
            chrome_executable: None,
            headless: false,
        }
    }

    /// The profile must already exist: a fresh one would not be logged in.
    fn check(&self) -> Result<(), AutomationFault> {
        let profile_path = self.user_data_dir.join(&self.profile_directory);
        if profile_path.is_dir() {
            Ok(())
        } else {
            Err(AutomationFault::Launch(format!(
                "browser profile {} not found",
                profile_path.display()
            )))
        }
    }
}

pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    /// Launch the browser on the current runtime and open one page.
    pub async fn launch(profile: &BrowserProfile) -> Result<Self, AutomationFault> {
        tracing::debug!(
            profile_directory = %profile.profile_directory,
            user_data_dir = %profile.user_data_dir.display(),
            "Starting browser"
        );
        profile.check()?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile.user_data_dir)
            .arg(format!("--profile-directory={}", profile.profile_directory))
            .arg("--start-maximized")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !profile.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &profile.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(AutomationFault::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutomationFault::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move { while let Some(_event) = handler.next().await {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(AutomationFault::browser)?;

        tracing::debug!("Browser started");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }
}

impl PageDriver for ChromeDriver {
    type Element = Element;

    fn navigate<'a>(&'a mut self, url: &'a str) -> DriverFut<'a, ()> {
        Box::pin(async move {
            self.page.goto(url).await.map_err(AutomationFault::browser)?;
            Ok(())
        })
    }

    fn current_url(&mut self) -> DriverFut<'_, String> {
        Box::pin(async move {
            let url = self.page.url().await.map_err(AutomationFault::browser)?;
            Ok(url.unwrap_or_default())
        })
    }

    fn find_all<'a>(&'a mut self, selector: &'a str) -> DriverFut<'a, Vec<Element>> {
        Box::pin(async move {
            self.page
                .find_elements(selector)
                .await
                .map_err(AutomationFault::browser)
        })
    }

    fn text<'a>(&'a mut self, element: &'a Element) -> DriverFut<'a, String> {
        Box::pin(async move {
            let text = element
                .inner_text()
                .await
                .map_err(AutomationFault::browser)?;
            Ok(text.unwrap_or_default())
        })
    }

    fn is_clickable<'a>(&'a mut self, element: &'a Element) -> DriverFut<'a, bool> {
        Box::pin(async move {
            let returns = element
                .call_js_fn(CLICKABLE_JS, false)
                .await
                .map_err(AutomationFault::browser)?;
            Ok(returns
                .result
                .value
                .and_then(|value| value.as_bool())
                .unwrap_or(false))
        })
    }

    fn cursor<'a>(&'a mut self, element: &'a Element) -> DriverFut<'a, String> {
        Box::pin(async move {
            let returns = element
                .call_js_fn(CURSOR_JS, false)
                .await
                .map_err(AutomationFault::browser)?;
            Ok(returns
                .result
                .value
                .and_then(|value| value.as_str().map(str::to_string))
                .unwrap_or_default())
        })
    }

    fn click<'a>(&'a mut self, element: &'a Element) -> DriverFut<'a, ()> {
        Box::pin(async move {
            element.click().await.map_err(AutomationFault::browser)?;
            Ok(())
        })
    }

    fn quit(&mut self) -> DriverFut<'_, ()> {
        Box::pin(async move {
            tracing::debug!("Quitting browser");
            let closed = self.browser.close().await.map_err(AutomationFault::browser);
            if let Err(err) = self.browser.wait().await {
                tracing::warn!(error = %err, "Browser process did not exit cleanly");
            }
            self.handler.abort();
            closed.map(|_| ())
        })
    }
}
