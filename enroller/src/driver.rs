//! The page capability consumed by the enrollment machine, and polling waits
//! over it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::AutomationFault;

/// Upper bound for every wait on page state.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub type DriverFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, AutomationFault>> + 'a>>;

/// A single browser page bound to an authenticated profile.
///
/// Lookups never wait: `find_all` reports what is on the page right now.
/// Waiting is layered on top by [`Waits`]. Implementations are driven from one
/// thread and need not be `Send`.
pub trait PageDriver {
    type Element: 'static;

    fn navigate<'a>(&'a mut self, url: &'a str) -> DriverFut<'a, ()>;
    fn current_url(&mut self) -> DriverFut<'_, String>;
    fn find_all<'a>(&'a mut self, selector: &'a str) -> DriverFut<'a, Vec<Self::Element>>;
    fn text<'a>(&'a mut self, element: &'a Self::Element) -> DriverFut<'a, String>;
    /// Visible and enabled.
    fn is_clickable<'a>(&'a mut self, element: &'a Self::Element) -> DriverFut<'a, bool>;
    /// Computed `cursor` style of the element.
    fn cursor<'a>(&'a mut self, element: &'a Self::Element) -> DriverFut<'a, String>;
    fn click<'a>(&'a mut self, element: &'a Self::Element) -> DriverFut<'a, ()>;
    /// Release the underlying browser session.
    fn quit(&mut self) -> DriverFut<'_, ()>;
}

pub(crate) async fn find<D: PageDriver>(
    driver: &mut D,
    selector: &str,
) -> Result<Option<D::Element>, AutomationFault> {
    Ok(driver.find_all(selector).await?.into_iter().next())
}

pub(crate) async fn any_present<D: PageDriver>(
    driver: &mut D,
    selectors: &[&str],
) -> Result<bool, AutomationFault> {
    for selector in selectors {
        if !driver.find_all(selector).await?.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// First non-empty text among the elements matching `selector`.
pub(crate) async fn first_text<D: PageDriver>(
    driver: &mut D,
    selector: &str,
) -> Result<Option<String>, AutomationFault> {
    for element in driver.find_all(selector).await? {
        let text = driver.text(&element).await?;
        if !text.trim().is_empty() {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

pub(crate) async fn body_text<D: PageDriver>(driver: &mut D) -> Result<String, AutomationFault> {
    match find(driver, "body").await? {
        Some(body) => driver.text(&body).await,
        None => Ok(String::new()),
    }
}

/// An observable fact about the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Located(&'static str),
    Clickable(&'static str),
    /// The element exists and its cursor is not `not-allowed`.
    CursorAllowed(&'static str),
    UrlContains(&'static str),
    UrlOmits(&'static str),
    UrlIs(String),
    BodyTextIs(&'static str),
    AnyOf(Vec<Condition>),
    AllOf(Vec<Condition>),
}

impl Condition {
    pub fn holds<'a, D: PageDriver>(&'a self, driver: &'a mut D) -> DriverFut<'a, bool> {
        Box::pin(async move {
            let holds = match self {
                Self::Located(selector) => find(driver, selector).await?.is_some(),
                Self::Clickable(selector) => match find(driver, selector).await? {
                    Some(element) => driver.is_clickable(&element).await?,
                    None => false,
                },
                Self::CursorAllowed(selector) => match find(driver, selector).await? {
                    Some(element) => driver.cursor(&element).await? != "not-allowed",
                    None => false,
                },
                Self::UrlContains(part) => driver.current_url().await?.contains(part),
                Self::UrlOmits(part) => !driver.current_url().await?.contains(part),
                Self::UrlIs(url) => driver.current_url().await? == *url,
                Self::BodyTextIs(text) => body_text(driver).await?.trim() == *text,
                Self::AnyOf(conditions) => {
                    // A failing alternative does not stop the others from matching.
                    let mut fault = None;
                    for condition in conditions {
                        match condition.holds(driver).await {
                            Ok(true) => return Ok(true),
                            Ok(false) => {}
                            Err(err) => fault = Some(err),
                        }
                    }
                    if let Some(fault) = fault {
                        return Err(fault);
                    }
                    false
                }
                Self::AllOf(conditions) => {
                    for condition in conditions {
                        if !condition.holds(driver).await? {
                            return Ok(false);
                        }
                    }
                    true
                }
            };
            Ok(holds)
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, sep: &str, items: &[Condition]) -> fmt::Result {
            f.write_str("(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{item}")?;
            }
            f.write_str(")")
        }

        match self {
            Self::Located(selector) => write!(f, "located `{selector}`"),
            Self::Clickable(selector) => write!(f, "clickable `{selector}`"),
            Self::CursorAllowed(selector) => write!(f, "cursor allowed on `{selector}`"),
            Self::UrlContains(part) => write!(f, "url contains `{part}`"),
            Self::UrlOmits(part) => write!(f, "url omits `{part}`"),
            Self::UrlIs(url) => write!(f, "url is `{url}`"),
            Self::BodyTextIs(text) => write!(f, "body text is `{text}`"),
            Self::AnyOf(items) => join(f, " or ", items),
            Self::AllOf(items) => join(f, " and ", items),
        }
    }
}

/// Poll-until-deadline waits over a [`PageDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waits {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Waits {
    fn default() -> Self {
        Self {
            timeout: WAIT_TIMEOUT,
            poll_interval: WAIT_POLL_INTERVAL,
        }
    }
}

impl Waits {
    /// Wait until `condition` holds.
    ///
    /// Driver faults while polling count as "not yet". The last one is
    /// reported with the timeout.
    pub async fn until<D: PageDriver>(
        &self,
        driver: &mut D,
        condition: &Condition,
    ) -> Result<(), AutomationFault> {
        let mut poll = Polling::new(self);
        loop {
            if poll.check(condition.holds(driver).await) == Some(true) {
                return Ok(());
            }
            poll.tick(|| condition.to_string()).await?;
        }
    }

    pub async fn located<D: PageDriver>(
        &self,
        driver: &mut D,
        selector: &'static str,
    ) -> Result<D::Element, AutomationFault> {
        let mut poll = Polling::new(self);
        loop {
            if let Some(Some(element)) = poll.check(find(driver, selector).await) {
                return Ok(element);
            }
            poll.tick(|| Condition::Located(selector).to_string())
                .await?;
        }
    }

    pub async fn clickable<D: PageDriver>(
        &self,
        driver: &mut D,
        selector: &'static str,
    ) -> Result<D::Element, AutomationFault> {
        let mut poll = Polling::new(self);
        loop {
            if let Some(Some(element)) = poll.check(find(driver, selector).await)
                && poll.check(driver.is_clickable(&element).await) == Some(true)
            {
                return Ok(element);
            }
            poll.tick(|| Condition::Clickable(selector).to_string())
                .await?;
        }
    }

    /// Wait for an element matching `selector` to render non-empty text.
    pub async fn text<D: PageDriver>(
        &self,
        driver: &mut D,
        selector: &'static str,
    ) -> Result<String, AutomationFault> {
        let mut poll = Polling::new(self);
        loop {
            if let Some(Some(text)) = poll.check(first_text(driver, selector).await) {
                return Ok(text);
            }
            poll.tick(|| format!("text in `{selector}`")).await?;
        }
    }
}

/// Deadline and last swallowed fault of one wait.
struct Polling<'w> {
    waits: &'w Waits,
    deadline: Instant,
    last_fault: Option<AutomationFault>,
}

impl<'w> Polling<'w> {
    fn new(waits: &'w Waits) -> Self {
        Self {
            waits,
            deadline: Instant::now() + waits.timeout,
            last_fault: None,
        }
    }

    fn check<T>(&mut self, result: Result<T, AutomationFault>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(fault) => {
                tracing::debug!(error = %fault, "Page check failed; polling again");
                self.last_fault = Some(fault);
                None
            }
        }
    }

    async fn tick(&mut self, condition: impl FnOnce() -> String) -> Result<(), AutomationFault> {
        let now = Instant::now();
        if now >= self.deadline {
            return Err(AutomationFault::Timeout {
                condition: condition(),
                waited: self.waits.timeout,
                last_fault: self.last_fault.take().map(Box::new),
            });
        }
        sleep(self.waits.poll_interval.min(self.deadline - now)).await;
        Ok(())
    }
}
