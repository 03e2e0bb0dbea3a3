//! In-memory page for exercising the machine and worker without a browser.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::driver::{DriverFut, PageDriver};
use crate::error::AutomationFault;

const BODY: &str = "body";

#[derive(Debug, Clone)]
pub(crate) struct ScriptedElement {
    text: String,
    clickable: bool,
    cursor: String,
    target: Option<String>,
    blank_reads: usize,
}

impl ScriptedElement {
    pub(crate) fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            clickable: false,
            cursor: "auto".to_string(),
            target: None,
            blank_reads: 0,
        }
    }

    pub(crate) fn button() -> Self {
        Self {
            clickable: true,
            cursor: "pointer".to_string(),
            ..Self::text("")
        }
    }

    pub(crate) fn navigates_to(mut self, url: &str) -> Self {
        self.target = Some(url.to_string());
        self
    }

    pub(crate) fn cursor(mut self, cursor: &str) -> Self {
        self.cursor = cursor.to_string();
        self
    }

    /// Report empty text for the first `reads` reads.
    pub(crate) fn blank_for(mut self, reads: usize) -> Self {
        self.blank_reads = reads;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Screen {
    url: String,
    body: String,
    elements: HashMap<&'static str, ScriptedElement>,
}

impl Screen {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            body: String::new(),
            elements: HashMap::new(),
        }
    }

    pub(crate) fn with(mut self, selector: &'static str, element: ScriptedElement) -> Self {
        self.elements.insert(selector, element);
        self
    }

    pub(crate) fn body(mut self, text: &str) -> Self {
        self.body = text.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Handle(&'static str);

#[derive(Debug, Default)]
pub(crate) struct ScriptedPage {
    screens: HashMap<String, Screen>,
    redirects: HashMap<String, String>,
    current: String,
    navigations: Vec<String>,
    clicks: Vec<&'static str>,
    text_reads: HashMap<&'static str, usize>,
    failing: bool,
    transient_faults: usize,
    panic_on: Option<String>,
    quits: Arc<AtomicUsize>,
}

impl ScriptedPage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn screen(mut self, screen: Screen) -> Self {
        self.screens.insert(screen.url.clone(), screen);
        self
    }

    pub(crate) fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Fail every operation as a dead browser would.
    pub(crate) fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Fail the next `faults` element lookups, then behave normally.
    pub(crate) fn flaky(mut self, faults: usize) -> Self {
        self.transient_faults = faults;
        self
    }

    /// Panic when navigating to `url`.
    pub(crate) fn panic_on(mut self, url: &str) -> Self {
        self.panic_on = Some(url.to_string());
        self
    }

    pub(crate) fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub(crate) fn clicks(&self) -> &[&'static str] {
        &self.clicks
    }

    /// Shared counter of `quit` calls, readable after the page is moved.
    pub(crate) fn quit_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.quits)
    }

    fn check(&self) -> Result<(), AutomationFault> {
        if self.failing {
            return Err(AutomationFault::Browser("scripted browser failure".to_string()));
        }
        Ok(())
    }

    fn go(&mut self, url: &str) {
        self.current = self
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
    }

    fn element(&self, handle: Handle) -> Option<&ScriptedElement> {
        self.screens.get(&self.current)?.elements.get(handle.0)
    }
}

impl PageDriver for ScriptedPage {
    type Element = Handle;

    fn navigate<'a>(&'a mut self, url: &'a str) -> DriverFut<'a, ()> {
        Box::pin(async move {
            self.check()?;
            assert!(
                self.panic_on.as_deref() != Some(url),
                "scripted panic navigating to {url}"
            );
            self.navigations.push(url.to_string());
            self.go(url);
            Ok(())
        })
    }

    fn current_url(&mut self) -> DriverFut<'_, String> {
        Box::pin(async move {
            self.check()?;
            Ok(self.current.clone())
        })
    }

    fn find_all<'a>(&'a mut self, selector: &'a str) -> DriverFut<'a, Vec<Handle>> {
        Box::pin(async move {
            self.check()?;
            if self.transient_faults > 0 {
                self.transient_faults -= 1;
                return Err(AutomationFault::Browser("stale element".to_string()));
            }
            let Some(screen) = self.screens.get(&self.current) else {
                return Ok(Vec::new());
            };
            if selector == BODY {
                return Ok(vec![Handle(BODY)]);
            }
            Ok(screen
                .elements
                .get_key_value(selector)
                .map(|(key, _)| vec![Handle(*key)])
                .unwrap_or_default())
        })
    }

    fn text<'a>(&'a mut self, element: &'a Handle) -> DriverFut<'a, String> {
        Box::pin(async move {
            self.check()?;
            if element.0 == BODY {
                return Ok(self
                    .screens
                    .get(&self.current)
                    .map(|screen| screen.body.clone())
                    .unwrap_or_default());
            }
            let Some(found) = self.element(*element).cloned() else {
                return Err(AutomationFault::MissingElement(element.0.to_string()));
            };
            let reads = self.text_reads.entry(element.0).or_default();
            *reads += 1;
            if *reads <= found.blank_reads {
                return Ok(String::new());
            }
            Ok(found.text)
        })
    }

    fn is_clickable<'a>(&'a mut self, element: &'a Handle) -> DriverFut<'a, bool> {
        Box::pin(async move {
            self.check()?;
            Ok(self.element(*element).is_some_and(|found| found.clickable))
        })
    }

    fn cursor<'a>(&'a mut self, element: &'a Handle) -> DriverFut<'a, String> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .element(*element)
                .map(|found| found.cursor.clone())
                .unwrap_or_default())
        })
    }

    fn click<'a>(&'a mut self, element: &'a Handle) -> DriverFut<'a, ()> {
        Box::pin(async move {
            self.check()?;
            let Some(found) = self.element(*element) else {
                return Err(AutomationFault::MissingElement(element.0.to_string()));
            };
            let target = found.target.clone();
            self.clicks.push(element.0);
            if let Some(target) = target {
                self.go(&target);
            }
            Ok(())
        })
    }

    fn quit(&mut self) -> DriverFut<'_, ()> {
        Box::pin(async move {
            self.quits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
