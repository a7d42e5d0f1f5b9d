use crate::capture::ResponseSink;
use crate::Result;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Result of poking an element that may legitimately not be there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Clicked,
    Absent,
}

pub trait BrowserDriver {
    /// Navigate and wait for the page load to settle.
    fn goto(&mut self, url: &str) -> Result<()>;

    fn reload(&mut self) -> Result<()>;

    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;

    /// Click the element if it shows up within `timeout`. Not finding it is
    /// `Presence::Absent`; finding it and failing to click is an error.
    fn click_optional(&mut self, locator: &Locator, timeout: Duration) -> Result<Presence>;

    fn fill(&mut self, locator: &Locator, text: &str, timeout: Duration) -> Result<()>;

    fn page_html(&mut self) -> Result<String>;

    /// Forward every network response the page receives into `sink`.
    fn observe_responses(&mut self, sink: ResponseSink) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Owns a driver and closes it when dropped, including on early returns and panics.
pub struct BrowserGuard<D: BrowserDriver> {
    driver: D,
    closed: bool,
}

impl<D: BrowserDriver> BrowserGuard<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            closed: false,
        }
    }

    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.driver.close();
        tracing::info!(event = "browser_closed", ok = result.is_ok());
        result
    }
}

impl<D: BrowserDriver> Deref for BrowserGuard<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.driver
    }
}

impl<D: BrowserDriver> DerefMut for BrowserGuard<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: BrowserDriver> Drop for BrowserGuard<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(event = "browser_close_failed", error = %err);
        }
    }
}
