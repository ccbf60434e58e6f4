//! Browser capability used by the form filler.
//!
//! The form filler only needs a handful of operations: open a tab, locate an element,
//! wait for it, type into it, click it. [`Browser`] captures exactly those so the
//! filling sequence can be driven against a real WebDriver session
//! ([`WebDriverSession`]) or an in-memory recorder in tests.

#[cfg(test)]
pub(crate) mod recording;
mod webdriver;

pub use webdriver::WebDriverSession;

use crate::CoreResult;
use std::fmt;
use std::time::Duration;

/// How an element is addressed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator {
    /// `name` attribute.
    Name(&'static str),
    /// `id` attribute.
    Id(&'static str),
    /// Raw CSS selector.
    Css(&'static str),
}

impl Locator {
    /// CSS selector equivalent, as W3C WebDriver has no by-name strategy.
    pub fn css(&self) -> String {
        match self {
            Locator::Name(name) => format!("[name=\"{}\"]", escape_css_string(name)),
            Locator::Id(id) => format!("[id=\"{}\"]", escape_css_string(id)),
            Locator::Css(selector) => (*selector).to_owned(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Name(name) => write!(f, "name={name}"),
            Locator::Id(id) => write!(f, "id={id}"),
            Locator::Css(selector) => write!(f, "css={selector}"),
        }
    }
}

fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Opaque handle to an element located in the current tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

/// Condition an explicit wait polls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Element is attached to the DOM.
    Present,
    /// Element is displayed and enabled.
    Clickable,
}

/// A single browser session, reused sequentially across form fills.
pub trait Browser {
    /// Opens a new tab, switches to it and navigates to `url`.
    fn open_tab(&mut self, url: &str) -> CoreResult<()>;

    /// Locates an element immediately; fails with `CoreError::ElementNotFound`.
    fn find(&mut self, locator: Locator) -> CoreResult<ElementRef>;

    /// Polls until the element satisfies `condition`; fails with `CoreError::WaitTimeout`.
    fn wait_for(&mut self, locator: Locator, condition: WaitCondition) -> CoreResult<ElementRef>;

    /// Types `text` into the element. For file inputs `text` is a local path.
    fn send_keys(&mut self, element: &ElementRef, text: &str) -> CoreResult<()>;

    fn clear(&mut self, element: &ElementRef) -> CoreResult<()>;

    fn click(&mut self, element: &ElementRef) -> CoreResult<()>;

    fn scroll_into_view(&mut self, element: &ElementRef) -> CoreResult<()>;

    /// Blocks for a fixed settle delay.
    fn pause(&mut self, duration: Duration);
}
