//! In-memory browser that records every interaction.

use super::{Browser, ElementRef, Locator, WaitCondition};
use crate::{CoreError, CoreResult};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    OpenTab(String),
    Find(Locator),
    Wait(Locator, WaitCondition),
    SendKeys(Locator, String),
    Clear(Locator),
    Click(Locator),
    Scroll(Locator),
    Pause(Duration),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingBrowser {
    pub actions: Vec<Action>,
    missing: HashSet<Locator>,
    handles: HashMap<ElementRef, Locator>,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes lookups of `locator` fail as if the page did not have it.
    pub fn without(mut self, locator: Locator) -> Self {
        self.missing.insert(locator);
        self
    }

    pub fn opened_urls(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::OpenTab(url) => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every `(locator, text)` pair typed, in order.
    pub fn sent(&self) -> Vec<(Locator, &str)> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::SendKeys(locator, text) => Some((*locator, text.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Last text typed into `locator`.
    pub fn sent_to(&self, locator: Locator) -> Option<&str> {
        self.sent()
            .into_iter()
            .rev()
            .find(|(l, _)| *l == locator)
            .map(|(_, text)| text)
    }

    pub fn clicked(&self) -> Vec<Locator> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::Click(locator) => Some(*locator),
                _ => None,
            })
            .collect()
    }

    /// Index of the first action matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&Action) -> bool) -> Option<usize> {
        self.actions.iter().position(predicate)
    }

    fn handle(&mut self, locator: Locator) -> ElementRef {
        let element = ElementRef(locator.css());
        self.handles.insert(element.clone(), locator);
        element
    }

    fn locator_of(&self, element: &ElementRef) -> CoreResult<Locator> {
        self.handles.get(element).copied().ok_or_else(|| CoreError::WebDriver {
            error: "stale element reference".into(),
            message: element.0.clone(),
        })
    }
}

impl Browser for RecordingBrowser {
    fn open_tab(&mut self, url: &str) -> CoreResult<()> {
        self.actions.push(Action::OpenTab(url.to_owned()));
        Ok(())
    }

    fn find(&mut self, locator: Locator) -> CoreResult<ElementRef> {
        self.actions.push(Action::Find(locator));
        if self.missing.contains(&locator) {
            return Err(CoreError::ElementNotFound(locator));
        }
        Ok(self.handle(locator))
    }

    fn wait_for(&mut self, locator: Locator, condition: WaitCondition) -> CoreResult<ElementRef> {
        self.actions.push(Action::Wait(locator, condition));
        if self.missing.contains(&locator) {
            return Err(CoreError::WaitTimeout {
                locator,
                seconds: 10,
            });
        }
        Ok(self.handle(locator))
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> CoreResult<()> {
        let locator = self.locator_of(element)?;
        self.actions.push(Action::SendKeys(locator, text.to_owned()));
        Ok(())
    }

    fn clear(&mut self, element: &ElementRef) -> CoreResult<()> {
        let locator = self.locator_of(element)?;
        self.actions.push(Action::Clear(locator));
        Ok(())
    }

    fn click(&mut self, element: &ElementRef) -> CoreResult<()> {
        let locator = self.locator_of(element)?;
        self.actions.push(Action::Click(locator));
        Ok(())
    }

    fn scroll_into_view(&mut self, element: &ElementRef) -> CoreResult<()> {
        let locator = self.locator_of(element)?;
        self.actions.push(Action::Scroll(locator));
        Ok(())
    }

    fn pause(&mut self, duration: Duration) {
        self.actions.push(Action::Pause(duration));
    }
}
