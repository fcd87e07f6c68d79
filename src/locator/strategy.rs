//! Ordered fallback location.
//!
//! The booking site renders the same control under different labels
//! depending on locale and A/B variant. Callers list the ways to find it in
//! order of preference and take the first one that is actually on screen.

use super::{Locator, Page, Selector};
use std::fmt;
use tracing::debug;

type LocatorFn = Box<dyn Fn(&Page) -> Locator + Send + Sync>;

pub enum Strategy {
    /// A fixed selector evaluated against the whole page
    Selector(Selector),
    /// A locator built from the page at resolution time
    Derived(LocatorFn),
}

impl Strategy {
    pub fn css(css: impl Into<String>) -> Self {
        Strategy::Selector(Selector::css(css))
    }

    pub fn text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Strategy::Selector(Selector::text(css, text))
    }

    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&Page) -> Locator + Send + Sync + 'static,
    {
        Strategy::Derived(Box::new(f))
    }

    pub fn locate(&self, page: &Page) -> Locator {
        match self {
            Strategy::Selector(selector) => page.locator(selector.clone()),
            Strategy::Derived(f) => f(page),
        }
    }
}

impl From<Selector> for Strategy {
    fn from(selector: Selector) -> Self {
        Strategy::Selector(selector)
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Selector(selector) => write!(f, "Selector({})", selector),
            Strategy::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

/// First visible element across `strategies`, tried in order; within one
/// strategy matches are tried in document order. Lookup errors are treated as
/// "no match" so a flaky candidate never hides a later one.
pub async fn first_visible(page: &Page, strategies: &[Strategy]) -> Option<Locator> {
    for strategy in strategies {
        let locator = strategy.locate(page);
        let count = match locator.count().await {
            Ok(count) => count,
            Err(err) => {
                debug!(target = %locator.target(), error = %err, "candidate lookup failed");
                continue;
            }
        };

        for i in 0..count {
            let candidate = locator.nth(i);
            if candidate.is_visible().await.unwrap_or(false) {
                debug!(target = %candidate.target(), "resolved candidate");
                return Some(candidate);
            }
        }
    }
    None
}
