//! In-memory page for exercising the booking stages without Chrome.
//!
//! A [`FakePage`] serves a static HTML fixture parsed with `scraper`, so the
//! same CSS the real driver sends to Chrome is matched here. Page reactions
//! are scripted with attributes on the fixture:
//!
//! - `hidden`: in the DOM but not visible until revealed
//! - `data-detached`: not in the DOM until revealed
//! - `data-reveals="id ..."`: clicking reveals the listed elements
//! - `data-removes="id ..."`: clicking detaches the listed elements
//! - `data-fill-reveals="id ..."`: filling the input reveals the listed elements
//! - `data-click-fails`, `data-trial-fails`: the real or trial click errors
//!
//! Every goto, click, fill and close is recorded as a [`PageEvent`].

use crate::core::{ClickOptions, PageDriver};
use crate::errors::{BookingError, Result};
use crate::locator::{Page, Step, Target};
use async_trait::async_trait;
use regex::RegexBuilder;
use scraper::{ElementRef, Html, Selector as CssSelector};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Goto(String),
    Click { element: String, trial: bool },
    Fill { element: String, value: String },
    Screenshot,
    Close,
}

#[derive(Debug, Default)]
struct Overlay {
    revealed: HashSet<String>,
    removed: HashSet<String>,
    values: HashMap<String, String>,
    events: Vec<PageEvent>,
}

#[derive(Clone)]
pub struct FakePage {
    html: Arc<String>,
    overlay: Arc<Mutex<Overlay>>,
}

impl FakePage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: Arc::new(html.into()),
            overlay: Arc::new(Mutex::new(Overlay::default())),
        }
    }

    pub fn page(&self) -> Page {
        Page::new(Arc::new(self.clone()))
    }

    /// Make the element with this id attached and visible
    pub fn reveal(&self, id: &str) {
        let mut overlay = self.lock();
        overlay.removed.remove(id);
        overlay.revealed.insert(id.to_string());
    }

    pub fn remove(&self, id: &str) {
        self.lock().removed.insert(id.to_string());
    }

    /// Set an input value as if a person had typed it
    pub fn set_value(&self, id: &str, value: &str) {
        self.lock()
            .values
            .insert(id.to_string(), value.to_string());
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.lock().events.clone()
    }

    /// Labels of elements that received a real click, in order
    pub fn clicks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PageEvent::Click {
                    element,
                    trial: false,
                } => Some(element),
                _ => None,
            })
            .collect()
    }

    /// `(element, value)` pairs in fill order
    pub fn fills(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PageEvent::Fill { element, value } => Some((element, value)),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == PageEvent::Close)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Overlay> {
        self.overlay
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Parse the fixture and hand a view of it, plus the mutable overlay, to `f`.
    fn with_dom<T>(&self, f: impl FnOnce(&Dom<'_>, &mut Overlay) -> Result<T>) -> Result<T> {
        let html = Html::parse_document(&self.html);
        let dom = Dom::new(&html);
        let mut overlay = self.lock();
        f(&dom, &mut overlay)
    }

    fn first_match<'a>(
        dom: &Dom<'a>,
        overlay: &Overlay,
        target: &Target,
    ) -> Result<ElementRef<'a>> {
        dom.resolve(target, overlay)?
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::LocatorNotFound(target.to_string()))
    }
}

struct Dom<'a> {
    html: &'a Html,
}

impl<'a> Dom<'a> {
    fn new(html: &'a Html) -> Self {
        Self { html }
    }

    fn resolve(&self, target: &Target, overlay: &Overlay) -> Result<Vec<ElementRef<'a>>> {
        let mut current: Option<Vec<ElementRef<'a>>> = None;

        for step in target.steps() {
            let next = match step {
                Step::Nth(index) => current
                    .unwrap_or_default()
                    .get(*index)
                    .copied()
                    .into_iter()
                    .collect(),
                Step::Select(selector) => {
                    let css = CssSelector::parse(&selector.query()).map_err(|e| {
                        BookingError::JavaScriptFailed(format!(
                            "invalid selector '{}': {:?}",
                            selector, e
                        ))
                    })?;
                    let name = selector
                        .name_pattern()
                        .map(|pattern| {
                            RegexBuilder::new(pattern)
                                .case_insensitive(true)
                                .build()
                                .map_err(|e| {
                                    BookingError::JavaScriptFailed(format!(
                                        "invalid name pattern '{}': {}",
                                        pattern, e
                                    ))
                                })
                        })
                        .transpose()?;

                    let candidates: Vec<ElementRef<'a>> = match &current {
                        None => self.html.select(&css).collect(),
                        Some(bases) => bases
                            .iter()
                            .flat_map(|base| base.select(&css).collect::<Vec<_>>())
                            .collect(),
                    };

                    let mut found: Vec<ElementRef<'a>> = Vec::new();
                    for el in candidates {
                        if found.contains(&el) || !self.is_attached(el, overlay) {
                            continue;
                        }
                        if let Some(text) = selector.text_filter() {
                            if !text_of(el).to_lowercase().contains(&text.to_lowercase()) {
                                continue;
                            }
                        }
                        if let Some(name) = &name {
                            if !name.is_match(&accessible_name(el)) {
                                continue;
                            }
                        }
                        found.push(el);
                    }
                    found.sort_by_key(|el| self.position(*el));
                    found
                }
            };
            current = Some(next);
        }

        Ok(current.unwrap_or_default())
    }

    fn position(&self, el: ElementRef<'a>) -> usize {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .position(|candidate| candidate == el)
            .unwrap_or(usize::MAX)
    }

    fn is_attached(&self, el: ElementRef<'a>, overlay: &Overlay) -> bool {
        self_and_ancestors(el).all(|node| {
            let id = node.value().id();
            let removed = id.map_or(false, |id| overlay.removed.contains(id));
            let revealed = id.map_or(false, |id| overlay.revealed.contains(id));
            !removed && (node.value().attr("data-detached").is_none() || revealed)
        })
    }

    fn is_visible(&self, el: ElementRef<'a>, overlay: &Overlay) -> bool {
        self.is_attached(el, overlay)
            && self_and_ancestors(el).all(|node| {
                let revealed = node
                    .value()
                    .id()
                    .map_or(false, |id| overlay.revealed.contains(id));
                node.value().attr("hidden").is_none() || revealed
            })
    }
}

fn self_and_ancestors<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    std::iter::once(el).chain(el.ancestors().filter_map(ElementRef::wrap))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn accessible_name(el: ElementRef<'_>) -> String {
    el.value()
        .attr("aria-label")
        .map(str::to_string)
        .or_else(|| Some(text_of(el)).filter(|text| !text.is_empty()))
        .or_else(|| el.value().attr("value").map(str::to_string))
        .unwrap_or_default()
}

/// Label used in recorded events: the element id, else `ancestor-id/name`
/// for named inputs, else its text, else its tag.
fn describe(el: ElementRef<'_>) -> String {
    if let Some(id) = el.value().id() {
        return id.to_string();
    }
    let own = el
        .value()
        .attr("name")
        .map(str::to_string)
        .or_else(|| Some(text_of(el)).filter(|text| !text.is_empty()))
        .unwrap_or_else(|| el.value().name().to_string());
    match el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find_map(|a| a.value().id())
    {
        Some(scope) => format!("{}/{}", scope, own),
        None => own,
    }
}

fn id_list(el: ElementRef<'_>, attr: &str) -> Vec<String> {
    el.value()
        .attr(attr)
        .map(|ids| ids.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn apply_effects(overlay: &mut Overlay, el: ElementRef<'_>, reveal_attr: &str) {
    for id in id_list(el, reveal_attr) {
        overlay.removed.remove(&id);
        overlay.revealed.insert(id);
    }
    if reveal_attr == "data-reveals" {
        for id in id_list(el, "data-removes") {
            overlay.revealed.remove(&id);
            overlay.removed.insert(id);
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.lock().events.push(PageEvent::Goto(url.to_string()));
        Ok(())
    }

    async fn count(&self, target: &Target) -> Result<usize> {
        self.with_dom(|dom, overlay| Ok(dom.resolve(target, overlay)?.len()))
    }

    async fn is_visible(&self, target: &Target) -> Result<bool> {
        self.with_dom(|dom, overlay| {
            Ok(dom
                .resolve(target, overlay)?
                .first()
                .map_or(false, |el| dom.is_visible(*el, overlay)))
        })
    }

    async fn is_enabled(&self, target: &Target) -> Result<bool> {
        self.with_dom(|dom, overlay| {
            let el = Self::first_match(dom, overlay, target)?;
            Ok(el.value().attr("disabled").is_none())
        })
    }

    async fn inner_text(&self, target: &Target) -> Result<String> {
        self.with_dom(|dom, overlay| Ok(text_of(Self::first_match(dom, overlay, target)?)))
    }

    async fn input_value(&self, target: &Target) -> Result<String> {
        self.with_dom(|dom, overlay| {
            let el = Self::first_match(dom, overlay, target)?;
            let typed = el.value().id().and_then(|id| overlay.values.get(id).cloned());
            Ok(typed
                .or_else(|| el.value().attr("value").map(str::to_string))
                .unwrap_or_default())
        })
    }

    async fn click(&self, target: &Target, options: ClickOptions) -> Result<()> {
        self.with_dom(|dom, overlay| {
            let el = Self::first_match(dom, overlay, target)?;
            let label = describe(el);
            if !dom.is_visible(el, overlay) {
                return Err(BookingError::ActionFailed(format!("{} is not visible", label)));
            }
            if el.value().attr("disabled").is_some() {
                return Err(BookingError::ActionFailed(format!("{} is disabled", label)));
            }
            if options.trial && el.value().attr("data-trial-fails").is_some() {
                return Err(BookingError::ActionFailed(format!(
                    "another element would receive the click on {}",
                    label
                )));
            }
            if !options.trial && el.value().attr("data-click-fails").is_some() {
                return Err(BookingError::ActionFailed(format!("click on {} failed", label)));
            }

            overlay.events.push(PageEvent::Click {
                element: label,
                trial: options.trial,
            });
            if !options.trial {
                apply_effects(overlay, el, "data-reveals");
            }
            Ok(())
        })
    }

    async fn fill(&self, target: &Target, value: &str) -> Result<()> {
        self.with_dom(|dom, overlay| {
            let el = Self::first_match(dom, overlay, target)?;
            let label = describe(el);
            if !dom.is_visible(el, overlay) {
                return Err(BookingError::ActionFailed(format!("{} is not visible", label)));
            }
            if let Some(id) = el.value().id() {
                overlay.values.insert(id.to_string(), value.to_string());
            }
            overlay.events.push(PageEvent::Fill {
                element: label,
                value: value.to_string(),
            });
            apply_effects(overlay, el, "data-fill-reveals");
            Ok(())
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.lock().events.push(PageEvent::Screenshot);
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn close(&self) -> Result<()> {
        self.lock().events.push(PageEvent::Close);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Selector;

    const FIXTURE: &str = r#"
        <main>
          <input id="city" data-fill-reveals="suggestions">
          <ul id="suggestions" data-detached>
            <li role="option" id="opt-1" data-removes="suggestions" data-reveals="picked">Одеса</li>
          </ul>
          <p id="picked" hidden>ok</p>
          <button id="broken" data-click-fails>Broken</button>
          <button id="covered" data-trial-fails>Covered</button>
          <button id="off" disabled>Off</button>
          <section id="form"><input name="first_name"></section>
        </main>
    "#;

    fn target(css: &str) -> Target {
        Target::new(Selector::css(css))
    }

    #[tokio::test]
    async fn test_fill_and_click_effects() {
        let fake = FakePage::new(FIXTURE);
        assert_eq!(fake.count(&target("[role='option']")).await.unwrap(), 0);

        fake.fill(&target("#city"), "Одеса").await.unwrap();
        assert_eq!(fake.count(&target("[role='option']")).await.unwrap(), 1);
        assert_eq!(fake.input_value(&target("#city")).await.unwrap(), "Одеса");

        fake.click(&target("[role='option']"), ClickOptions::default())
            .await
            .unwrap();
        assert_eq!(fake.count(&target("[role='option']")).await.unwrap(), 0);
        assert!(fake.is_visible(&target("#picked")).await.unwrap());
        assert_eq!(fake.clicks(), vec!["opt-1"]);
    }

    #[tokio::test]
    async fn test_scripted_click_failures() {
        let fake = FakePage::new(FIXTURE);
        let trial = ClickOptions::trial();
        let real = ClickOptions::default();

        assert!(fake.click(&target("#broken"), trial).await.is_ok());
        assert!(fake.click(&target("#broken"), real).await.is_err());
        assert!(fake.click(&target("#covered"), trial).await.is_err());
        assert!(fake.click(&target("#off"), trial).await.is_err());
        assert!(matches!(
            fake.click(&target("#nope"), real).await,
            Err(BookingError::LocatorNotFound(_))
        ));
        assert!(fake.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_named_inputs_are_described_by_scope() {
        let fake = FakePage::new(FIXTURE);
        fake.fill(&target("input[name='first_name']"), "Леся")
            .await
            .unwrap();
        assert_eq!(
            fake.fills(),
            vec![("form/first_name".to_string(), "Леся".to_string())]
        );
    }

    #[tokio::test]
    async fn test_invalid_css_is_an_error() {
        let fake = FakePage::new(FIXTURE);
        assert!(matches!(
            fake.count(&target("p[=")).await,
            Err(BookingError::JavaScriptFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_text_filter_ignores_case() {
        let fake = FakePage::new(FIXTURE);
        let broken = Target::new(Selector::text("button", "broken"));
        assert_eq!(fake.count(&broken).await.unwrap(), 1);
        assert_eq!(fake.inner_text(&broken).await.unwrap(), "Broken");
    }

    #[tokio::test]
    async fn test_is_enabled_reads_disabled_attribute() {
        let fake = FakePage::new(FIXTURE);
        assert!(!fake.is_enabled(&target("#off")).await.unwrap());
        assert!(fake.is_enabled(&target("#broken")).await.unwrap());
        assert!(fake.is_enabled(&target("#nope")).await.is_err());
    }
}
