//! Element addressing on top of a [`PageDriver`].
//!
//! A [`Locator`] is a lazy description of where an element lives; nothing is
//! looked up until one of its async operations runs, and every operation
//! resolves the target again against the live page.

pub mod selector;
pub mod strategy;

pub use selector::{role_query, Selector, Step, Target};
pub use strategy::{first_visible, Strategy};

use crate::core::{ClickOptions, PageDriver, TimingConfig};
use crate::errors::{BookingError, Result};
use crate::utils::poll::{poll_until, DEFAULT_POLL_INTERVAL};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long clicks and fills wait for their element, and how often element
/// waits re-check the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTiming {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for ActionTiming {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl From<&TimingConfig> for ActionTiming {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            timeout: Duration::from_millis(timing.action_timeout_ms),
            interval: Duration::from_millis(timing.element_poll_interval_ms),
        }
    }
}

/// The single page a run works on.
#[derive(Clone)]
pub struct Page {
    driver: Arc<dyn PageDriver>,
    timing: ActionTiming,
}

impl Page {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self {
            driver,
            timing: ActionTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: ActionTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> ActionTiming {
        self.timing
    }

    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator {
            driver: self.driver.clone(),
            target: Target::new(selector.into()),
            timing: self.timing,
        }
    }

    pub fn get_by_role(&self, role: &str, name: &str) -> Locator {
        self.locator(Selector::role(role, name))
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.driver.goto(url).await
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.driver.screenshot().await
    }

    pub async fn close(&self) -> Result<()> {
        self.driver.close().await
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// At least one match is in the DOM
    Attached,
    /// No match is in the DOM
    Detached,
    Visible,
    Hidden,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone)]
pub struct Locator {
    driver: Arc<dyn PageDriver>,
    target: Target,
    timing: ActionTiming,
}

impl Locator {
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Narrow to descendants of this locator's matches
    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        self.with_step(Step::Select(selector.into()))
    }

    pub fn nth(&self, index: usize) -> Locator {
        self.with_step(Step::Nth(index))
    }

    pub fn first(&self) -> Locator {
        self.nth(0)
    }

    fn with_step(&self, step: Step) -> Locator {
        Locator {
            driver: self.driver.clone(),
            target: self.target.then(step),
            timing: self.timing,
        }
    }

    pub async fn count(&self) -> Result<usize> {
        self.driver.count(&self.target).await
    }

    pub async fn is_visible(&self) -> Result<bool> {
        self.driver.is_visible(&self.target).await
    }

    pub async fn is_enabled(&self) -> Result<bool> {
        self.driver.is_enabled(&self.target).await
    }

    pub async fn inner_text(&self) -> Result<String> {
        self.driver.inner_text(&self.target).await
    }

    pub async fn input_value(&self) -> Result<String> {
        self.driver.input_value(&self.target).await
    }

    /// Wait until the element can be clicked, then click it
    pub async fn click(&self) -> Result<()> {
        self.wait_clickable().await?;
        self.driver.click(&self.target, ClickOptions::default()).await
    }

    /// Wait until the element can be clicked without clicking it
    pub async fn trial_click(&self) -> Result<()> {
        self.wait_clickable().await
    }

    /// Wait until the element is visible, then type `value` into it
    pub async fn fill(&self, value: &str) -> Result<()> {
        self.wait_for(WaitState::Visible, self.timing.timeout).await?;
        self.driver.fill(&self.target, value).await
    }

    async fn wait_clickable(&self) -> Result<()> {
        let what = format!("{} to be clickable", self.target);
        let ready = poll_until(&what, self.timing.interval, self.timing.timeout, || async move {
            self.driver
                .click(&self.target, ClickOptions::trial())
                .await
                .is_ok()
        })
        .await;
        if ready.is_ok() {
            return Ok(());
        }
        // the last refusal says why the element never became clickable
        match self.driver.click(&self.target, ClickOptions::trial()).await {
            Ok(()) => Ok(()),
            Err(reason) => Err(BookingError::TimeoutError(format!(
                "{} ({} ms): {}",
                what,
                self.timing.timeout.as_millis(),
                reason
            ))),
        }
    }

    /// Wait until the target reaches `state`, failing with a timeout error
    /// once `timeout` has passed. Driver errors while probing count as
    /// "not yet".
    pub async fn wait_for(&self, state: WaitState, timeout: Duration) -> Result<()> {
        let what = format!("{} to be {}", self.target, state);
        poll_until(&what, self.timing.interval, timeout, || async move {
            let reached = match state {
                WaitState::Attached => self.count().await.map(|n| n > 0),
                WaitState::Detached => self.count().await.map(|n| n == 0),
                WaitState::Visible => self.is_visible().await,
                WaitState::Hidden => self.is_visible().await.map(|visible| !visible),
            };
            reached.unwrap_or_else(|err| {
                debug!(target = %self.target, error = %err, "check failed while waiting");
                false
            })
        })
        .await
    }

    /// Fail with [`BookingError::LocatorNotFound`] unless something matches
    pub async fn require(&self, description: &str) -> Result<&Self> {
        if self.count().await? == 0 {
            return Err(BookingError::LocatorNotFound(format!(
                "{} ({})",
                description, self.target
            )));
        }
        Ok(self)
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("target", &self.target.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;

    const FORM: &str = r#"
        <form>
          <input id="from" placeholder="Звідки">
          <ul id="options" data-detached>
            <li role="option" id="opt-kyiv">Київ-Пасажирський</li>
            <li role="option" id="opt-kyiv-2">Київ-Волинський</li>
          </ul>
          <div id="banner" hidden>Loading</div>
          <button id="next" hidden>Далі</button>
        </form>
    "#;

    #[tokio::test]
    async fn test_nested_and_nth_resolution() {
        let fake = FakePage::new(FORM);
        let page = fake.page();
        let options = page.locator("[role='option']");

        assert_eq!(options.count().await.unwrap(), 0);
        fake.reveal("options");
        assert_eq!(options.count().await.unwrap(), 2);
        assert_eq!(
            options.nth(1).inner_text().await.unwrap(),
            "Київ-Волинський"
        );
        let inside = page.locator("#options").locator("li").first();
        assert_eq!(inside.inner_text().await.unwrap(), "Київ-Пасажирський");
        assert_eq!(options.nth(5).count().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_visible_sees_late_reveal() {
        let fake = FakePage::new(FORM);
        let page = fake.page();
        let banner = page.locator("#banner");
        assert!(!banner.is_visible().await.unwrap());

        let revealer = fake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            revealer.reveal("banner");
        });

        banner
            .wait_for(WaitState::Visible, Duration::from_secs(10))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out_with_target_in_message() {
        let fake = FakePage::new(FORM);
        let err = fake
            .page()
            .locator("[role='option']")
            .wait_for(WaitState::Attached, Duration::from_secs(2))
            .await
            .unwrap_err();

        match err {
            BookingError::TimeoutError(what) => {
                assert!(what.contains("[role='option'] to be attached"))
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_waits_for_the_element_to_show() {
        let fake = FakePage::new(FORM);
        let next = fake.page().locator("#next");

        let site = fake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            site.reveal("next");
        });

        let started = tokio::time::Instant::now();
        next.click().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(fake.clicks(), vec!["next"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_gives_up_after_the_action_timeout() {
        let fake = FakePage::new(FORM);
        let page = fake.page().with_timing(ActionTiming {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(250),
        });

        let started = tokio::time::Instant::now();
        let err = page.locator("#next").click().await.unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(2));
        match err {
            BookingError::TimeoutError(what) => {
                assert!(what.contains("#next to be clickable (2000 ms)"), "{}", what);
                assert!(what.contains("not visible"), "{}", what);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(fake.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_waits_for_the_field_to_attach() {
        let fake = FakePage::new(
            r#"<form><input id="late" data-detached></form>"#,
        );
        let site = fake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            site.reveal("late");
        });

        fake.page().locator("#late").fill("Київ").await.unwrap();
        assert_eq!(fake.fills(), vec![("late".to_string(), "Київ".to_string())]);
    }

    #[test]
    fn test_action_timing_follows_config() {
        let timing = TimingConfig {
            action_timeout_ms: 5_000,
            element_poll_interval_ms: 40,
            ..TimingConfig::default()
        };
        assert_eq!(
            ActionTiming::from(&timing),
            ActionTiming {
                timeout: Duration::from_secs(5),
                interval: Duration::from_millis(40),
            }
        );
    }

    #[tokio::test]
    async fn test_require_reports_missing_element() {
        let fake = FakePage::new(FORM);
        let page = fake.page();
        assert!(page.locator("#from").require("origin").await.is_ok());
        assert!(matches!(
            page.locator("#to").require("destination").await,
            Err(BookingError::LocatorNotFound(_))
        ));
    }
}
