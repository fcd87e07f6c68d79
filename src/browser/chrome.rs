use crate::core::{BrowserConfig, ClickOptions, PageDriver};
use crate::errors::{BookingError, Result};
use crate::locator::{Step, Target};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Resolves a step list the same way on every call: `select` steps query
/// inside the previous matches and keep document order, `nth` steps narrow
/// to one element.
const RESOLVER: &str = r#"
function __uzbName(el) {
    return el.getAttribute('aria-label') || (el.innerText || '').trim() || el.value || '';
}
function __uzbText(el) {
    return (el.innerText || el.textContent || '').split(/\s+/).filter(Boolean).join(' ').toLowerCase();
}
function __uzbResolve(steps) {
    let current = null;
    for (const step of steps) {
        if (step.kind === 'nth') {
            current = current && current[step.index] ? [current[step.index]] : [];
            continue;
        }
        const roots = current === null ? [document] : current;
        const name = step.name === null ? null : new RegExp(step.name, 'i');
        const text = step.text === null ? null : step.text.toLowerCase();
        const found = [];
        for (const root of roots) {
            for (const el of root.querySelectorAll(step.css)) {
                if (found.includes(el)) continue;
                if (text !== null && !__uzbText(el).includes(text)) continue;
                if (name !== null && !name.test(__uzbName(el))) continue;
                found.push(el);
            }
        }
        found.sort((a, b) => a === b ? 0
            : (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING ? -1 : 1));
        current = found;
    }
    return current || [];
}
function __uzbVisible(el) {
    if (!el || !el.isConnected) return false;
    const style = getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}
"#;

const TRIAL_CLICK: &str = r#"
const el = els[0];
if (!el) return { found: false };
el.scrollIntoView({ block: 'center', inline: 'center' });
if (!__uzbVisible(el)) return { found: true, value: 'element is not visible' };
if (el.disabled || el.getAttribute('aria-disabled') === 'true') return { found: true, value: 'element is disabled' };
const rect = el.getBoundingClientRect();
const hit = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
if (!hit || !(el === hit || el.contains(hit))) return { found: true, value: 'another element would receive the click' };
return { found: true, value: null };
"#;

const CLEAR_INPUT: &str = r#"function() {
    this.focus();
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
}"#;

#[derive(Debug, Deserialize)]
struct Lookup<T> {
    found: bool,
    value: Option<T>,
}

/// [`PageDriver`] backed by a single Chrome tab over the DevTools protocol.
pub struct ChromeDriver {
    browser: Mutex<Option<Browser>>,
    tab: Arc<Tab>,
    slow_mo: Duration,
}

impl ChromeDriver {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );
        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];
        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }
        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .idle_browser_timeout(Duration::from_millis(config.idle_timeout_ms))
            .build()
            .map_err(|e| BookingError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| BookingError::LaunchFailed(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BookingError::LaunchFailed(format!("cannot open a tab: {}", e)))?;

        info!(headless = config.headless, "Chrome launched");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            tab,
            slow_mo: Duration::from_millis(config.slow_mo_ms),
        })
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }

    /// Evaluate `body` with `els` bound to the resolved matches and decode
    /// what it returns.
    fn evaluate<T: DeserializeOwned>(&self, target: &Target, body: &str) -> Result<T> {
        let script = format!(
            "(function() {{ {} const els = __uzbResolve({}); return JSON.stringify((function() {{ {} }})()); }})()",
            RESOLVER,
            steps_json(target),
            body
        );
        let result = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| BookingError::JavaScriptFailed(format!("{}: {}", target, e)))?;
        let raw = result
            .value
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BookingError::JavaScriptFailed(format!("{}: script returned no value", target))
            })?;
        Ok(serde_json::from_str(raw)?)
    }

    fn lookup<T: DeserializeOwned>(&self, target: &Target, body: &str) -> Result<Option<T>> {
        let lookup: Lookup<T> = self.evaluate(target, body)?;
        if !lookup.found {
            return Err(BookingError::LocatorNotFound(target.to_string()));
        }
        Ok(lookup.value)
    }

    /// Tag the first match so the protocol-level element API can find it.
    fn mark(&self, target: &Target) -> Result<String> {
        let handle = Uuid::new_v4().to_string();
        let body = format!(
            "if (!els[0]) return {{ found: false }}; els[0].setAttribute('data-uzb-handle', '{}'); return {{ found: true, value: null }};",
            handle
        );
        self.lookup::<Value>(target, &body)?;
        Ok(format!("[data-uzb-handle='{}']", handle))
    }

    fn unmark(&self, handle: &str) {
        let script = format!(
            "(function() {{ const el = document.querySelector(\"{}\"); if (el) el.removeAttribute('data-uzb-handle'); }})()",
            handle
        );
        if let Err(e) = self.tab.evaluate(&script, false) {
            debug!(error = %e, "could not clear element handle");
        }
    }
}

/// The step list as the JSON literal the resolver expects.
fn steps_json(target: &Target) -> String {
    let steps: Vec<Value> = target
        .steps()
        .iter()
        .map(|step| match step {
            Step::Select(selector) => json!({
                "kind": "select",
                "css": selector.query(),
                "text": selector.text_filter(),
                "name": selector.name_pattern(),
            }),
            Step::Nth(index) => json!({ "kind": "nth", "index": index }),
        })
        .collect();
    Value::Array(steps).to_string()
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| BookingError::NavigationFailed(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| BookingError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn count(&self, target: &Target) -> Result<usize> {
        self.evaluate(target, "return els.length;")
    }

    async fn is_visible(&self, target: &Target) -> Result<bool> {
        self.evaluate(target, "return __uzbVisible(els[0]);")
    }

    async fn is_enabled(&self, target: &Target) -> Result<bool> {
        let enabled = self.lookup(
            target,
            "return els[0] ? { found: true, value: !els[0].disabled && els[0].getAttribute('aria-disabled') !== 'true' } : { found: false };",
        )?;
        Ok(enabled.unwrap_or(false))
    }

    async fn inner_text(&self, target: &Target) -> Result<String> {
        let text = self.lookup(
            target,
            "return els[0] ? { found: true, value: els[0].innerText } : { found: false };",
        )?;
        Ok(text.unwrap_or_default())
    }

    async fn input_value(&self, target: &Target) -> Result<String> {
        let value = self.lookup(
            target,
            "return els[0] ? { found: true, value: els[0].value } : { found: false };",
        )?;
        Ok(value.unwrap_or_default())
    }

    async fn click(&self, target: &Target, options: ClickOptions) -> Result<()> {
        if let Some(reason) = self.lookup::<String>(target, TRIAL_CLICK)? {
            return Err(BookingError::ActionFailed(format!("{}: {}", target, reason)));
        }
        if options.trial {
            return Ok(());
        }

        self.pace().await;
        let handle = self.mark(target)?;
        let clicked = self
            .tab
            .find_element(&handle)
            .and_then(|element| {
                element.click()?;
                Ok(())
            });
        self.unmark(&handle);
        clicked.map_err(|e| BookingError::ActionFailed(format!("click on {}: {}", target, e)))
    }

    async fn fill(&self, target: &Target, value: &str) -> Result<()> {
        self.pace().await;
        let handle = self.mark(target)?;
        let filled = self.tab.find_element(&handle).and_then(|element| {
            element.call_js_fn(CLEAR_INPUT, vec![], false)?;
            element.type_into(value)?;
            Ok(())
        });
        self.unmark(&handle);
        filled.map_err(|e| BookingError::ActionFailed(format!("fill {}: {}", target, e)))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| BookingError::ActionFailed(format!("screenshot: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        let Some(browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = self.tab.close(true) {
            warn!(error = %e, "tab did not close cleanly");
        }
        drop(browser);
        info!("Browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Selector;

    #[test]
    fn test_steps_json_encodes_every_step_kind() {
        let target = Target::new(Selector::css(".TripUnitWagon"))
            .then(Step::Nth(2))
            .then(Step::Select(Selector::text("a", "Перейти")))
            .then(Step::Select(Selector::role("button", "Знайти|search")));

        let steps: Value = serde_json::from_str(&steps_json(&target)).unwrap();
        assert_eq!(
            steps,
            json!([
                { "kind": "select", "css": ".TripUnitWagon", "text": null, "name": null },
                { "kind": "nth", "index": 2 },
                { "kind": "select", "css": "a", "text": "Перейти", "name": null },
                {
                    "kind": "select",
                    "css": "button, [role='button'], input[type='button'], input[type='submit']",
                    "text": null,
                    "name": "Знайти|search"
                }
            ])
        );
    }

    #[test]
    fn test_lookup_decodes_missing_and_null_values() {
        let missing: Lookup<String> = serde_json::from_str(r#"{"found":false}"#).unwrap();
        assert!(!missing.found);
        let empty: Lookup<String> = serde_json::from_str(r#"{"found":true,"value":null}"#).unwrap();
        assert!(empty.found && empty.value.is_none());
    }
}
