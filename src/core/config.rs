use crate::errors::{BookingError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://booking.uz.gov.ua/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub booking: BookingConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
    /// Pause before every page interaction
    pub slow_mo_ms: u64,
    /// How long Chrome may go without a DevTools message before it is dropped
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub base_url: String,
    pub date_policy: DatePolicy,
    /// Where to save a screenshot when a run aborts
    pub failure_screenshot: Option<PathBuf>,
}

/// How the travel date gets into the search form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Open the date picker and click the day cell for the requested date
    #[default]
    Calendar,
    /// Leave the picker to a person and wait until the field holds a value
    Manual,
}

/// Deadlines, poll intervals and settle delays, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub results_timeout_ms: u64,
    pub results_poll_interval_ms: u64,
    pub autocomplete_timeout_ms: u64,
    pub calendar_timeout_ms: u64,
    pub manual_date_timeout_ms: u64,
    pub manual_date_poll_interval_ms: u64,
    /// Seat map appearing after the wagon click
    pub seat_map_timeout_ms: u64,
    /// Seat controls present at the start of seat selection
    pub seat_controls_timeout_ms: u64,
    pub passenger_field_timeout_ms: u64,
    /// How long a click or fill waits for its element to become actionable
    pub action_timeout_ms: u64,
    pub element_poll_interval_ms: u64,

    pub city_settle_ms: u64,
    pub wagon_settle_ms: u64,
    pub seat_map_settle_ms: u64,
    pub seat_click_settle_ms: u64,
    pub proceed_delay_ms: u64,
    pub field_settle_ms: u64,
    pub next_passenger_settle_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport: Viewport::default(),
            user_agent: None,
            args: vec![],
            slow_mo_ms: 120,
            idle_timeout_ms: 600_000,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 900,
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            date_policy: DatePolicy::Calendar,
            failure_screenshot: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            results_timeout_ms: 120_000,
            results_poll_interval_ms: 500,
            autocomplete_timeout_ms: 30_000,
            calendar_timeout_ms: 10_000,
            manual_date_timeout_ms: 300_000,
            manual_date_poll_interval_ms: 500,
            seat_map_timeout_ms: 10_000,
            seat_controls_timeout_ms: 15_000,
            passenger_field_timeout_ms: 10_000,
            action_timeout_ms: 30_000,
            element_poll_interval_ms: 100,

            city_settle_ms: 800,
            wagon_settle_ms: 1000,
            seat_map_settle_ms: 500,
            seat_click_settle_ms: 500,
            proceed_delay_ms: 2000,
            field_settle_ms: 300,
            next_passenger_settle_ms: 1000,
        }
    }
}

impl TimingConfig {
    /// Same deadlines with every fixed delay removed.
    pub fn without_delays(self) -> Self {
        Self {
            city_settle_ms: 0,
            wagon_settle_ms: 0,
            seat_map_settle_ms: 0,
            seat_click_settle_ms: 0,
            proceed_delay_ms: 0,
            field_settle_ms: 0,
            next_passenger_settle_ms: 0,
            ..self
        }
    }
}

impl Config {
    /// Load a JSON config file; keys it leaves out keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BookingError::ConfigurationError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            BookingError::ConfigurationError(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.booking.base_url).map_err(|e| {
            BookingError::ConfigurationError(format!(
                "base_url '{}' is not a valid URL: {}",
                self.booking.base_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BookingError::ConfigurationError(format!(
                "base_url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if self.timing.element_poll_interval_ms == 0 || self.timing.results_poll_interval_ms == 0 {
            return Err(BookingError::ConfigurationError(
                "poll intervals must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
