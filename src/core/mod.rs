pub mod config;
pub mod driver;

pub use config::{BookingConfig, BrowserConfig, Config, DatePolicy, TimingConfig, Viewport};
pub use driver::{ClickOptions, PageDriver};
