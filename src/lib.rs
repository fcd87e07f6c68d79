pub mod browser;
pub mod core;
pub mod errors;
pub mod locator;
pub mod orchestrator;
pub mod request;
pub mod stages;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod utils;

pub use browser::ChromeDriver;
pub use crate::core::{Config, DatePolicy, PageDriver};
pub use errors::{BookingError, Result};
pub use locator::{Locator, Page};
pub use orchestrator::{BookingOrchestrator, BookingReport, RunContext};
pub use request::BookingRequest;
pub use types::*;
