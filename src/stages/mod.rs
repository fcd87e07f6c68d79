pub mod passengers;
pub mod search;
pub mod seats;
pub mod site;
pub mod wagon;

pub use passengers::PassengerStage;
pub use search::SearchStage;
pub use seats::SeatStage;
pub use wagon::{choose_wagon, parse_free_seats, CoachFilter, WagonChoice, WagonStage};

use crate::core::Config;
use crate::errors::Result;
use crate::locator::Page;
use crate::orchestrator::RunContext;
use async_trait::async_trait;

/// One step of the booking flow.
///
/// A stage starts from the page state the previous stage left behind and
/// moves the run forward through [`RunContext::advance`]. Any error it
/// returns aborts the whole run.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, page: &Page, run: &mut RunContext<'_>) -> Result<()>;
}

/// Search, wagon, seats, passengers.
pub fn pipeline(config: &Config) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(SearchStage::new(
            config.timing.clone(),
            config.booking.date_policy,
        )),
        Box::new(WagonStage::new(config.timing.clone())),
        Box::new(SeatStage::new(config.timing.clone())),
        Box::new(PassengerStage::new(config.timing.clone())),
    ]
}
