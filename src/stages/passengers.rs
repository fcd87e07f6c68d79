use super::site::{self, PassengerFields};
use super::Stage;
use crate::core::TimingConfig;
use crate::errors::Result;
use crate::locator::{first_visible, Page, Strategy};
use crate::orchestrator::RunContext;
use crate::types::{PassengerRecord, RunState};
use crate::utils::poll::{poll, settle};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fills one passenger subform per booked seat, stepping through the
/// subforms with the "next passenger" buttons.
pub struct PassengerStage {
    timing: TimingConfig,
    fields: PassengerFields,
}

impl PassengerStage {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            fields: PassengerFields::new(),
        }
    }

    async fn fill_field(&self, page: &Page, strategies: &[Strategy], name: &str, value: &str) -> Result<()> {
        match first_visible(page, strategies).await {
            Some(field) => {
                field.fill(value).await?;
                settle(self.timing.field_settle_ms).await;
            }
            None => debug!(field = name, "field not on the form, skipped"),
        }
        Ok(())
    }

    async fn fill_passenger(&self, page: &Page, index: usize, passenger: &PassengerRecord) -> Result<()> {
        let first_name = &self.fields.first_name;
        poll(
            &format!("first name field of passenger {}", index + 1),
            Duration::from_millis(self.timing.element_poll_interval_ms),
            Duration::from_millis(self.timing.passenger_field_timeout_ms),
            || async move { first_visible(page, first_name).await },
        )
        .await?;

        let fields = &self.fields;
        self.fill_field(page, &fields.first_name, "first_name", &passenger.first_name)
            .await?;
        self.fill_field(page, &fields.last_name, "last_name", &passenger.last_name)
            .await?;
        self.fill_field(page, &fields.birth_date, "bdate", &passenger.birth_date)
            .await?;
        self.fill_field(page, &fields.document, "docnum", &passenger.document)
            .await?;

        info!(
            passenger = index + 1,
            "Passenger {}: {} filled in",
            index + 1,
            passenger.full_name()
        );
        Ok(())
    }

    async fn next_passenger(&self, page: &Page, index: usize) -> Result<()> {
        let button = page.locator(site::next_passenger_button(index));
        if button.is_visible().await.unwrap_or(false) {
            button.click().await?;
            info!("Moved on to the next passenger");
            settle(self.timing.next_passenger_settle_ms).await;
        } else {
            warn!(passenger = index + 1, "No 'next passenger' button after this passenger");
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for PassengerStage {
    fn name(&self) -> &'static str {
        "passengers"
    }

    async fn execute(&self, page: &Page, run: &mut RunContext<'_>) -> Result<()> {
        let booked = run.booked_seats().len();
        let passengers = &run.request().passengers;
        info!(seats = booked, passengers = passengers.len(), "Filling in passengers");

        for index in 0..booked {
            let Some(passenger) = passengers.get(index) else {
                warn!(
                    seat = index + 1,
                    "No passenger record left for this seat, stopping here"
                );
                break;
            };

            self.fill_passenger(page, index, passenger).await?;
            run.passenger_filled();

            if index + 1 < booked {
                self.next_passenger(page, index).await?;
            }
        }

        info!(filled = run.passengers_filled(), "Passenger details filled in");
        run.advance(RunState::PassengersFilled)
    }
}
