use super::{site, Stage};
use crate::core::TimingConfig;
use crate::errors::{BookingError, Result};
use crate::locator::{first_visible, Page, WaitState};
use crate::orchestrator::RunContext;
use crate::types::{RunState, SeatCandidate};
use crate::utils::poll::settle;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Clicks enabled seats in document order until the requested number is
/// selected, then moves on to the passenger form.
pub struct SeatStage {
    timing: TimingConfig,
}

impl SeatStage {
    pub fn new(timing: TimingConfig) -> Self {
        Self { timing }
    }

    async fn seat_map(&self, page: &Page) -> Result<Vec<SeatCandidate>> {
        let all = page.locator(site::SEAT);
        all.wait_for(
            WaitState::Visible,
            Duration::from_millis(self.timing.seat_controls_timeout_ms),
        )
        .await?;
        settle(self.timing.seat_map_settle_ms).await;

        let total = all.count().await?;
        let mut seats = Vec::with_capacity(total);
        for i in 0..total {
            let handle = all.nth(i);
            let enabled = handle.is_enabled().await.unwrap_or(false);
            let label = handle
                .locator(site::SEAT_LABEL)
                .first()
                .inner_text()
                .await
                .map(|label| label.trim().to_string())
                .ok()
                .filter(|label| !label.is_empty())
                .unwrap_or_else(|| "?".to_string());
            seats.push(SeatCandidate {
                label,
                enabled,
                handle,
            });
        }
        Ok(seats)
    }

    async fn pick(&self, seat: &SeatCandidate) -> Result<()> {
        seat.handle.trial_click().await?;
        seat.handle.click().await
    }
}

#[async_trait]
impl Stage for SeatStage {
    fn name(&self) -> &'static str {
        "seats"
    }

    async fn execute(&self, page: &Page, run: &mut RunContext<'_>) -> Result<()> {
        let wanted = run.request().trip.seats as usize;
        let seats = self.seat_map(page).await?;
        let free = seats.iter().filter(|seat| seat.enabled).count();
        info!(total = seats.len(), free, wanted, "Seat map loaded");
        if free == 0 {
            return Err(BookingError::SelectionError(
                "the chosen wagon shows no free seats".to_string(),
            ));
        }

        let mut booked = Vec::with_capacity(wanted);
        for seat in seats.iter().filter(|seat| seat.enabled) {
            if booked.len() >= wanted {
                break;
            }
            match self.pick(seat).await {
                Ok(()) => {
                    info!(seat = %seat.label, "Seat selected");
                    booked.push(seat.label.clone());
                    settle(self.timing.seat_click_settle_ms).await;
                }
                Err(err) => {
                    warn!(seat = %seat.label, error = %err, "Could not select seat, trying the next one");
                }
            }
        }

        if booked.is_empty() {
            return Err(BookingError::SelectionError(
                "none of the free seats could be selected".to_string(),
            ));
        }
        if booked.len() < wanted {
            warn!(
                booked = booked.len(),
                wanted, "Selected fewer seats than requested"
            );
        }
        info!(seats = ?booked, "Seats selected");
        run.set_booked_seats(booked);

        let proceed = first_visible(page, &site::proceed_to_passengers())
            .await
            .ok_or_else(|| {
                BookingError::LocatorNotFound("'go to passengers' link".to_string())
            })?;
        settle(self.timing.proceed_delay_ms).await;
        debug!(target = %proceed.target(), "Proceeding to passenger details");
        proceed.click().await?;

        run.advance(RunState::SeatsPicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::BookingRequest;
    use crate::testing::FakePage;
    use crate::types::TripRequest;

    fn seat_map(seats: &[(&str, &str)]) -> String {
        let buttons: String = seats
            .iter()
            .map(|(number, attrs)| {
                format!(
                    r#"<button class="WagonUnitBed" id="seat-{number}" {attrs}>
                         <span class="Typography--captionBold">{number}</span>
                       </button>"#
                )
            })
            .collect();
        format!(
            r#"<main>
                 <div id="wagon-map">{buttons}</div>
                 <a href="/passengers" id="proceed">Перейти до пасажирів</a>
               </main>"#
        )
    }

    fn request(seats: u32) -> BookingRequest {
        BookingRequest {
            trip: TripRequest {
                from: "Київ".into(),
                to: "Одеса".into(),
                date: "2025-10-20".into(),
                seats,
                coach_type: String::new(),
            },
            passengers: vec![],
        }
    }

    fn stage() -> SeatStage {
        SeatStage::new(TimingConfig::default().without_delays())
    }

    fn wagon_chosen(request: &BookingRequest) -> RunContext<'_> {
        let mut run = RunContext::new(request);
        for state in [
            RunState::SearchSubmitted,
            RunState::ResultsLoaded,
            RunState::WagonChosen,
        ] {
            run.advance(state).unwrap();
        }
        run
    }

    #[tokio::test(start_paused = true)]
    async fn test_picks_first_free_seats_in_order() {
        let fake = FakePage::new(seat_map(&[
            ("1", "disabled"),
            ("2", ""),
            ("3", "disabled"),
            ("4", ""),
            ("5", ""),
        ]));
        let request = request(2);
        let mut run = wagon_chosen(&request);

        stage().execute(&fake.page(), &mut run).await.unwrap();

        assert_eq!(run.booked_seats(), ["2", "4"]);
        assert_eq!(fake.clicks(), vec!["seat-2", "seat-4", "proceed"]);
        assert_eq!(run.state(), &RunState::SeatsPicked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seat_map_marks_disabled_seats() {
        let fake = FakePage::new(seat_map(&[("1", "disabled"), ("2", ""), ("3", "disabled")]));

        let seats = stage().seat_map(&fake.page()).await.unwrap();

        let summary: Vec<(&str, bool)> = seats
            .iter()
            .map(|seat| (seat.label.as_str(), seat.enabled))
            .collect();
        assert_eq!(summary, vec![("1", false), ("2", true), ("3", false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_click_moves_to_the_next_seat() {
        let fake = FakePage::new(seat_map(&[
            ("7", "data-trial-fails"),
            ("8", "data-click-fails"),
            ("9", ""),
            ("10", ""),
        ]));
        let request = request(1);
        let mut run = wagon_chosen(&request);

        stage().execute(&fake.page(), &mut run).await.unwrap();

        assert_eq!(run.booked_seats(), ["9"]);
        assert_eq!(fake.clicks(), vec!["seat-9", "proceed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fewer_seats_than_requested_still_proceeds() {
        let fake = FakePage::new(seat_map(&[("11", ""), ("12", ""), ("13", "disabled")]));
        let request = request(3);
        let mut run = wagon_chosen(&request);

        stage().execute(&fake.page(), &mut run).await.unwrap();
        assert_eq!(run.booked_seats(), ["11", "12"]);
        assert_eq!(run.state(), &RunState::SeatsPicked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_selectable_seat_is_a_selection_error() {
        let request = request(1);

        let fake = FakePage::new(seat_map(&[("1", "disabled"), ("2", "disabled")]));
        let mut run = wagon_chosen(&request);
        let err = stage().execute(&fake.page(), &mut run).await.unwrap_err();
        assert!(matches!(err, BookingError::SelectionError(_)));

        let fake = FakePage::new(seat_map(&[("1", "data-click-fails"), ("2", "data-trial-fails")]));
        let mut run = wagon_chosen(&request);
        let err = stage().execute(&fake.page(), &mut run).await.unwrap_err();
        assert!(matches!(err, BookingError::SelectionError(_)));
        assert!(fake.clicks().is_empty());
        assert_eq!(run.state(), &RunState::WagonChosen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_seat_map_times_out() {
        let fake = FakePage::new("<main><p>Схема вагона недоступна</p></main>");
        let request = request(1);
        let mut run = wagon_chosen(&request);
        let err = stage().execute(&fake.page(), &mut run).await.unwrap_err();
        assert!(matches!(err, BookingError::TimeoutError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_proceed_link_is_reported() {
        let html = seat_map(&[("3", "")]).replace("Перейти до пасажирів", "Далі");
        let fake = FakePage::new(html);
        let request = request(1);
        let mut run = wagon_chosen(&request);

        let err = stage().execute(&fake.page(), &mut run).await.unwrap_err();
        assert!(matches!(err, BookingError::LocatorNotFound(_)));
        assert_eq!(run.booked_seats(), ["3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlabelled_seat_is_recorded_as_question_mark() {
        let html = seat_map(&[("5", "")]).replace(
            r#"<span class="Typography--captionBold">5</span>"#,
            "",
        );
        let fake = FakePage::new(html);
        let request = request(1);
        let mut run = wagon_chosen(&request);

        stage().execute(&fake.page(), &mut run).await.unwrap();
        assert_eq!(run.booked_seats(), ["?"]);
    }
}
