use super::{site, Stage};
use crate::core::{DatePolicy, TimingConfig};
use crate::errors::{BookingError, Result};
use crate::locator::{first_visible, Page, WaitState};
use crate::orchestrator::RunContext;
use crate::types::RunState;
use crate::utils::poll::{poll, settle};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Fills origin, destination and date, then submits the search.
pub struct SearchStage {
    timing: TimingConfig,
    date_policy: DatePolicy,
}

impl SearchStage {
    pub fn new(timing: TimingConfig, date_policy: DatePolicy) -> Self {
        Self {
            timing,
            date_policy,
        }
    }

    async fn select_city(&self, page: &Page, placeholder: &str, city: &str) -> Result<()> {
        let input = page.locator(site::city_input(placeholder));
        input.require(&format!("'{}' field", placeholder)).await?;
        input.click().await?;
        input.fill(city).await?;

        let options = page.locator(site::AUTOCOMPLETE_OPTION);
        options
            .wait_for(
                WaitState::Visible,
                Duration::from_millis(self.timing.autocomplete_timeout_ms),
            )
            .await?;
        options.first().click().await?;
        settle(self.timing.city_settle_ms).await;

        info!(field = placeholder, city, "Station selected");
        Ok(())
    }

    async fn select_date(&self, page: &Page, date: &str) -> Result<()> {
        match self.date_policy {
            DatePolicy::Calendar => {
                info!(date, "Picking the travel date");
                let timeout = Duration::from_millis(self.timing.calendar_timeout_ms);

                page.locator(site::DATE_INPUT).click().await?;
                page.locator(site::CALENDAR)
                    .first()
                    .wait_for(WaitState::Visible, timeout)
                    .await?;

                let day = page.locator(site::calendar_day(date));
                day.wait_for(WaitState::Visible, timeout).await?;
                day.click().await?;
                info!(date, "Travel date selected");
            }
            DatePolicy::Manual => {
                info!("Pick the travel date in the browser window…");
                let field = &page.locator(site::DATE_INPUT);
                let picked = poll(
                    "the travel date to be picked by hand",
                    Duration::from_millis(self.timing.manual_date_poll_interval_ms),
                    Duration::from_millis(self.timing.manual_date_timeout_ms),
                    || async move {
                        field
                            .input_value()
                            .await
                            .ok()
                            .filter(|value| !value.trim().is_empty())
                    },
                )
                .await?;
                info!(date = %picked, "Travel date picked");
            }
        }
        Ok(())
    }

    async fn submit(&self, page: &Page) -> Result<()> {
        let button = first_visible(page, &site::search_button())
            .await
            .ok_or_else(|| {
                BookingError::LocatorNotFound(
                    "search button ('Знайти' / 'Пошук' / 'Search')".to_string(),
                )
            })?;
        button.click().await?;
        info!("Search submitted");
        Ok(())
    }
}

#[async_trait]
impl Stage for SearchStage {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn execute(&self, page: &Page, run: &mut RunContext<'_>) -> Result<()> {
        let trip = &run.request().trip;
        info!(from = %trip.from, to = %trip.to, "Filling in the search form");

        self.select_city(page, site::ORIGIN_PLACEHOLDER, &trip.from)
            .await?;
        self.select_city(page, site::DESTINATION_PLACEHOLDER, &trip.to)
            .await?;
        self.select_date(page, trip.date.trim()).await?;
        self.submit(page).await?;

        run.advance(RunState::SearchSubmitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::BookingRequest;
    use crate::testing::FakePage;
    use crate::types::TripRequest;

    const SEARCH_FORM: &str = r#"
        <form id="search">
          <input id="from" placeholder="Звідки" data-fill-reveals="from-options">
          <ul id="from-options" data-detached>
            <li role="option" id="from-kyiv" data-removes="from-options">Київ</li>
            <li role="option" id="from-kyiv-2">Київ-Волинський</li>
          </ul>
          <input id="to" placeholder="Куди" data-fill-reveals="to-options">
          <ul id="to-options" data-detached>
            <li role="option" id="to-lviv" data-removes="to-options">Львів</li>
          </ul>
          <input id="startDate" data-reveals="calendar">
          <div id="calendar" class="dp__calendar" hidden>
            <div id="dp-2025-10-19"><div class="dp__cell_inner" id="day-19">19</div></div>
            <div id="dp-2025-10-20"><div class="dp__cell_inner" id="day-20">20</div></div>
          </div>
          <button id="submit" aria-label="Знайти квитки">🔍</button>
        </form>
    "#;

    fn request(date: &str) -> BookingRequest {
        BookingRequest {
            trip: TripRequest {
                from: "Київ".into(),
                to: "Львів".into(),
                date: date.into(),
                seats: 1,
                coach_type: String::new(),
            },
            passengers: vec![],
        }
    }

    fn stage(policy: DatePolicy) -> SearchStage {
        SearchStage::new(TimingConfig::default().without_delays(), policy)
    }

    #[tokio::test(start_paused = true)]
    async fn test_calendar_search_clicks_the_requested_day() {
        let fake = FakePage::new(SEARCH_FORM);
        let request = request("2025-10-20");
        let mut run = RunContext::new(&request);

        stage(DatePolicy::Calendar)
            .execute(&fake.page(), &mut run)
            .await
            .unwrap();

        assert_eq!(run.state(), &RunState::SearchSubmitted);
        assert_eq!(
            fake.clicks(),
            vec!["from", "from-kyiv", "to", "to-lviv", "startDate", "day-20", "submit"]
        );
        assert_eq!(
            fake.fills(),
            vec![
                ("from".to_string(), "Київ".to_string()),
                ("to".to_string(), "Львів".to_string())
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_a_hidden_suggestion_to_show() {
        let html = SEARCH_FORM.replace(
            r#"<li role="option" id="from-kyiv" data-removes="from-options">"#,
            r#"<li role="option" id="from-kyiv" data-removes="from-options" hidden>"#,
        );
        let fake = FakePage::new(html);
        let request = request("2025-10-20");
        let mut run = RunContext::new(&request);

        let site = fake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            site.reveal("from-kyiv");
        });

        let started = tokio::time::Instant::now();
        stage(DatePolicy::Calendar)
            .execute(&fake.page(), &mut run)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(run.state(), &RunState::SearchSubmitted);
        assert_eq!(&fake.clicks()[..2], ["from", "from-kyiv"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_date_waits_for_a_value() {
        let fake = FakePage::new(SEARCH_FORM);
        let request = request("");
        let mut run = RunContext::new(&request);

        let person = fake.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(42)).await;
            person.set_value("startDate", "20.10.2025");
        });

        stage(DatePolicy::Manual)
            .execute(&fake.page(), &mut run)
            .await
            .unwrap();

        assert_eq!(run.state(), &RunState::SearchSubmitted);
        assert!(!fake.clicks().contains(&"startDate".to_string()));
        assert_eq!(fake.clicks().last().map(String::as_str), Some("submit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_date_gives_up_at_the_deadline() {
        let fake = FakePage::new(SEARCH_FORM);
        let request = request("");
        let mut run = RunContext::new(&request);

        let err = stage(DatePolicy::Manual)
            .execute(&fake.page(), &mut run)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::TimeoutError(_)));
        assert_eq!(run.state(), &RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_day_cell_times_out() {
        let fake = FakePage::new(SEARCH_FORM);
        let request = request("2025-12-31");
        let mut run = RunContext::new(&request);

        let err = stage(DatePolicy::Calendar)
            .execute(&fake.page(), &mut run)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::TimeoutError(ref what) if what.contains("dp-2025-12-31")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_text_button_and_fails_without_one() {
        let with_text_button = SEARCH_FORM.replace(
            r#"<button id="submit" aria-label="Знайти квитки">🔍</button>"#,
            r#"<button id="submit-text">Пошук</button>"#,
        );
        let fake = FakePage::new(with_text_button);
        let request = request("2025-10-20");
        let mut run = RunContext::new(&request);
        stage(DatePolicy::Calendar)
            .execute(&fake.page(), &mut run)
            .await
            .unwrap();
        assert_eq!(fake.clicks().last().map(String::as_str), Some("submit-text"));

        let without_button = SEARCH_FORM.replace(
            r#"<button id="submit" aria-label="Знайти квитки">🔍</button>"#,
            "",
        );
        let fake = FakePage::new(without_button);
        let mut run = RunContext::new(&request);
        let err = stage(DatePolicy::Calendar)
            .execute(&fake.page(), &mut run)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::LocatorNotFound(_)));
    }
}
