use super::{site, Stage};
use crate::core::TimingConfig;
use crate::errors::{BookingError, Result};
use crate::locator::{Page, WaitState};
use crate::orchestrator::RunContext;
use crate::types::{RunState, WagonCandidate};
use crate::utils::poll::{poll, settle};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use std::time::Duration;
use tracing::{info, warn};

/// Which carriage class labels count as the requested coach type.
#[derive(Debug, Clone)]
pub enum CoachFilter {
    Any,
    Pattern(Regex),
}

impl CoachFilter {
    /// Case-insensitive pattern; text that is not a valid pattern is
    /// matched literally.
    pub fn new(coach_type: &str) -> Self {
        let coach_type = coach_type.trim();
        if coach_type.is_empty() {
            return CoachFilter::Any;
        }
        let regex = RegexBuilder::new(coach_type)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(coach_type))
                    .case_insensitive(true)
                    .build()
            });
        match regex {
            Ok(regex) => CoachFilter::Pattern(regex),
            Err(err) => {
                warn!(coach_type, error = %err, "unusable coach type, accepting any class");
                CoachFilter::Any
            }
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, CoachFilter::Any)
    }

    pub fn matches(&self, label: &str) -> bool {
        match self {
            CoachFilter::Any => true,
            CoachFilter::Pattern(regex) => regex.is_match(label),
        }
    }
}

/// Free seats in a wagon caption: the first run of digits, 0 if there is none.
pub fn parse_free_seats(caption: &str) -> u32 {
    caption
        .split(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .map(|digits| digits.parse().unwrap_or(u32::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WagonChoice {
    pub index: usize,
    /// Whether the winner matched the coach filter or came from the fallback
    pub matched: bool,
}

/// Index of the wagon with strictly the most free seats among those the
/// filter accepts, falling back to all wagons when none of the accepted ones
/// has a free seat. Ties go to the earlier wagon; wagons without free seats
/// are never chosen.
pub fn choose_wagon(candidates: &[WagonCandidate], filter: &CoachFilter) -> Option<WagonChoice> {
    fn fullest<'a>(wagons: impl Iterator<Item = (usize, &'a WagonCandidate)>) -> Option<usize> {
        let mut best = None;
        let mut most = 0;
        for (index, wagon) in wagons {
            if wagon.free_seat_count > most {
                most = wagon.free_seat_count;
                best = Some(index);
            }
        }
        best
    }

    if let Some(index) = fullest(
        candidates
            .iter()
            .enumerate()
            .filter(|(_, wagon)| filter.matches(&wagon.type_label)),
    ) {
        return Some(WagonChoice {
            index,
            matched: true,
        });
    }

    fullest(candidates.iter().enumerate()).map(|index| WagonChoice {
        index,
        matched: false,
    })
}

/// Waits for the search results and opens the best wagon.
pub struct WagonStage {
    timing: TimingConfig,
}

impl WagonStage {
    pub fn new(timing: TimingConfig) -> Self {
        Self { timing }
    }

    async fn wait_for_results(&self, page: &Page) -> Result<usize> {
        info!("Waiting for train search results…");
        let sections = &page.locator(site::RESULT_SECTION);
        poll(
            "the train list (check the search data)",
            Duration::from_millis(self.timing.results_poll_interval_ms),
            Duration::from_millis(self.timing.results_timeout_ms),
            || async move { sections.count().await.ok().filter(|n| *n > 0) },
        )
        .await
    }

    async fn collect_candidates(&self, page: &Page) -> Result<Vec<WagonCandidate>> {
        let cards = page.locator(site::WAGON_CARD);
        let total = cards.count().await?;
        if total == 0 {
            return Err(BookingError::SelectionError(
                "no wagon cards on the results page".to_string(),
            ));
        }

        let mut candidates = Vec::with_capacity(total);
        for i in 0..total {
            let card = cards.nth(i);
            let caption = match card.locator(site::WAGON_CAPTION).first().inner_text().await {
                Ok(caption) => caption,
                Err(err) => {
                    warn!(wagon = i + 1, error = %err, "wagon card without a seat caption, skipped");
                    continue;
                }
            };
            let type_label = card
                .locator(site::WAGON_CLASS_LABEL)
                .first()
                .inner_text()
                .await
                .map(|label| label.trim().to_string())
                .unwrap_or_default();

            candidates.push(WagonCandidate {
                free_seat_count: parse_free_seats(&caption),
                type_label,
                handle: card,
            });
        }
        Ok(candidates)
    }
}

#[async_trait]
impl Stage for WagonStage {
    fn name(&self) -> &'static str {
        "wagon"
    }

    async fn execute(&self, page: &Page, run: &mut RunContext<'_>) -> Result<()> {
        let coach_type = run.request().trip.coach_type.as_str();
        let filter = CoachFilter::new(coach_type);
        info!(
            coach_type = if filter.is_any() { "any" } else { coach_type },
            "Choosing the wagon with the most free seats"
        );

        let sections = self.wait_for_results(page).await?;
        info!(trains = sections, "Search results loaded");
        run.advance(RunState::ResultsLoaded)?;

        let candidates = self.collect_candidates(page).await?;
        let choice = choose_wagon(&candidates, &filter).ok_or_else(|| {
            BookingError::SelectionError("no wagon has free seats".to_string())
        })?;
        if !choice.matched && !filter.is_any() {
            warn!(coach_type, "No '{}' wagon with free seats, taking any class", coach_type);
        }

        let wagon = &candidates[choice.index];
        wagon.handle.click().await?;
        page.locator(site::SEAT)
            .wait_for(
                WaitState::Visible,
                Duration::from_millis(self.timing.seat_map_timeout_ms),
            )
            .await?;
        settle(self.timing.wagon_settle_ms).await;

        info!(
            class = %wagon.type_label,
            free_seats = wagon.free_seat_count,
            "Opened wagon with {} free seats",
            wagon.free_seat_count
        );
        run.set_wagon(wagon.summary());
        run.advance(RunState::WagonChosen)
    }
}
