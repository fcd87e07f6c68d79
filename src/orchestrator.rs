//! Drives one booking run from the home page to the filled passenger form.

use crate::core::Config;
use crate::errors::{BookingError, Result};
use crate::locator::{ActionTiming, Page};
use crate::request::BookingRequest;
use crate::stages::{pipeline, Stage};
use crate::types::{RunState, WagonSummary};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Mutable state of a single run, threaded through every stage.
#[derive(Debug)]
pub struct RunContext<'a> {
    request: &'a BookingRequest,
    state: RunState,
    history: Vec<RunState>,
    wagon: Option<WagonSummary>,
    booked_seats: Vec<String>,
    passengers_filled: usize,
}

impl<'a> RunContext<'a> {
    pub fn new(request: &'a BookingRequest) -> Self {
        Self {
            request,
            state: RunState::Idle,
            history: vec![RunState::Idle],
            wagon: None,
            booked_seats: Vec::new(),
            passengers_filled: 0,
        }
    }

    pub fn request(&self) -> &'a BookingRequest {
        self.request
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Every state the run has been in, oldest first
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Move to `next`, which must be the successor of the current state.
    pub fn advance(&mut self, next: RunState) -> Result<()> {
        if self.state.successor().as_ref() != Some(&next) {
            return Err(BookingError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        debug!(from = %self.state, to = %next, "run state changed");
        self.enter(next);
        Ok(())
    }

    /// Stop the run for good. Has no effect once the run is finished.
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.enter(RunState::Aborted(reason.into()));
    }

    fn enter(&mut self, state: RunState) {
        self.history.push(state.clone());
        self.state = state;
    }

    pub fn set_wagon(&mut self, wagon: WagonSummary) {
        self.wagon = Some(wagon);
    }

    pub fn wagon(&self) -> Option<&WagonSummary> {
        self.wagon.as_ref()
    }

    pub fn set_booked_seats(&mut self, seats: Vec<String>) {
        self.booked_seats = seats;
    }

    /// Labels of the seats actually selected, in click order
    pub fn booked_seats(&self) -> &[String] {
        &self.booked_seats
    }

    pub fn passenger_filled(&mut self) {
        self.passengers_filled += 1;
    }

    pub fn passengers_filled(&self) -> usize {
        self.passengers_filled
    }

    fn into_report(self, outcome: Result<()>) -> BookingReport {
        BookingReport {
            state: self.state,
            history: self.history,
            wagon: self.wagon,
            booked_seats: self.booked_seats,
            passengers_filled: self.passengers_filled,
            outcome,
        }
    }
}

/// What a run achieved. The browser is left on the passenger form on success.
#[derive(Debug)]
pub struct BookingReport {
    pub state: RunState,
    pub history: Vec<RunState>,
    pub wagon: Option<WagonSummary>,
    pub booked_seats: Vec<String>,
    pub passengers_filled: usize,
    pub outcome: Result<()>,
}

impl BookingReport {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done && self.outcome.is_ok()
    }
}

/// Resolves once the operator is finished with the open browser.
pub type Handoff = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct BookingOrchestrator {
    page: Page,
    config: Config,
    stages: Vec<Box<dyn Stage>>,
    handoff: Option<Handoff>,
}

impl BookingOrchestrator {
    pub fn new(page: Page, config: Config) -> Self {
        let stages = pipeline(&config);
        Self {
            page: page.with_timing(ActionTiming::from(&config.timing)),
            config,
            stages,
            handoff: None,
        }
    }

    /// Keep the page open after a successful run until `handoff` resolves,
    /// so payment can be completed by hand.
    pub fn with_handoff<F>(mut self, handoff: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handoff = Some(Box::pin(handoff));
        self
    }

    /// Run every stage in order against the page. The page is closed
    /// afterwards whatever the outcome, after the hand-off on success.
    pub async fn run(mut self, request: &BookingRequest) -> BookingReport {
        let mut run = RunContext::new(request);
        let started = Instant::now();

        let outcome = self.run_stages(&mut run).await;
        match &outcome {
            Ok(()) => {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    seats = ?run.booked_seats(),
                    "Done. Check the details and pay manually."
                );
                if let Some(handoff) = self.handoff.take() {
                    info!("Browser left open for payment");
                    handoff.await;
                    info!("Hand-off released");
                }
            }
            Err(err) => {
                error!(state = %run.state(), error = %err, "Booking run failed");
                run.abort(err.to_string());
                self.save_failure_screenshot().await;
            }
        }

        if let Err(err) = self.page.close().await {
            warn!(error = %err, "Failed to close the page");
        }

        run.into_report(outcome)
    }

    async fn run_stages(&self, run: &mut RunContext<'_>) -> Result<()> {
        let base_url = &self.config.booking.base_url;
        info!(url = %base_url, "Opening the booking site");
        self.page.goto(base_url).await?;

        for stage in &self.stages {
            debug!(stage = stage.name(), state = %run.state(), "Running stage");
            stage.execute(&self.page, run).await?;
        }
        run.advance(RunState::Done)
    }

    async fn save_failure_screenshot(&self) {
        let Some(path) = &self.config.booking.failure_screenshot else {
            return;
        };
        let saved = match self.page.screenshot().await {
            Ok(png) => tokio::fs::write(path, png).await.map_err(BookingError::from),
            Err(err) => Err(err),
        };
        match saved {
            Ok(()) => info!(path = %path.display(), "Saved failure screenshot"),
            Err(err) => warn!(path = %path.display(), error = %err, "Could not save failure screenshot"),
        }
    }
}
