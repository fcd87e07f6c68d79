use crate::locator::Locator;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Largest party the booking site lets one order carry.
pub const MAX_SEATS: u32 = 10;

pub const DEFAULT_SEATS: u32 = 1;

/// Trip parameters for one run. Never mutated once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRequest {
    pub from: String,
    pub to: String,
    /// ISO `YYYY-MM-DD`; may be empty when the date is picked by hand.
    #[serde(default)]
    pub date: String,
    #[serde(default = "default_seats", deserialize_with = "deserialize_seats")]
    pub seats: u32,
    /// Carriage class pattern, empty for any class.
    #[serde(default)]
    pub coach_type: String,
}

fn default_seats() -> u32 {
    DEFAULT_SEATS
}

// The data-entry form sends `seats` as a number, a numeric string, or "" when untouched.
fn deserialize_seats<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(DEFAULT_SEATS),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("seats must be a whole number, got {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(DEFAULT_SEATS),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("seats must be a whole number, got '{}'", s))),
        Some(other) => Err(D::Error::custom(format!(
            "seats must be a whole number, got {}",
            other
        ))),
    }
}

/// One traveller; the i-th record goes to the i-th booked seat.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PassengerRecord {
    pub last_name: String,
    pub first_name: String,
    pub birth_date: String,
    pub document: String,
}

impl PassengerRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A carriage card read off the results page. The handle is only valid
/// until the page navigates away.
#[derive(Debug, Clone)]
pub struct WagonCandidate {
    pub type_label: String,
    pub free_seat_count: u32,
    pub handle: Locator,
}

impl WagonCandidate {
    pub fn summary(&self) -> WagonSummary {
        WagonSummary {
            type_label: self.type_label.clone(),
            free_seat_count: self.free_seat_count,
        }
    }
}

/// Handle-free copy of the chosen wagon kept for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WagonSummary {
    pub type_label: String,
    pub free_seat_count: u32,
}

#[derive(Debug, Clone)]
pub struct SeatCandidate {
    pub label: String,
    pub enabled: bool,
    pub handle: Locator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    SearchSubmitted,
    ResultsLoaded,
    WagonChosen,
    SeatsPicked,
    PassengersFilled,
    Done,
    Aborted(String),
}

impl RunState {
    /// The only state a successful step may move to from here.
    pub fn successor(&self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::SearchSubmitted),
            RunState::SearchSubmitted => Some(RunState::ResultsLoaded),
            RunState::ResultsLoaded => Some(RunState::WagonChosen),
            RunState::WagonChosen => Some(RunState::SeatsPicked),
            RunState::SeatsPicked => Some(RunState::PassengersFilled),
            RunState::PassengersFilled => Some(RunState::Done),
            RunState::Done | RunState::Aborted(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted(_))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::SearchSubmitted => write!(f, "search submitted"),
            RunState::ResultsLoaded => write!(f, "results loaded"),
            RunState::WagonChosen => write!(f, "wagon chosen"),
            RunState::SeatsPicked => write!(f, "seats picked"),
            RunState::PassengersFilled => write!(f, "passengers filled"),
            RunState::Done => write!(f, "done"),
            RunState::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}
