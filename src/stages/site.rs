//! Where things live on booking.uz.gov.ua.

use crate::locator::{Page, Strategy};

pub const ORIGIN_PLACEHOLDER: &str = "Звідки";
pub const DESTINATION_PLACEHOLDER: &str = "Куди";
pub const AUTOCOMPLETE_OPTION: &str = "[role='option']";

pub const DATE_INPUT: &str = "#startDate";
pub const CALENDAR: &str = "div.dp__calendar";

pub const RESULT_SECTION: &str = "section.TripUnitInfo";
pub const WAGON_CARD: &str = ".TripUnitWagon[role='button']";
pub const WAGON_CLASS_LABEL: &str = "h4.Typography--h4";
pub const WAGON_CAPTION: &str = ".Typography--caption";

pub const SEAT: &str = "button.WagonUnitBed";
pub const SEAT_LABEL: &str = ".Typography--captionBold";

pub fn city_input(placeholder: &str) -> String {
    format!("input[placeholder='{}']", placeholder)
}

/// Day cell of the date picker for an ISO `YYYY-MM-DD` date
pub fn calendar_day(date: &str) -> String {
    format!("#dp-{} .dp__cell_inner", date)
}

/// "Next passenger" button under the subform of passenger `index` (0-based)
pub fn next_passenger_button(index: usize) -> String {
    format!("#submitPassenger-{}", index)
}

pub fn search_button() -> Vec<Strategy> {
    vec![
        Strategy::derived(|page: &Page| page.get_by_role("button", "Знайти|search")),
        Strategy::text("button", "Пошук"),
        Strategy::text("button", "Search"),
    ]
}

pub fn proceed_to_passengers() -> Vec<Strategy> {
    vec![
        Strategy::text("a", "Перейти до пасажирів"),
        Strategy::text("a", "Перейти к пассажирам"),
        Strategy::text("a", "Go to passengers"),
    ]
}

/// Passenger subform inputs, by `name` first and `id` second
pub struct PassengerFields {
    pub first_name: Vec<Strategy>,
    pub last_name: Vec<Strategy>,
    pub birth_date: Vec<Strategy>,
    pub document: Vec<Strategy>,
}

impl PassengerFields {
    pub fn new() -> Self {
        Self {
            first_name: field("first_name"),
            last_name: field("last_name"),
            birth_date: field("bdate"),
            document: field("docnum"),
        }
    }
}

impl Default for PassengerFields {
    fn default() -> Self {
        Self::new()
    }
}

fn field(name: &str) -> Vec<Strategy> {
    vec![
        Strategy::css(format!("input[name='{}']", name)),
        Strategy::css(format!("#{}", name)),
    ]
}
