use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{VaccineKind, VaccineRecord};

/// The flu season containing a given day: Aug 1 through the following
/// Mar 31, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub fn flu_season_window(today: NaiveDate) -> SeasonWindow {
    let aug_first = NaiveDate::from_ymd_opt(today.year(), 8, 1).expect("valid calendar date");
    let start_year = if today >= aug_first { today.year() } else { today.year() - 1 };
    SeasonWindow {
        start: NaiveDate::from_ymd_opt(start_year, 8, 1).expect("valid calendar date"),
        end: NaiveDate::from_ymd_opt(start_year + 1, 3, 31).expect("valid calendar date"),
    }
}

/// Up to date for flu: at least one flu record inside the current season
/// window and within the trailing ten months. Future-dated records never
/// count.
pub fn is_flu_up_to_date(records: &[VaccineRecord], today: NaiveDate) -> bool {
    let window = flu_season_window(today);
    let ten_months_ago = today.checked_sub_months(Months::new(10)).unwrap_or(NaiveDate::MIN);
    records
        .iter()
        .filter(|r| r.kind == VaccineKind::Flu)
        .any(|r| {
            r.date >= window.start
                && r.date <= window.end
                && r.date >= ten_months_ago
                && r.date <= today
        })
}

/// Up to date for COVID: at least one COVID record in the trailing twelve
/// months.
pub fn is_covid_up_to_date(records: &[VaccineRecord], today: NaiveDate) -> bool {
    let twelve_months_ago = today.checked_sub_months(Months::new(12)).unwrap_or(NaiveDate::MIN);
    records
        .iter()
        .filter(|r| r.kind == VaccineKind::Covid)
        .any(|r| r.date >= twelve_months_ago && r.date <= today)
}
