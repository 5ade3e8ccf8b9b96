use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::AntibioticCourse;

/// Stewardship flags for one course on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbxFlags {
    pub active: bool,
    /// Inclusive day of therapy: the start date is day 1. Never below 1.
    pub day_number: i64,
    /// Day-3 antibiotic time-out.
    pub review_due: bool,
    /// Day-7 reassessment.
    pub overdue: bool,
}

/// Inclusive days on therapy, floored at 1.
pub fn days_on_therapy(start: NaiveDate, today: NaiveDate) -> i64 {
    let days = (today - start).num_days() + 1;
    days.max(1)
}

pub fn evaluate(course: &AntibioticCourse, today: NaiveDate) -> AbxFlags {
    let active = course.is_active();
    let day_number = days_on_therapy(course.start_date, today);
    AbxFlags {
        active,
        day_number,
        review_due: active && day_number >= 3,
        overdue: active && day_number >= 7,
    }
}

/// Per-resident stewardship rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AbxSummary {
    pub active: usize,
    pub review_due: usize,
    pub overdue: usize,
}

pub fn summarize(courses: &[AntibioticCourse], today: NaiveDate) -> AbxSummary {
    let mut summary = AbxSummary::default();
    for course in courses.iter().filter(|c| c.is_active()) {
        summary.active += 1;
        let flags = evaluate(course, today);
        if flags.review_due {
            summary.review_due += 1;
        }
        if flags.overdue {
            summary.overdue += 1;
        }
    }
    summary
}
