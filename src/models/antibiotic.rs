use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::AntibioticStatus;

/// One antibiotic course. `status` is Stopped exactly when a stop date is
/// recorded; a stop date before the start date is accepted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntibioticCourse {
    pub id: String,
    pub resident_id: String,
    pub antibiotic: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub stop_date: Option<NaiveDate>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub dose: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub indication: Option<String>,
    #[serde(default)]
    pub ordered_by: Option<String>,
    pub status: AntibioticStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl AntibioticCourse {
    pub fn is_active(&self) -> bool {
        self.status == AntibioticStatus::Active && self.stop_date.is_none()
    }

    /// Stop the course. Stopping always records a stop date.
    pub fn stop(&mut self, stop_date: NaiveDate, now: DateTime<Utc>) {
        self.stop_date = Some(stop_date);
        self.status = AntibioticStatus::Stopped;
        self.updated = Some(now);
    }
}

/// Display ordering: active courses first, then by descending start date,
/// ties broken by descending creation time.
pub fn sort_for_display(courses: &mut [AntibioticCourse]) {
    courses.sort_by(|a, b| {
        b.is_active()
            .cmp(&a.is_active())
            .then(b.start_date.cmp(&a.start_date))
            .then(b.created.cmp(&a.created))
    });
}
