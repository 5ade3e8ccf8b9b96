use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{VaccinationStatus, VaccineKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccineRecord {
    pub id: String,
    pub resident_id: String,
    pub kind: VaccineKind,
    /// Free-text qualifier when `kind` is Other.
    #[serde(default)]
    pub name_other: Option<String>,
    pub date: NaiveDate,
    pub status: VaccinationStatus,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created: DateTime<Utc>,
}

impl VaccineRecord {
    /// Human-facing vaccine name: the Other qualifier when present, else the
    /// category label.
    pub fn display_kind(&self) -> &str {
        match (&self.kind, self.name_other.as_deref()) {
            (VaccineKind::Other, Some(other)) if !other.is_empty() => other,
            (kind, _) => kind.as_str(),
        }
    }
}

/// Keep a resident's records newest-first by date. Stable, so records given
/// on the same day keep their insertion order.
pub fn sort_newest_first(records: &mut [VaccineRecord]) {
    records.sort_by(|a, b| b.date.cmp(&a.date));
}
