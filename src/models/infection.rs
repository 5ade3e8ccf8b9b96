use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Precaution;

/// An infection-prevention line-list case. Active until a resolution date is
/// recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfectionCase {
    pub id: String,
    pub resident_id: String,
    pub onset_date: NaiveDate,
    #[serde(default)]
    pub syndrome: Option<String>,
    #[serde(default)]
    pub organism: Option<String>,
    pub precaution: Precaution,
    #[serde(default)]
    pub isolation_type: Option<String>,
    #[serde(default)]
    pub lab_date: Option<NaiveDate>,
    #[serde(default)]
    pub resolved_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created: DateTime<Utc>,
}

impl InfectionCase {
    pub fn is_active(&self) -> bool {
        self.resolved_date.is_none()
    }
}
