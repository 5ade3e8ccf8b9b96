use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ResidentStatus, Unit};

/// A facility resident. The `id` is assigned once by the identity resolver
/// and never changes; everything else may be updated by later censuses or
/// imports. A discharged resident keeps its last known location in the
/// `locked_*` fields for historical display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub mrn: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub unit: Unit,
    pub status: ResidentStatus,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub payor_source: Option<String>,
    #[serde(default)]
    pub locked_room: Option<String>,
    #[serde(default)]
    pub locked_unit: Option<Unit>,
    pub last_seen: DateTime<Utc>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl Resident {
    /// Current room, falling back to the locked room after discharge.
    pub fn current_room(&self) -> Option<&str> {
        self.room.as_deref().or(self.locked_room.as_deref())
    }

    /// Current unit, falling back to the locked unit after discharge.
    pub fn current_unit(&self) -> Unit {
        if self.unit != Unit::Unknown {
            self.unit
        } else {
            self.locked_unit.unwrap_or(Unit::Unknown)
        }
    }
}
