use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resident::Resident;

/// A timestamped, immutable record of which residents were present at parse
/// time. Snapshots accumulate in a bounded, most-recent-first history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CensusSnapshot {
    pub id: String,
    pub created: DateTime<Utc>,
    pub raw_text: String,
    pub residents: Vec<Resident>,
    pub warnings: Vec<String>,
}

impl CensusSnapshot {
    /// Occupancy per unit label, for report consumers.
    pub fn unit_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.residents {
            *counts.entry(r.unit.label()).or_insert(0) += 1;
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.residents.len()
    }
}
