use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "ICN Suite";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The one canonical store key holding the persisted tracker snapshot.
/// Earlier deployments scattered state across variant keys and re-discovered
/// it by scanning; see `store::detect` for the migration-only heuristic.
pub const STATE_KEY: &str = "icn_suite_state_v1";

/// Store key holding the queue of pending import packs.
pub const QUEUE_KEY: &str = "icn_import_queue_v1";

/// Prefix for timestamp-suffixed pre-merge backups.
pub const BACKUP_PREFIX: &str = "icn_state_backup_";

/// Store key pointing at the most recently written backup.
pub const LATEST_BACKUP_KEY: &str = "icn_latest_backup_key_v1";

/// Accepted `version` value for bulk import packs.
pub const PACK_VERSION: &str = "icn-bulk-import-v1";

/// Census history is bounded, most-recent-first.
pub const CENSUS_HISTORY_CAP: usize = 120;

/// Facility-level configuration carried inside the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub facility_name: String,
    pub total_capacity: u32,
    /// Map from a room number's leading digit ("2") to a unit number.
    /// Used to infer the unit when a census paste carries no unit sections.
    pub unit_aliases: BTreeMap<String, u8>,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        let mut unit_aliases = BTreeMap::new();
        unit_aliases.insert("2".to_string(), 2);
        unit_aliases.insert("3".to_string(), 3);
        unit_aliases.insert("4".to_string(), 4);
        Self {
            facility_name: "Facility".to_string(),
            total_capacity: 150,
            unit_aliases,
        }
    }
}

/// Get the application data directory (`~/icn-suite/`).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("icn-suite")
}

/// Default location of the durable key-value store.
pub fn default_store_path() -> PathBuf {
    app_data_dir().join("tracker.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("icn-suite"));
    }

    #[test]
    fn default_store_path_under_app_data() {
        let path = default_store_path();
        assert!(path.starts_with(app_data_dir()));
        assert!(path.ends_with("tracker.db"));
    }

    #[test]
    fn default_config_aliases_cover_numbered_units() {
        let config = FacilityConfig::default();
        assert_eq!(config.unit_aliases.get("2"), Some(&2));
        assert_eq!(config.unit_aliases.get("3"), Some(&3));
        assert_eq!(config.unit_aliases.get("4"), Some(&4));
        assert!(config.unit_aliases.get("5").is_none());
    }
}
