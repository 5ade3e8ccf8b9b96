//! The persisted tracker snapshot and its lifecycle: load/save against the
//! canonical store key, backup-before-write, census application with
//! discharge locking, and the pending import-pack queue.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{
    FacilityConfig, BACKUP_PREFIX, CENSUS_HISTORY_CAP, LATEST_BACKUP_KEY, QUEUE_KEY, STATE_KEY,
};
use crate::models::{
    sort_newest_first, AntibioticCourse, CensusSnapshot, InfectionCase, Resident, ResidentStatus,
    Unit, VaccineRecord,
};

use super::{StateStore, StoreError};

pub const SCHEMA_VERSION: u32 = 1;

/// Records from datasets this build does not understand, kept verbatim so a
/// newer build can pick them up later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericImport {
    pub dataset: String,
    pub imported_at: DateTime<Utc>,
    pub records: Vec<Value>,
}

/// The whole persisted snapshot. Lives under [`STATE_KEY`] as one JSON
/// document; every mutation goes through load → modify → save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub config: FacilityConfig,
    #[serde(default)]
    pub residents_by_id: BTreeMap<String, Resident>,
    #[serde(default)]
    pub census_history: Vec<CensusSnapshot>,
    /// Resident id → records, newest first by date.
    #[serde(default)]
    pub vaccinations: BTreeMap<String, Vec<VaccineRecord>>,
    #[serde(default)]
    pub antibiotics: Vec<AntibioticCourse>,
    #[serde(default)]
    pub infection_cases: Vec<InfectionCase>,
    #[serde(default)]
    pub generic_imports: Vec<GenericImport>,
    /// One-shot migration stamps, keyed by migration name.
    #[serde(default)]
    pub migrations: BTreeMap<String, String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            config: FacilityConfig::default(),
            residents_by_id: BTreeMap::new(),
            census_history: Vec::new(),
            vaccinations: BTreeMap::new(),
            antibiotics: Vec::new(),
            infection_cases: Vec::new(),
            generic_imports: Vec::new(),
            migrations: BTreeMap::new(),
        }
    }
}

impl TrackerState {
    /// Load the snapshot from the canonical key. A missing or corrupt value
    /// yields the default empty state; reading never fails on bad content.
    pub fn load<S: StateStore>(store: &S) -> Result<Self, StoreError> {
        match store.get(STATE_KEY)? {
            None => Ok(Self::default()),
            Some(raw) => Ok(Self::from_raw(&raw)),
        }
    }

    /// Parse a raw persisted payload, falling back to the default state when
    /// it does not deserialize.
    pub fn from_raw(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Persisted tracker state unreadable, starting empty");
                Self::default()
            }
        }
    }

    pub fn save<S: StateStore>(&self, store: &mut S) -> Result<(), StoreError> {
        let raw = serde_json::to_string(self)?;
        store.set(STATE_KEY, &raw)
    }

    /// Apply a parsed census snapshot: every listed resident becomes active
    /// with a fresh last-seen stamp; every previously known resident missing
    /// from the snapshot is discharged once, locking its room and unit for
    /// historical reference. The snapshot itself joins the bounded history.
    pub fn apply_census(&mut self, snapshot: &CensusSnapshot, now: DateTime<Utc>) {
        for parsed in &snapshot.residents {
            match self.residents_by_id.get_mut(&parsed.id) {
                Some(existing) => {
                    existing.display_name = parsed.display_name.clone();
                    if parsed.mrn.is_some() {
                        existing.mrn = parsed.mrn.clone();
                    }
                    if parsed.room.is_some() {
                        existing.room = parsed.room.clone();
                    }
                    if parsed.unit != Unit::Unknown {
                        existing.unit = parsed.unit;
                    }
                    if parsed.dob.is_some() {
                        existing.dob = parsed.dob.clone();
                    }
                    if parsed.payor_source.is_some() {
                        existing.payor_source = parsed.payor_source.clone();
                    }
                    existing.status = ResidentStatus::Active;
                    existing.last_seen = snapshot.created;
                    existing.updated = Some(now);
                }
                None => {
                    self.residents_by_id.insert(parsed.id.clone(), parsed.clone());
                }
            }
        }

        let on_census: std::collections::BTreeSet<&str> =
            snapshot.residents.iter().map(|r| r.id.as_str()).collect();
        for (id, resident) in self.residents_by_id.iter_mut() {
            if on_census.contains(id.as_str()) {
                continue;
            }
            if resident.status != ResidentStatus::Discharged {
                resident.status = ResidentStatus::Discharged;
                resident.locked_room = resident.room.take().or(resident.locked_room.take());
                if resident.unit != Unit::Unknown {
                    resident.locked_unit = Some(resident.unit);
                } else if resident.locked_unit.is_none() {
                    resident.locked_unit = Some(Unit::Unknown);
                }
                resident.unit = Unit::Unknown;
                resident.updated = Some(now);
            }
        }

        self.census_history.insert(0, snapshot.clone());
        self.census_history.truncate(CENSUS_HISTORY_CAP);

        tracing::info!(
            residents = snapshot.residents.len(),
            warnings = snapshot.warnings.len(),
            "Census applied"
        );
    }

    /// Attach a vaccination record to its resident, keeping the resident's
    /// list newest-first.
    pub fn add_vaccination(&mut self, record: VaccineRecord) {
        let list = self.vaccinations.entry(record.resident_id.clone()).or_default();
        list.push(record);
        sort_newest_first(list);
    }

    pub fn vaccinations_for(&self, resident_id: &str) -> &[VaccineRecord] {
        self.vaccinations.get(resident_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Write the current raw payload (whatever it is) to a timestamp-suffixed
/// backup key and point the latest-backup marker at it. Returns the backup
/// key. Merge paths call this before any other side effect.
pub fn create_backup<S: StateStore>(store: &mut S, now: DateTime<Utc>) -> Result<String, StoreError> {
    let raw = store.get(STATE_KEY)?.unwrap_or_default();
    let stamp = now.format("%Y-%m-%d-%H-%M-%S");
    let backup_key = format!("{BACKUP_PREFIX}{stamp}");
    store.set(&backup_key, &raw)?;
    store.set(LATEST_BACKUP_KEY, &backup_key)?;
    tracing::info!(key = %backup_key, bytes = raw.len(), "Pre-merge backup written");
    Ok(backup_key)
}

/// The most recently written backup key, if any.
pub fn latest_backup_key<S: StateStore>(store: &S) -> Result<Option<String>, StoreError> {
    store.get(LATEST_BACKUP_KEY)
}

/// Read the pending import-pack queue. Missing or corrupt → empty.
pub fn read_queue<S: StateStore>(store: &S) -> Result<Vec<Value>, StoreError> {
    let Some(raw) = store.get(QUEUE_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

/// Append a pack to the pending queue.
pub fn enqueue_pack<S: StateStore>(store: &mut S, pack: Value) -> Result<(), StoreError> {
    let mut queue = read_queue(store)?;
    queue.push(pack);
    store.set(QUEUE_KEY, &Value::Array(queue).to_string())
}

pub fn clear_queue<S: StateStore>(store: &mut S) -> Result<(), StoreError> {
    store.set(QUEUE_KEY, "[]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::make_id;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn resident(id: &str, room: &str, unit: Unit, seen: DateTime<Utc>) -> Resident {
        Resident {
            id: id.into(),
            display_name: format!("RES {}", id.to_uppercase()),
            mrn: None,
            room: Some(room.into()),
            unit,
            status: ResidentStatus::Active,
            dob: None,
            payor_source: None,
            locked_room: None,
            locked_unit: None,
            last_seen: seen,
            created: seen,
            updated: None,
        }
    }

    fn snapshot(id: &str, created: DateTime<Utc>, residents: Vec<Resident>) -> CensusSnapshot {
        CensusSnapshot {
            id: id.into(),
            created,
            raw_text: String::new(),
            residents,
            warnings: vec![],
        }
    }

    #[test]
    fn load_missing_and_corrupt_default_to_empty() {
        let mut store = MemoryStore::new();
        let state = TrackerState::load(&store).unwrap();
        assert!(state.residents_by_id.is_empty());

        store.set(STATE_KEY, "not json {{{").unwrap();
        let state = TrackerState::load(&store).unwrap();
        assert!(state.residents_by_id.is_empty());
        assert_eq!(state.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn save_load_round_trip() {
        let mut store = MemoryStore::new();
        let mut state = TrackerState::default();
        state
            .residents_by_id
            .insert("mrn_A".into(), resident("mrn_A", "251-A", Unit::Numbered(2), ts(0)));
        state.save(&mut store).unwrap();

        let loaded = TrackerState::load(&store).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn census_round_trip_discharges_and_locks_location() {
        let mut state = TrackerState::default();
        let a = snapshot(
            "c_a",
            ts(100),
            vec![
                resident("mrn_A", "251-A", Unit::Numbered(2), ts(100)),
                resident("mrn_B", "318-B", Unit::Numbered(3), ts(100)),
            ],
        );
        state.apply_census(&a, ts(100));

        // B absent from the next census
        let b = snapshot(
            "c_b",
            ts(200),
            vec![resident("mrn_A", "251-A", Unit::Numbered(2), ts(200))],
        );
        state.apply_census(&b, ts(200));

        let gone = &state.residents_by_id["mrn_B"];
        assert_eq!(gone.status, ResidentStatus::Discharged);
        assert_eq!(gone.locked_room.as_deref(), Some("318-B"));
        assert_eq!(gone.locked_unit, Some(Unit::Numbered(3)));
        assert_eq!(gone.current_room(), Some("318-B"));

        let stayed = &state.residents_by_id["mrn_A"];
        assert_eq!(stayed.status, ResidentStatus::Active);
        assert_eq!(stayed.last_seen, ts(200));
    }

    #[test]
    fn returning_resident_reactivates_with_same_id() {
        let mut state = TrackerState::default();
        state.apply_census(
            &snapshot("c_a", ts(100), vec![resident("mrn_A", "251-A", Unit::Numbered(2), ts(100))]),
            ts(100),
        );
        state.apply_census(&snapshot("c_b", ts(200), vec![]), ts(200));
        assert_eq!(state.residents_by_id["mrn_A"].status, ResidentStatus::Discharged);

        state.apply_census(
            &snapshot("c_c", ts(300), vec![resident("mrn_A", "404-C", Unit::Numbered(4), ts(300))]),
            ts(300),
        );
        let back = &state.residents_by_id["mrn_A"];
        assert_eq!(back.status, ResidentStatus::Active);
        assert_eq!(back.room.as_deref(), Some("404-C"));
        assert_eq!(state.residents_by_id.len(), 1);
    }

    #[test]
    fn census_history_is_bounded_most_recent_first() {
        let mut state = TrackerState::default();
        for i in 0..(CENSUS_HISTORY_CAP + 5) {
            let snap = snapshot(&format!("c_{i}"), ts(i as i64), vec![]);
            state.apply_census(&snap, ts(i as i64));
        }
        assert_eq!(state.census_history.len(), CENSUS_HISTORY_CAP);
        assert_eq!(state.census_history[0].id, format!("c_{}", CENSUS_HISTORY_CAP + 4));
    }

    #[test]
    fn vaccinations_kept_newest_first_per_resident() {
        let mut state = TrackerState::default();
        for date in ["2025-10-01", "2026-01-16", "2024-06-12"] {
            state.add_vaccination(VaccineRecord {
                id: make_id("vax"),
                resident_id: "mrn_A".into(),
                kind: crate::models::VaccineKind::Flu,
                name_other: None,
                date: date.parse().unwrap(),
                status: crate::models::VaccinationStatus::Given,
                manufacturer: None,
                lot: None,
                route: None,
                notes: None,
                created: ts(0),
            });
        }
        let dates: Vec<String> = state
            .vaccinations_for("mrn_A")
            .iter()
            .map(|r| r.date.to_string())
            .collect();
        assert_eq!(dates, vec!["2026-01-16", "2025-10-01", "2024-06-12"]);
        assert!(state.vaccinations_for("nobody").is_empty());
    }

    #[test]
    fn backup_preserves_raw_payload_and_marks_latest() {
        let mut store = MemoryStore::new();
        store.set(STATE_KEY, "{\"payload\": true}").unwrap();

        let key = create_backup(&mut store, ts(1_700_000_000)).unwrap();
        assert!(key.starts_with(BACKUP_PREFIX));
        assert_eq!(store.get(&key).unwrap().as_deref(), Some("{\"payload\": true}"));
        assert_eq!(latest_backup_key(&store).unwrap(), Some(key));
    }

    #[test]
    fn queue_round_trip() {
        let mut store = MemoryStore::new();
        assert!(read_queue(&store).unwrap().is_empty());

        enqueue_pack(&mut store, json!({"version": "icn-bulk-import-v1"})).unwrap();
        enqueue_pack(&mut store, json!({"version": "icn-bulk-import-v1", "source": "b"})).unwrap();
        assert_eq!(read_queue(&store).unwrap().len(), 2);

        clear_queue(&mut store).unwrap();
        assert!(read_queue(&store).unwrap().is_empty());

        store.set(QUEUE_KEY, "corrupt").unwrap();
        assert!(read_queue(&store).unwrap().is_empty());
    }
}
