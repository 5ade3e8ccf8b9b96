//! Detection of persisted tracker state in a foreign key-value store.
//!
//! Current deployments keep everything under the one canonical
//! [`crate::config::STATE_KEY`]. Older variants scattered state across
//! differently named keys, sometimes wrapped in a `{ "state": … }` envelope
//! by the persistence middleware. This module scores every key's payload for
//! the containers a tracker state would carry, so legacy storage blobs can
//! still be located and migrated. It is a migration utility only — nothing
//! in the merge path depends on it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{StateStore, StoreError};

/// A located candidate state key. `wrapped` marks an outer `{state: …}`
/// envelope; `score` is the detection confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateKeyInfo {
    pub key: String,
    pub wrapped: bool,
    pub score: u32,
}

/// Score a candidate payload by the presence of expected containers.
pub fn score_state(state: &Value) -> u32 {
    let mut score = 0;

    if state.get("modules").is_some_and(Value::is_object) {
        score += 5;
    }
    for path in [
        ["modules", "abt", "courses"],
        ["modules", "vaccinations", "records"],
        ["modules", "ip", "cases"],
    ] {
        let mut cursor = state;
        let mut found = true;
        for part in path {
            match cursor.get(part) {
                Some(next) => cursor = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found && cursor.is_array() {
            score += 5;
        }
    }

    let has_array = |keys: &[&str]| keys.iter().any(|k| state.get(k).is_some_and(Value::is_array));
    if has_array(&["abt", "antibiotics"]) {
        score += 3;
    }
    if has_array(&["vaccinations", "vax"]) {
        score += 3;
    }
    if has_array(&["ipCases", "ip", "cases"]) {
        score += 3;
    }

    if state.get("residentsById").is_some_and(Value::is_object) {
        score += 2;
    }

    score
}

/// Scan every key in the store and return the most plausible state key, or
/// None when nothing scores above zero. Unparseable values are skipped, not
/// fatal — the caller decides whether an empty result is an error.
pub fn detect_state_key<S: StateStore>(store: &S) -> Result<Option<StateKeyInfo>, StoreError> {
    let mut best: Option<StateKeyInfo> = None;

    for key in store.keys()? {
        let Some(raw) = store.get(&key)? else { continue };
        if raw.len() < 20 {
            continue;
        }
        if !raw.starts_with('{') && !raw.starts_with('[') {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };

        let wrapped = parsed.get("state").is_some_and(Value::is_object);
        let state = if wrapped { &parsed["state"] } else { &parsed };
        let score = score_state(state);
        if score == 0 {
            continue;
        }

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(StateKeyInfo { key, wrapped, score });
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn detects_bare_modular_state() {
        let mut store = MemoryStore::new();
        store
            .set(
                "some-app-key",
                &json!({
                    "modules": {
                        "abt": {"courses": []},
                        "vaccinations": {"records": []},
                        "ip": {"cases": []}
                    },
                    "residentsById": {}
                })
                .to_string(),
            )
            .unwrap();
        let info = detect_state_key(&store).unwrap().unwrap();
        assert_eq!(info.key, "some-app-key");
        assert!(!info.wrapped);
        assert_eq!(info.score, 22);
    }

    #[test]
    fn detects_wrapped_envelope() {
        let mut store = MemoryStore::new();
        store
            .set(
                "persist:tracker",
                &json!({"state": {"antibiotics": [], "residentsById": {}}, "version": 3}).to_string(),
            )
            .unwrap();
        let info = detect_state_key(&store).unwrap().unwrap();
        assert!(info.wrapped);
        assert_eq!(info.score, 5);
    }

    #[test]
    fn prefers_higher_scoring_key() {
        let mut store = MemoryStore::new();
        store
            .set("weak", &json!({"vaccinations": [], "padding": "xxxxxxxx"}).to_string())
            .unwrap();
        store
            .set(
                "strong",
                &json!({"modules": {"abt": {"courses": []}}, "residentsById": {}}).to_string(),
            )
            .unwrap();
        let info = detect_state_key(&store).unwrap().unwrap();
        assert_eq!(info.key, "strong");
    }

    #[test]
    fn skips_corrupt_and_irrelevant_values() {
        let mut store = MemoryStore::new();
        store.set("short", "{}").unwrap();
        store.set("not-json", "this is not json at all, much too plain").unwrap();
        store.set("broken", "{\"modules\": {\"abt\": unterminated").unwrap();
        assert_eq!(detect_state_key(&store).unwrap(), None);
    }
}
