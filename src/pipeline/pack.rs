//! Bulk import pack normalization.
//!
//! The `icn-bulk-import-v1` wire format appears in three shapes: named
//! top-level dataset arrays, a single `dataset` + `records` pair, or a
//! `datasets` list of such pairs. All three normalize to the same parts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PACK_VERSION;

/// One dataset's worth of raw records from a pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackPart {
    pub dataset: String,
    pub records: Vec<Value>,
}

/// Keys of the pack envelope itself, never dataset names.
const RESERVED_KEYS: &[&str] = &["version", "createdAt", "source", "generatedAt", "recordCount"];

/// Normalize a pack into dataset parts. Returns None when the payload is
/// not a pack at all (wrong or missing version), so callers can fall back
/// to legacy detection.
pub fn normalize_pack(pack: &Value) -> Option<Vec<PackPart>> {
    let version = pack.get("version").and_then(Value::as_str)?;
    if version != PACK_VERSION {
        return None;
    }

    // Multi-dataset form
    if let Some(Value::Array(datasets)) = pack.get("datasets") {
        let parts = datasets
            .iter()
            .map(|d| PackPart {
                dataset: d
                    .get("dataset")
                    .and_then(Value::as_str)
                    .unwrap_or("generic")
                    .to_string(),
                records: d
                    .get("records")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        return Some(parts);
    }

    // Single-dataset form
    if let Some(Value::Array(records)) = pack.get("records") {
        return Some(vec![PackPart {
            dataset: pack
                .get("dataset")
                .and_then(Value::as_str)
                .unwrap_or("generic")
                .to_string(),
            records: records.clone(),
        }]);
    }

    // Named top-level arrays: {"vaccinations": [...], "abt": [...]}
    let Value::Object(map) = pack else {
        return Some(Vec::new());
    };
    let parts: Vec<PackPart> = map
        .iter()
        .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
        .filter_map(|(k, v)| {
            v.as_array().map(|records| PackPart {
                dataset: k.clone(),
                records: records.clone(),
            })
        })
        .collect();
    Some(parts)
}

/// Parse pasted text that should contain a JSON object, tolerating leading
/// and trailing junk around the outermost braces.
pub fn parse_maybe_json_text(text: &str) -> Option<Value> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(t) {
        return Some(value);
    }
    let start = t.find('{')?;
    let end = t.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&t[start..=end]).ok()
}
