//! The merge/dedup engine.
//!
//! Applies normalized pack parts to the persisted snapshot. The pre-merge
//! payload is backed up before anything else happens, so a failure at any
//! later point always leaves a recovery key behind. Duplicate records are
//! detected by deterministic per-dataset keys and dropped, which makes
//! re-applying the same pack a no-op.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::STATE_KEY;
use crate::models::{AntibioticCourse, InfectionCase, VaccineRecord};
use crate::store::{create_backup, GenericImport, StateStore, StoreError, TrackerState};

use super::legacy::{
    map_antibiotic, map_infection_case, map_vaccination, str_field, upsert_resident,
};
use super::pack::{normalize_pack, PackPart};

#[derive(Error, Debug)]
pub enum MergeError {
    /// Nothing to merge into: the tracker has never written its snapshot.
    #[error("Persisted tracker state not detected. Open the tracker once, then retry.")]
    StoreNotInitialized,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub added: usize,
}

/// What a merge did: per-dataset additions, total duplicates dropped, and
/// the keys involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub applied: Vec<DatasetReport>,
    pub dropped: usize,
    pub warnings: Vec<String>,
    pub backup_key: String,
    pub store_key: String,
}

/// Apply one or more packs to the persisted snapshot.
///
/// Fails only when the store was never initialized; every per-record
/// problem degrades into a warning or a dropped count.
pub fn apply_packs<S: StateStore>(
    store: &mut S,
    packs: &[Value],
    now: DateTime<Utc>,
) -> Result<MergeReport, MergeError> {
    let raw = store.get(STATE_KEY)?.ok_or(MergeError::StoreNotInitialized)?;

    // Backup before any other side effect, unconditionally.
    let backup_key = create_backup(store, now)?;

    let mut state = TrackerState::from_raw(&raw);
    let mut report = MergeReport {
        applied: Vec::new(),
        dropped: 0,
        warnings: Vec::new(),
        backup_key,
        store_key: STATE_KEY.to_string(),
    };

    // Seed dedup keys from everything already stored. Both the id form and
    // the composite form are seeded, so a re-imported record is caught
    // whether or not its source carried explicit ids.
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for rec in state.vaccinations.values().flatten() {
        seen.insert(format!("id:{}", rec.id.to_uppercase()));
        seen.insert(vax_dedup_key(rec));
    }
    for course in &state.antibiotics {
        seen.insert(format!("id:{}", course.id.to_uppercase()));
        seen.insert(abt_dedup_key(course));
    }
    for case in &state.infection_cases {
        seen.insert(format!("id:{}", case.id.to_uppercase()));
        seen.insert(ip_dedup_key(case));
    }

    let parts: Vec<PackPart> = packs.iter().filter_map(normalize_pack).flatten().collect();

    for part in parts {
        let dataset = part.dataset.to_lowercase();
        let mut added = 0usize;

        match dataset.as_str() {
            "residents" => {
                for raw_rec in &part.records {
                    let before = state.residents_by_id.len();
                    upsert_resident(raw_rec, &mut state.residents_by_id, now);
                    if state.residents_by_id.len() > before {
                        added += 1;
                    }
                }
            }
            "vaccinations" | "vax" | "vaccination" => {
                for raw_rec in &part.records {
                    let Some(record) = map_vaccination(
                        raw_rec,
                        &mut state.residents_by_id,
                        &mut report.warnings,
                        now,
                    ) else {
                        continue;
                    };
                    let key = incoming_key(raw_rec, vax_dedup_key(&record));
                    if !seen.insert(key) {
                        report.dropped += 1;
                        continue;
                    }
                    seen.insert(format!("id:{}", record.id.to_uppercase()));
                    seen.insert(vax_dedup_key(&record));
                    state.add_vaccination(record);
                    added += 1;
                }
            }
            "abt" | "antibiotics" | "antibiotic" => {
                for raw_rec in &part.records {
                    let Some(course) = map_antibiotic(
                        raw_rec,
                        &mut state.residents_by_id,
                        &mut report.warnings,
                        now,
                    ) else {
                        continue;
                    };
                    let key = incoming_key(raw_rec, abt_dedup_key(&course));
                    if !seen.insert(key) {
                        report.dropped += 1;
                        continue;
                    }
                    seen.insert(format!("id:{}", course.id.to_uppercase()));
                    seen.insert(abt_dedup_key(&course));
                    state.antibiotics.push(course);
                    added += 1;
                }
            }
            "ip" | "cases" | "infectioncases" => {
                for raw_rec in &part.records {
                    let Some(case) = map_infection_case(
                        raw_rec,
                        &mut state.residents_by_id,
                        &mut report.warnings,
                        now,
                    ) else {
                        continue;
                    };
                    let key = incoming_key(raw_rec, ip_dedup_key(&case));
                    if !seen.insert(key) {
                        report.dropped += 1;
                        continue;
                    }
                    seen.insert(format!("id:{}", case.id.to_uppercase()));
                    seen.insert(ip_dedup_key(&case));
                    state.infection_cases.push(case);
                    added += 1;
                }
            }
            // Forward compatibility: keep unknown datasets verbatim
            _ => {
                added = part.records.len();
                state.generic_imports.push(GenericImport {
                    dataset: dataset.clone(),
                    imported_at: now,
                    records: part.records,
                });
            }
        }

        report.applied.push(DatasetReport { dataset, added });
    }

    state.save(store)?;

    tracing::info!(
        datasets = report.applied.len(),
        added = report.applied.iter().map(|d| d.added).sum::<usize>(),
        dropped = report.dropped,
        backup = %report.backup_key,
        "Import packs applied"
    );

    Ok(report)
}

/// The key an incoming raw record deduplicates on: its explicit id when it
/// carries one, else the mapped record's composite key.
fn incoming_key(raw: &Value, composite: String) -> String {
    match str_field(raw, &["id"]) {
        Some(id) => format!("id:{}", id.to_uppercase()),
        None => composite,
    }
}

fn join_key(prefix: &str, fields: &[&str]) -> String {
    let joined = fields
        .iter()
        .map(|f| f.trim().to_uppercase())
        .collect::<Vec<_>>()
        .join("|");
    format!("{prefix}:{joined}")
}

fn vax_dedup_key(rec: &VaccineRecord) -> String {
    join_key(
        "vax",
        &[
            &rec.resident_id,
            rec.display_kind(),
            &rec.date.to_string(),
            rec.status.as_str(),
        ],
    )
}

fn abt_dedup_key(course: &AntibioticCourse) -> String {
    join_key(
        "abt",
        &[
            &course.resident_id,
            &course.antibiotic,
            course.route.as_deref().unwrap_or(""),
            &course.start_date.to_string(),
            &course.stop_date.map(|d| d.to_string()).unwrap_or_default(),
        ],
    )
}

fn ip_dedup_key(case: &InfectionCase) -> String {
    join_key(
        "ip",
        &[
            &case.resident_id,
            case.precaution.as_str(),
            case.isolation_type.as_deref().unwrap_or(""),
            &case.onset_date.to_string(),
            &case.resolved_date.map(|d| d.to_string()).unwrap_or_default(),
            if case.is_active() { "active" } else { "resolved" },
        ],
    )
}
