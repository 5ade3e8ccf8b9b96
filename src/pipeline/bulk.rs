//! Bulk paste parsing: one vaccination or antibiotic entry per line.
//!
//! Parsing is two-phase. The lexical pass turns lines into typed draft rows
//! plus per-line error strings; the build pass resolves each row's resident
//! key against the live resident set and produces canonical records plus a
//! skip count. Callers show both error lists together.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::models::{
    make_id, AntibioticCourse, AntibioticStatus, Resident, VaccinationStatus, VaccineKind,
    VaccineRecord,
};

use super::dates::parse_date_loose;
use super::identity::ROOM_BED_RE;

static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkDataset {
    Vaccination,
    Antibiotic,
}

/// A lexically parsed paste line, before resident resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRow {
    pub line_no: usize,
    pub resident_key: String,
    /// Vaccine name or medication, depending on the dataset.
    pub value: String,
    pub date: NaiveDate,
    pub indication: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BulkParse {
    pub rows: Vec<BulkRow>,
    pub errors: Vec<String>,
}

/// Parse pasted bulk text. With a pre-selected resident the layout is
/// `value  date  …notes`; without one, the first column is a resident
/// lookup key. For antibiotics the column after the date is the indication
/// and the remainder becomes notes.
pub fn parse_bulk_rows(text: &str, dataset: BulkDataset, selected_key: Option<&str>) -> BulkParse {
    let selected = selected_key.map(str::trim).filter(|k| !k.is_empty());
    let mut out = BulkParse::default();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols = split_columns(line);

        let (key, value_col) = match selected {
            Some(key) => (key.to_string(), 0),
            None => match cols.first() {
                Some(first) => (first.clone(), 1),
                None => continue,
            },
        };

        if cols.len() < value_col + 2 {
            out.errors.push(format!("Line {line_no}: expected {}", layout_hint(dataset, selected.is_some())));
            continue;
        }

        let value = cols[value_col].trim().to_string();
        let date = parse_date_loose(&cols[value_col + 1]);
        let (Some(date), false) = (date, value.is_empty()) else {
            out.errors.push(match dataset {
                BulkDataset::Vaccination => format!("Line {line_no}: invalid vaccine type or date"),
                BulkDataset::Antibiotic => format!("Line {line_no}: invalid medication or date"),
            });
            continue;
        };

        let tail = &cols[(value_col + 2).min(cols.len())..];
        let (indication, notes) = match dataset {
            BulkDataset::Vaccination => (None, join_nonempty(tail)),
            BulkDataset::Antibiotic => {
                let indication = tail.first().map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
                let notes = join_nonempty(tail.get(1..).unwrap_or(&[]));
                (indication, notes)
            }
        };

        out.rows.push(BulkRow {
            line_no,
            resident_key: key,
            value,
            date,
            indication,
            notes,
        });
    }

    out
}

fn layout_hint(dataset: BulkDataset, selected: bool) -> &'static str {
    match (dataset, selected) {
        (BulkDataset::Vaccination, true) => "\"VaccineType  Date  Notes\"",
        (BulkDataset::Vaccination, false) => "\"ResidentKey  VaccineType  Date  Notes\"",
        (BulkDataset::Antibiotic, true) => "\"Medication  StartDate  Indication  Notes\"",
        (BulkDataset::Antibiotic, false) => "\"ResidentKey  Medication  StartDate  Indication  Notes\"",
    }
}

/// Per-line delimiter detection: tabs, then pipes, then runs of 2+ spaces.
/// Tab and pipe splits keep empty fields (a blank required column should
/// fail validation loudly); the space fallback drops them.
fn split_columns(line: &str) -> Vec<String> {
    if line.contains('\t') {
        return line.split('\t').map(|c| c.trim().to_string()).collect();
    }
    if line.contains('|') {
        return line.split('|').map(|c| c.trim().to_string()).collect();
    }
    SPACES_RE
        .split(line)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn join_nonempty(cols: &[String]) -> Option<String> {
    let joined = cols
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Resolve a pasted resident key against the live resident set. Tries, in
/// order: internal id, room-bed token against the current or locked room,
/// MRN (exact then substring), display name (exact then substring). First
/// match wins.
pub fn resolve_resident_key(
    residents: &BTreeMap<String, Resident>,
    key: &str,
) -> Option<String> {
    let k = key.trim();
    if k.is_empty() {
        return None;
    }

    if residents.contains_key(k) {
        return Some(k.to_string());
    }
    if let Some(id) = residents.keys().find(|id| id.eq_ignore_ascii_case(k)) {
        return Some(id.clone());
    }

    if ROOM_BED_RE.is_match(k) {
        for r in residents.values() {
            if r.current_room().is_some_and(|room| room.eq_ignore_ascii_case(k)) {
                return Some(r.id.clone());
            }
        }
    }

    let upper = k.to_uppercase();
    for r in residents.values() {
        if r.mrn.as_deref().is_some_and(|mrn| mrn.eq_ignore_ascii_case(k)) {
            return Some(r.id.clone());
        }
    }
    for r in residents.values() {
        if r.mrn.as_deref().is_some_and(|mrn| mrn.to_uppercase().contains(&upper)) {
            return Some(r.id.clone());
        }
    }

    for r in residents.values() {
        if r.display_name.eq_ignore_ascii_case(k) {
            return Some(r.id.clone());
        }
    }
    for r in residents.values() {
        if r.display_name.to_uppercase().contains(&upper) {
            return Some(r.id.clone());
        }
    }

    None
}

#[derive(Debug, Clone, Default)]
pub struct BuiltVaccinations {
    pub items: Vec<VaccineRecord>,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuiltAntibiotics {
    pub items: Vec<AntibioticCourse>,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Turn parsed vaccination rows into records, resolving each resident key.
/// Unresolvable keys skip the row and are counted.
pub fn build_vaccinations(
    residents: &BTreeMap<String, Resident>,
    rows: &[BulkRow],
    now: DateTime<Utc>,
) -> BuiltVaccinations {
    let mut out = BuiltVaccinations::default();
    for row in rows {
        let Some(resident_id) = resolve_resident_key(residents, &row.resident_key) else {
            out.errors.push(format!("resident not found: {}", row.resident_key));
            out.skipped += 1;
            continue;
        };
        let kind = VaccineKind::parse_loose(&row.value);
        out.items.push(VaccineRecord {
            id: make_id("vax"),
            resident_id,
            kind,
            name_other: (kind == VaccineKind::Other).then(|| row.value.clone()),
            date: row.date,
            status: VaccinationStatus::Given,
            manufacturer: None,
            lot: None,
            route: None,
            notes: row.notes.clone(),
            created: now,
        });
    }
    out
}

/// Turn parsed antibiotic rows into courses; every pasted course starts
/// active with no stop date.
pub fn build_antibiotics(
    residents: &BTreeMap<String, Resident>,
    rows: &[BulkRow],
    now: DateTime<Utc>,
) -> BuiltAntibiotics {
    let mut out = BuiltAntibiotics::default();
    for row in rows {
        let Some(resident_id) = resolve_resident_key(residents, &row.resident_key) else {
            out.errors.push(format!("resident not found: {}", row.resident_key));
            out.skipped += 1;
            continue;
        };
        out.items.push(AntibioticCourse {
            id: make_id("abt"),
            resident_id,
            antibiotic: row.value.clone(),
            start_date: row.date,
            stop_date: None,
            route: None,
            dose: None,
            frequency: None,
            indication: row.indication.clone(),
            ordered_by: None,
            status: AntibioticStatus::Active,
            notes: row.notes.clone(),
            created: now,
            updated: None,
        });
    }
    out
}
