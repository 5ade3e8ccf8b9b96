//! Legacy JSON detection and tolerant field mapping.
//!
//! Uploaded blobs come from years of divergent export formats. Detection
//! scores the payload's key set against each dataset's signal substrings
//! and takes the best positive score; mapping derives every canonical field
//! from an ordered list of candidate source names so shape drift degrades
//! into missing optionals instead of failures. Records missing a mandatory
//! field are skipped with a warning, never fatally.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    make_id, AntibioticCourse, AntibioticStatus, InfectionCase, Precaution, Resident,
    ResidentStatus, Unit, VaccinationStatus, VaccineKind, VaccineRecord,
};

use super::dates::parse_date_loose;
use super::identity::{resident_key, IdentitySignals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyKind {
    Vaccination,
    Antibiotic,
    InfectionCase,
    Unknown,
}

impl LegacyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vaccination => "vaccination",
            Self::Antibiotic => "abt",
            Self::InfectionCase => "ip",
            Self::Unknown => "unknown",
        }
    }
}

const VAX_SIGNALS: &[&str] = &["vacc", "vax", "vaccine"];
const ABT_SIGNALS: &[&str] = &["antibi", "abx", "abt", "medication"];
const IP_SIGNALS: &[&str] = &["precaution", "isolation", "organism", "case", "infection", "syndrome"];

/// Result of running an unknown payload through detection and mapping.
#[derive(Debug, Clone)]
pub struct LegacyImport {
    pub kind: LegacyKind,
    pub residents: Vec<Resident>,
    pub vaccinations: Vec<VaccineRecord>,
    pub antibiotics: Vec<AntibioticCourse>,
    pub infection_cases: Vec<InfectionCase>,
    pub warnings: Vec<String>,
}

/// Score a payload's key set against each dataset's signals and return the
/// best positive match, or Unknown.
pub fn detect_kind(payload: &Value) -> LegacyKind {
    let keys = inspectable_keys(payload);

    let score = |signals: &[&str]| -> u32 {
        signals
            .iter()
            .filter(|sig| keys.iter().any(|k| k.contains(*sig)))
            .count() as u32
    };

    let mut best = (LegacyKind::Unknown, 0u32);
    for (kind, signals) in [
        (LegacyKind::Vaccination, VAX_SIGNALS),
        (LegacyKind::Antibiotic, ABT_SIGNALS),
        (LegacyKind::InfectionCase, IP_SIGNALS),
    ] {
        let s = score(signals);
        if s > best.1 {
            best = (kind, s);
        }
    }
    best.0
}

/// Key set inspected during detection: the object's keys, or the first
/// array element's keys when the payload is itself an array. Lowercased.
fn inspectable_keys(payload: &Value) -> Vec<String> {
    let obj = match payload {
        Value::Array(items) => items.first().and_then(Value::as_object),
        Value::Object(map) => Some(map),
        _ => None,
    };
    obj.map(|map| map.keys().map(|k| k.to_lowercase()).collect())
        .unwrap_or_default()
}

/// Detect a legacy payload's dataset and map its records into canonical
/// shapes, upserting one Resident per record from whatever identity signals
/// the row supplies. Unknown payloads produce a warning and zero records.
pub fn detect_and_map_legacy(payload: &Value, now: DateTime<Utc>) -> LegacyImport {
    let kind = detect_kind(payload);
    let mut out = LegacyImport {
        kind,
        residents: Vec::new(),
        vaccinations: Vec::new(),
        antibiotics: Vec::new(),
        infection_cases: Vec::new(),
        warnings: Vec::new(),
    };
    let mut residents: BTreeMap<String, Resident> = BTreeMap::new();

    match kind {
        LegacyKind::Vaccination => {
            let list = pick_array(payload, &["vaccinations", "vax", "vaxlog", "entries", "records"]);
            for raw in list {
                if let Some(record) = map_vaccination(raw, &mut residents, &mut out.warnings, now) {
                    out.vaccinations.push(record);
                }
            }
        }
        LegacyKind::Antibiotic => {
            let list = pick_array(payload, &["antibiotics", "abx", "abt", "entries", "records", "active"]);
            for raw in list {
                if let Some(record) = map_antibiotic(raw, &mut residents, &mut out.warnings, now) {
                    out.antibiotics.push(record);
                }
            }
        }
        LegacyKind::InfectionCase => {
            let list = pick_array(
                payload,
                &["infectionCases", "cases", "ip", "lineList", "linelist", "entries", "records"],
            );
            for raw in list {
                if let Some(record) = map_infection_case(raw, &mut residents, &mut out.warnings, now) {
                    out.infection_cases.push(record);
                }
            }
        }
        LegacyKind::Unknown => {
            out.warnings.push(
                "Could not confidently detect this legacy JSON format. \
                 Export a tracker JSON (ABT/Vax/IP) and re-import it here."
                    .to_string(),
            );
        }
    }

    out.residents = residents.into_values().collect();

    tracing::info!(
        kind = kind.as_str(),
        residents = out.residents.len(),
        records = out.vaccinations.len() + out.antibiotics.len() + out.infection_cases.len(),
        warnings = out.warnings.len(),
        "Legacy payload mapped"
    );

    out
}

/// Locate the record container: the payload itself when it is an array,
/// else the first object value whose key equals or contains a candidate.
pub fn pick_array<'a>(payload: &'a Value, candidates: &[&str]) -> &'a [Value] {
    if let Value::Array(items) = payload {
        return items;
    }
    let Value::Object(map) = payload else {
        return &[];
    };
    for cand in candidates {
        let cand_lower = cand.to_lowercase();
        let found = map.iter().find(|(k, v)| {
            let kl = k.to_lowercase();
            (kl == cand_lower || kl.contains(&cand_lower)) && v.is_array()
        });
        if let Some((_, Value::Array(items))) = found {
            return items;
        }
    }
    &[]
}

/// First present, non-empty candidate field rendered as a trimmed string.
/// Numbers are accepted (MRNs export both ways).
pub fn str_field(record: &Value, candidates: &[&str]) -> Option<String> {
    for name in candidates {
        match record.get(name) {
            Some(Value::String(s)) => {
                let t = s.trim();
                if !t.is_empty() {
                    return Some(t.to_string());
                }
            }
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn date_field(record: &Value, candidates: &[&str]) -> Option<chrono::NaiveDate> {
    str_field(record, candidates).and_then(|s| parse_date_loose(&s))
}

/// Resolve-or-create the record's resident from its identity signals.
/// Called exactly once per record, before the record is attached, so
/// repeated rows converge on one entity.
pub fn upsert_resident(
    record: &Value,
    residents: &mut BTreeMap<String, Resident>,
    now: DateTime<Utc>,
) -> Resident {
    let name = str_field(record, &["residentName", "name", "patientName", "Resident", "resident"])
        .unwrap_or_default();
    let mrn = str_field(record, &["mrn", "MRN", "residentMrn"]);
    let room = str_field(record, &["room", "Room", "roomNumber"]);
    let unit_label = str_field(record, &["unit", "Unit"]);
    let dob = str_field(record, &["dob", "DOB", "dateOfBirth"]);

    let id = resident_key(&IdentitySignals {
        mrn: mrn.as_deref(),
        room: room.as_deref(),
        name: Some(&name),
        unit: unit_label.as_deref(),
    });

    let entry = residents.entry(id.clone()).or_insert_with(|| Resident {
        id,
        display_name: if name.is_empty() { "Unknown".to_string() } else { name.clone() },
        mrn: None,
        room: None,
        unit: Unit::Unknown,
        status: ResidentStatus::Active,
        dob: None,
        payor_source: None,
        locked_room: None,
        locked_unit: None,
        last_seen: now,
        created: now,
        updated: None,
    });

    // Later rows fill in whatever earlier rows were missing
    if entry.mrn.is_none() {
        entry.mrn = mrn;
    }
    if entry.room.is_none() {
        entry.room = room;
    }
    if entry.dob.is_none() {
        entry.dob = dob;
    }
    entry.updated = Some(now);
    entry.clone()
}

/// Map one legacy vaccination row. Mandatory: resident name and date.
pub fn map_vaccination(
    record: &Value,
    residents: &mut BTreeMap<String, Resident>,
    warnings: &mut Vec<String>,
    now: DateTime<Utc>,
) -> Option<VaccineRecord> {
    let name = str_field(record, &["residentName", "name", "patientName", "Resident", "resident"]);
    let date = date_field(record, &["dateISO", "date", "givenDate", "Date"]);
    let date = match (name, date) {
        (Some(_), Some(date)) => date,
        (name, _) => {
            let who = name.unwrap_or_else(|| "unknown".to_string());
            warnings.push(format!("Skipped a vaccination row missing resident/date ({who})."));
            return None;
        }
    };

    let resident = upsert_resident(record, residents, now);

    let type_raw = str_field(record, &["vaccineType", "type", "vaxType", "vaccine", "Vaccine"]);
    let kind = type_raw.as_deref().map(VaccineKind::parse_loose).unwrap_or(VaccineKind::Other);
    let status = str_field(record, &["status", "Status"])
        .map(|s| VaccinationStatus::parse_loose(&s))
        .unwrap_or(VaccinationStatus::Given);

    Some(VaccineRecord {
        id: str_field(record, &["id"]).unwrap_or_else(|| make_id("vax")),
        resident_id: resident.id,
        kind,
        name_other: (kind == VaccineKind::Other).then_some(type_raw).flatten(),
        date,
        status,
        manufacturer: str_field(record, &["manufacturer", "mfg"]),
        lot: str_field(record, &["lot"]),
        route: str_field(record, &["route"]),
        notes: str_field(record, &["notes"]),
        created: now,
    })
}

/// Map one legacy antibiotic row. Mandatory: medication and start date.
pub fn map_antibiotic(
    record: &Value,
    residents: &mut BTreeMap<String, Resident>,
    warnings: &mut Vec<String>,
    now: DateTime<Utc>,
) -> Option<AntibioticCourse> {
    let medication = str_field(record, &["medication", "drug", "antibiotic", "abxName", "med"]);
    let start = date_field(record, &["startDateISO", "start", "startDate", "StartDate", "dateStart"]);
    let (Some(medication), Some(start)) = (medication, start) else {
        let who = str_field(record, &["residentName", "name", "patientName"])
            .unwrap_or_else(|| "unknown".to_string());
        warnings.push(format!("Skipped an ABT row missing medication/start ({who})."));
        return None;
    };

    let resident = upsert_resident(record, residents, now);

    let stop = date_field(record, &["stopDateISO", "stop", "end", "endDate", "StopDate", "dateStop"]);
    let status = match str_field(record, &["status", "Status"]).as_deref() {
        Some(s) if s.eq_ignore_ascii_case("stopped") => AntibioticStatus::Stopped,
        Some(s) if s.eq_ignore_ascii_case("active") => AntibioticStatus::Active,
        _ if stop.is_some() => AntibioticStatus::Stopped,
        _ => AntibioticStatus::Active,
    };

    Some(AntibioticCourse {
        id: str_field(record, &["id"]).unwrap_or_else(|| make_id("abt")),
        resident_id: resident.id,
        antibiotic: medication,
        start_date: start,
        stop_date: stop,
        route: str_field(record, &["route"]),
        dose: str_field(record, &["dose"]),
        frequency: str_field(record, &["frequency", "freq"]),
        indication: str_field(record, &["indication"]),
        ordered_by: str_field(record, &["orderedBy", "provider"]),
        status,
        notes: str_field(record, &["notes"]),
        created: now,
        updated: None,
    })
}

/// Map one legacy infection-case row. Mandatory: onset date.
pub fn map_infection_case(
    record: &Value,
    residents: &mut BTreeMap<String, Resident>,
    warnings: &mut Vec<String>,
    now: DateTime<Utc>,
) -> Option<InfectionCase> {
    let Some(onset) = date_field(record, &["onsetDateISO", "onset", "onsetDate", "OnsetDate", "date"])
    else {
        let who = str_field(record, &["residentName", "name"])
            .unwrap_or_else(|| "unknown".to_string());
        warnings.push(format!("Skipped an IP row missing onset date ({who})."));
        return None;
    };

    let resident = upsert_resident(record, residents, now);

    let precaution = str_field(record, &["precautions", "precaution", "precautionType", "isolation", "Precautions"])
        .map(|s| Precaution::parse_loose(&s))
        .unwrap_or(Precaution::Unknown);

    Some(InfectionCase {
        id: str_field(record, &["id"]).unwrap_or_else(|| make_id("ip")),
        resident_id: resident.id,
        onset_date: onset,
        syndrome: str_field(record, &["syndrome", "category"]),
        organism: str_field(record, &["organism", "pathogen"]),
        precaution,
        isolation_type: str_field(record, &["isolationType", "isolation"]),
        lab_date: date_field(record, &["labDateISO", "labDate"]),
        resolved_date: date_field(record, &["resolvedDateISO", "resolved", "resolutionDate", "ResolvedDate"]),
        notes: str_field(record, &["notes"]),
        created: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn antibiotics_container_detected_as_abt() {
        let payload = json!({
            "antibiotics": [
                {"name": "Jane Doe", "drug": "Ceftriaxone", "startDate": "2026-01-16"}
            ]
        });
        assert_eq!(detect_kind(&payload), LegacyKind::Antibiotic);

        let import = detect_and_map_legacy(&payload, Utc::now());
        assert_eq!(import.kind, LegacyKind::Antibiotic);
        assert_eq!(import.antibiotics.len(), 1);
        assert_eq!(import.antibiotics[0].antibiotic, "Ceftriaxone");
        assert_eq!(import.antibiotics[0].start_date.to_string(), "2026-01-16");
        assert_eq!(import.residents.len(), 1);
        assert_eq!(import.residents[0].display_name, "Jane Doe");
        assert!(import.warnings.is_empty());
    }

    #[test]
    fn detection_works_on_bare_arrays() {
        let payload = json!([
            {"resident": "Jane Doe", "vaccineType": "Flu", "date": "2025-10-01"}
        ]);
        assert_eq!(detect_kind(&payload), LegacyKind::Vaccination);
    }

    #[test]
    fn scoring_prefers_the_denser_signal_set() {
        // One vax signal vs. two ip signals
        let payload = json!({
            "vax": [],
            "cases": [{"precaution": "Contact", "organism": "MRSA"}],
            "isolationLog": []
        });
        assert_eq!(detect_kind(&payload), LegacyKind::InfectionCase);
    }

    #[test]
    fn unknown_payload_warns_instead_of_failing() {
        let import = detect_and_map_legacy(&json!({"totally": "unrelated"}), Utc::now());
        assert_eq!(import.kind, LegacyKind::Unknown);
        assert!(import.vaccinations.is_empty());
        assert_eq!(import.warnings.len(), 1);
        assert!(import.warnings[0].contains("Could not confidently detect"));
    }

    #[test]
    fn vaccination_rows_map_with_candidate_fields() {
        let payload = json!({
            "vaccinations": [
                {
                    "patientName": "SMITH, ANNE",
                    "mrn": "LON300001",
                    "vaccine": "Influenza",
                    "givenDate": "10/01/2025",
                    "status": "Refused",
                    "lot": "A123"
                }
            ]
        });
        let import = detect_and_map_legacy(&payload, Utc::now());
        assert_eq!(import.vaccinations.len(), 1);
        let rec = &import.vaccinations[0];
        assert_eq!(rec.kind, VaccineKind::Flu);
        assert_eq!(rec.date.to_string(), "2025-10-01");
        assert_eq!(rec.status, VaccinationStatus::Refused);
        assert_eq!(rec.lot.as_deref(), Some("A123"));
        assert_eq!(rec.resident_id, "mrn_LON300001");
    }

    #[test]
    fn mandatory_field_violations_skip_with_warning() {
        let payload = json!({
            "vaccinations": [
                {"residentName": "Jane Doe", "vaccineType": "Flu"},
                {"residentName": "Jane Doe", "vaccineType": "Flu", "date": "2025-10-01"}
            ]
        });
        let import = detect_and_map_legacy(&payload, Utc::now());
        assert_eq!(import.vaccinations.len(), 1);
        assert_eq!(import.warnings.len(), 1);
        assert!(import.warnings[0].contains("Jane Doe"));
    }

    #[test]
    fn repeated_rows_converge_on_one_resident() {
        let payload = json!({
            "antibiotics": [
                {"name": "Jane Doe", "mrn": "LON100001", "drug": "Ceftriaxone", "start": "2026-01-16"},
                {"name": "Jane Doe", "mrn": "LON100001", "drug": "Vancomycin", "start": "2026-01-18"}
            ]
        });
        let import = detect_and_map_legacy(&payload, Utc::now());
        assert_eq!(import.antibiotics.len(), 2);
        assert_eq!(import.residents.len(), 1);
        assert_eq!(import.antibiotics[0].resident_id, import.antibiotics[1].resident_id);
    }

    #[test]
    fn stop_date_implies_stopped_status() {
        let payload = json!({
            "antibiotics": [
                {"name": "Jane Doe", "drug": "Ceftriaxone", "start": "2026-01-10", "end": "2026-01-15"}
            ]
        });
        let import = detect_and_map_legacy(&payload, Utc::now());
        let course = &import.antibiotics[0];
        assert_eq!(course.status, AntibioticStatus::Stopped);
        assert_eq!(course.stop_date.map(|d| d.to_string()).as_deref(), Some("2026-01-15"));
    }

    #[test]
    fn infection_cases_map_precautions_loosely() {
        let payload = json!({
            "cases": [
                {
                    "residentName": "DOE, JOHN",
                    "onsetDate": "2026-01-10",
                    "precautions": "Enhanced Barrier",
                    "organism": "MRSA",
                    "isolationType": "private room"
                }
            ]
        });
        let import = detect_and_map_legacy(&payload, Utc::now());
        assert_eq!(import.infection_cases.len(), 1);
        let case = &import.infection_cases[0];
        assert_eq!(case.precaution, Precaution::EnhancedBarrier);
        assert_eq!(case.organism.as_deref(), Some("MRSA"));
        assert_eq!(case.isolation_type.as_deref(), Some("private room"));
        assert!(case.is_active());
    }

    #[test]
    fn explicit_ids_survive_mapping() {
        let payload = json!({
            "antibiotics": [
                {"id": "abt_legacy_1", "name": "Jane Doe", "drug": "Ceftriaxone", "start": "2026-01-16"}
            ]
        });
        let import = detect_and_map_legacy(&payload, Utc::now());
        assert_eq!(import.antibiotics[0].id, "abt_legacy_1");
    }

    #[test]
    fn numeric_mrn_accepted() {
        let payload = json!({
            "vaccinations": [
                {"name": "Jane Doe", "mrn": 202332, "vaccineType": "Flu", "date": "2025-10-01"}
            ]
        });
        let import = detect_and_map_legacy(&payload, Utc::now());
        assert_eq!(import.vaccinations[0].resident_id, "mrn_202332");
    }

    #[test]
    fn csv_records_flow_through_the_same_mapper() {
        let records =
            crate::pipeline::csv::parse_csv("name,medication,startDate\nJane Doe,Ceftriaxone,2026-01-16")
                .unwrap();
        let payload = Value::Array(records);
        // Array-of-records detection reads the first element's keys
        assert_eq!(detect_kind(&payload), LegacyKind::Antibiotic);
        let import = detect_and_map_legacy(&payload, Utc::now());
        assert_eq!(import.antibiotics.len(), 1);
    }
}
