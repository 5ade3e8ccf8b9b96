//! Census report text → a dated resident snapshot.
//!
//! Facility census exports arrive as pasted text with a shifting mix of
//! report headers, unit section banners, column labels, and tab- or
//! space-aligned data rows. The parser makes a single pass, keeping a
//! current-unit cursor from section banners, discarding recognized metadata
//! lines silently, and accepting only rows that begin with a room-bed
//! token. Rows it cannot read become warnings, never errors.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::FacilityConfig;
use crate::models::{make_id, CensusSnapshot, Resident, ResidentStatus, Unit};

use super::dates::normalize_date_iso;
use super::identity::{resident_key, IdentitySignals};

/// "Unit: Unit 3" section banner.
static UNIT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Unit:\s*Unit\s*(\d)\b").unwrap());

/// A data row must start with a room-bed token.
static LINE_START_ROOM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,4}-[A-Za-z0-9]+").unwrap());

static TABS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());
static PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]*)\)").unwrap());
static DOB_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{2,4}$").unwrap());

/// Report-metadata line prefixes, discarded without comment.
const METADATA_PREFIXES: &[&str] = &[
    "DATE:",
    "TIME:",
    "USER:",
    "UNIT:",
    "FLOOR:",
    "FACILITY",
    "PAGE",
    "CENSUS",
    "ROOM-BED",
    "CARE LEVEL",
    "RESIDENT",
    "STATUS",
    "PAYOR",
    "BED",
    "CERTIFICATION",
];

const PAYOR_TOKENS: &[&str] = &[
    "MEDICARE",
    "MEDICAID",
    "HMO",
    "MANAGED",
    "PRIVATE",
    "COMMERCIAL",
    "BCBS",
    "AETNA",
    "UNITED",
    "HUMANA",
    "CIGNA",
    "KAISER",
    "TRICARE",
    "SELF PAY",
];

/// Parse a pasted census report into a snapshot. Never fails: unreadable
/// content degrades into skipped lines and warnings.
pub fn parse_census(raw: &str, config: &FacilityConfig, now: DateTime<Utc>) -> CensusSnapshot {
    let mut residents: Vec<Resident> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut seen_ids: BTreeSet<String> = BTreeSet::new();
    let mut current_unit = Unit::Unknown;

    for raw_line in raw.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        // Section banner updates the cursor; it must win over the metadata
        // discard below, which also matches "UNIT:".
        if let Some(caps) = UNIT_HEADER_RE.captures(line) {
            if let Ok(digit) = caps[1].parse::<u8>() {
                current_unit = Unit::Numbered(digit);
            }
            continue;
        }

        let upper = line.to_uppercase();
        if METADATA_PREFIXES.iter().any(|p| upper.starts_with(p)) {
            continue;
        }
        if !LINE_START_ROOM_RE.is_match(line) {
            continue;
        }

        let cols = split_report_columns(line);
        if cols.len() < 2 {
            continue;
        }
        let room = cols[0].clone();
        let name_field = cols[1].trim();

        // Unoccupied bed rows are expected, not noteworthy.
        if name_field.is_empty() || name_field.to_uppercase().contains("EMPTY") {
            continue;
        }

        let mrn = PAREN_RE
            .captures(name_field)
            .map(|caps| caps[1].trim().to_string())
            .filter(|code| !code.is_empty());
        let display_name = PAREN_RE
            .replace_all(name_field, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if display_name.is_empty() {
            warnings.push(format!("Skipped row in room {room}: no readable resident name"));
            continue;
        }

        let dob = cols.get(2).map(|c| c.trim()).filter(|c| DOB_RE.is_match(c));
        let payor = cols.iter().skip(2).find_map(|c| {
            let u = c.trim().to_uppercase();
            PAYOR_TOKENS
                .iter()
                .any(|p| u.contains(p))
                .then(|| c.trim().to_string())
        });

        let unit = if current_unit != Unit::Unknown {
            current_unit
        } else {
            Unit::from_room(&room, &config.unit_aliases)
        };

        let id = resident_key(&IdentitySignals {
            mrn: mrn.as_deref(),
            room: Some(&room),
            name: Some(&display_name),
            unit: None,
        });
        if !seen_ids.insert(id.clone()) {
            continue;
        }

        residents.push(Resident {
            id,
            display_name,
            mrn,
            room: Some(room),
            unit,
            status: ResidentStatus::Active,
            dob: dob.map(|d| normalize_date_iso(d).unwrap_or_else(|| d.to_string())),
            payor_source: payor,
            locked_room: None,
            locked_unit: None,
            last_seen: now,
            created: now,
            updated: None,
        });
    }

    if residents.is_empty() {
        warnings.push("No residents parsed. Check the formatting of the census paste.".to_string());
    }

    tracing::debug!(
        residents = residents.len(),
        warnings = warnings.len(),
        "Census text parsed"
    );

    CensusSnapshot {
        id: make_id("c"),
        created: now,
        raw_text: raw.to_string(),
        residents,
        warnings,
    }
}

/// Split a report row: runs of tabs first; when that yields fewer than two
/// columns, fall back to runs of two-or-more spaces.
fn split_report_columns(line: &str) -> Vec<String> {
    let by_tabs: Vec<String> = TABS_RE
        .split(line)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if by_tabs.len() >= 2 {
        return by_tabs;
    }
    SPACES_RE
        .split(line)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> CensusSnapshot {
        parse_census(raw, &FacilityConfig::default(), Utc::now())
    }

    #[test]
    fn full_row_yields_resident_with_mrn_identity() {
        let snapshot = parse("251-A\tDOE, JOHN (LON202332)\t5/12/1967\tActive");
        assert_eq!(snapshot.residents.len(), 1);
        let r = &snapshot.residents[0];
        assert_eq!(r.id, "mrn_LON202332");
        assert_eq!(r.display_name, "DOE, JOHN");
        assert_eq!(r.room.as_deref(), Some("251-A"));
        assert_eq!(r.mrn.as_deref(), Some("LON202332"));
        assert_eq!(r.dob.as_deref(), Some("1967-05-12"));
        assert_eq!(r.unit, Unit::Numbered(2));
        assert_eq!(r.status, ResidentStatus::Active);
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn header_lines_dropped_silently() {
        let snapshot = parse("Date: 01/16/2026");
        assert!(snapshot.residents.is_empty());
        // Only the generic empty-result advisory, not a per-line error
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(snapshot.warnings[0].contains("No residents parsed"));
    }

    #[test]
    fn empty_bed_rows_skipped_without_warning() {
        let snapshot = parse(
            "251-A\tEMPTY BED\t\t\t\n251-B\tDOE, JANE (LON100001)\t1/2/1950\tActive",
        );
        assert_eq!(snapshot.residents.len(), 1);
        assert_eq!(snapshot.residents[0].id, "mrn_LON100001");
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn unit_banner_sets_cursor_until_next_banner() {
        let raw = "Unit: Unit 3\n\
                   318-B\tSMITH, ANNE (LON300001)\tActive\n\
                   Unit: Unit 4\n\
                   404-C\tJONES, MARK (LON400001)\tActive";
        let snapshot = parse(raw);
        assert_eq!(snapshot.residents[0].unit, Unit::Numbered(3));
        assert_eq!(snapshot.residents[1].unit, Unit::Numbered(4));
    }

    #[test]
    fn unit_inferred_from_room_digit_without_banner() {
        let snapshot = parse("404-C\tJONES, MARK\tActive");
        assert_eq!(snapshot.residents[0].unit, Unit::Numbered(4));
        // No facility code: identity falls back to room+name
        assert_eq!(snapshot.residents[0].id, "room_404-C_jones-mark");
    }

    #[test]
    fn space_aligned_rows_fall_back_to_two_space_split() {
        let snapshot = parse("251-A   DOE, JOHN (LON202332)   5/12/1967   Active");
        assert_eq!(snapshot.residents.len(), 1);
        assert_eq!(snapshot.residents[0].id, "mrn_LON202332");
        assert_eq!(snapshot.residents[0].display_name, "DOE, JOHN");
    }

    #[test]
    fn unreadable_name_warns_and_skips() {
        let snapshot = parse("251-A\t(LON202332)\tActive");
        assert!(snapshot.residents.is_empty());
        assert!(snapshot.warnings.iter().any(|w| w.contains("251-A")));
    }

    #[test]
    fn repeated_rows_collapse_to_first() {
        let raw = "251-A\tDOE, JOHN (LON202332)\tActive\n\
                   251-A\tDOE, JOHN (LON202332)\tActive";
        let snapshot = parse(raw);
        assert_eq!(snapshot.residents.len(), 1);
    }

    #[test]
    fn payor_column_captured() {
        let snapshot = parse("251-A\tDOE, JOHN (LON202332)\t5/12/1967\tMedicare A");
        assert_eq!(snapshot.residents[0].payor_source.as_deref(), Some("Medicare A"));
    }

    #[test]
    fn non_room_lines_dropped_without_warning() {
        let snapshot = parse(
            "Long Beach Nursing & Rehabilitation Center\n\
             Resident Census Report\n\
             251-A\tDOE, JOHN (LON202332)\tActive",
        );
        assert_eq!(snapshot.residents.len(), 1);
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn residents_keep_file_order() {
        let raw = "318-B\tSMITH, ANNE (LON300001)\tActive\n\
                   251-A\tDOE, JOHN (LON202332)\tActive";
        let snapshot = parse(raw);
        let ids: Vec<&str> = snapshot.residents.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["mrn_LON300001", "mrn_LON202332"]);
    }
}
