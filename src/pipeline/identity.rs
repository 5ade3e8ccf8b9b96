//! Stable resident identity from partial signals.
//!
//! Every ingestion path funnels through [`resident_key`] so that the same
//! person, seen again with the same signals, lands on the same record.
//! Different signal sets for the same person (MRN in one import, name+room
//! in another) can still mint two keys; reconciling those is a follow-on
//! feature, not something this resolver guesses at.

use std::sync::LazyLock;

use regex::Regex;

/// Room-bed token, e.g. "251-A" or "1012-B2".
pub static ROOM_BED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,4}-[A-Za-z0-9]+$").unwrap());

/// Partial identity signals available for a resident at ingestion time.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySignals<'a> {
    pub mrn: Option<&'a str>,
    pub room: Option<&'a str>,
    pub name: Option<&'a str>,
    pub unit: Option<&'a str>,
}

/// Derive the stable key. Priority: facility code/MRN, then room-bed plus
/// slugified name, then a hash of name and room. Identical signals always
/// produce identical keys; the original casing of an MRN is preserved in
/// the key (comparisons elsewhere are case-insensitive).
pub fn resident_key(signals: &IdentitySignals) -> String {
    let mrn = signals.mrn.unwrap_or("").trim();
    if !mrn.is_empty() {
        return format!("mrn_{mrn}");
    }

    let room = signals.room.unwrap_or("").trim();
    let name = signals.name.unwrap_or("").trim();
    if ROOM_BED_RE.is_match(room) {
        return format!("room_{room}_{}", slugify(name));
    }

    let basis = format!("{}|{}", name.to_lowercase(), room.to_lowercase());
    format!("r_{:x}", hash31(&basis))
}

/// Multiplier-31 polynomial rolling hash over UTF-16 code units, wrapping
/// in u32. Deterministic and reproducible across implementations.
pub fn hash31(s: &str) -> u32 {
    let mut h: u32 = 0;
    for unit in s.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(u32::from(unit));
    }
    h
}

/// Lowercase, non-alphanumeric runs collapsed to `-`, trimmed, capped at 40
/// characters.
pub fn slugify(s: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= 40 {
            break;
        }
    }
    slug.truncate(40);
    slug
}
