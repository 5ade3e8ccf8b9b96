use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StoreError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ResidentStatus {
    Active => "active",
    Discharged => "discharged",
});

str_enum!(VaccinationStatus {
    Given => "given",
    Refused => "refused",
    Contraindicated => "contraindicated",
    Unknown => "unknown",
});

str_enum!(AntibioticStatus {
    Active => "active",
    Stopped => "stopped",
});

str_enum!(Precaution {
    Contact => "contact",
    Droplet => "droplet",
    Airborne => "airborne",
    EnhancedBarrier => "enhanced_barrier",
    Standard => "standard",
    Unknown => "unknown",
});

str_enum!(VaccineKind {
    Covid => "covid",
    Flu => "flu",
    Pneumo => "pneumo",
    Rsv => "rsv",
    Shingles => "shingles",
    Tdap => "tdap",
    Other => "other",
});

impl VaccinationStatus {
    /// Lenient reading of legacy status strings; anything unrecognized
    /// defaults to Given, matching how historical exports recorded entries.
    pub fn parse_loose(s: &str) -> Self {
        let t = s.trim().to_ascii_lowercase();
        match t.as_str() {
            "refused" | "declined" => Self::Refused,
            "contraindicated" => Self::Contraindicated,
            "unknown" => Self::Unknown,
            _ => Self::Given,
        }
    }
}

impl Precaution {
    /// Lenient reading of legacy precaution labels.
    pub fn parse_loose(s: &str) -> Self {
        let t = s.trim().to_ascii_lowercase();
        if t.is_empty() {
            return Self::Unknown;
        }
        if t.contains("contact") {
            Self::Contact
        } else if t.contains("droplet") {
            Self::Droplet
        } else if t.contains("airborne") {
            Self::Airborne
        } else if t.contains("enhanced") || t.contains("ebp") || t.contains("barrier") {
            Self::EnhancedBarrier
        } else if t.contains("standard") {
            Self::Standard
        } else {
            Self::Unknown
        }
    }
}

impl VaccineKind {
    /// Map a freeform vaccine name ("Influenza", "COVID-19", "Shingrix")
    /// onto a tracked category; unrecognized names become Other and keep
    /// their free text as a qualifier on the record.
    pub fn parse_loose(s: &str) -> Self {
        let t = s.trim().to_ascii_lowercase();
        if t.contains("flu") || t.contains("influenza") {
            Self::Flu
        } else if t.contains("covid") || t.contains("sars-cov") {
            Self::Covid
        } else if t.contains("pneumo") || t.contains("ppsv") || t.contains("pcv") {
            Self::Pneumo
        } else if t.contains("rsv") {
            Self::Rsv
        } else if t.contains("shingles") || t.contains("zoster") || t.contains("shingrix") {
            Self::Shingles
        } else if t.contains("tdap") || t.contains("tetanus") {
            Self::Tdap
        } else {
            Self::Other
        }
    }
}

/// Facility unit: numbered floor/wing, or unknown when a census paste gives
/// no way to place the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    Numbered(u8),
    #[default]
    Unknown,
}

impl Unit {
    pub fn label(&self) -> String {
        match self {
            Self::Numbered(n) => format!("Unit {n}"),
            Self::Unknown => "Unknown".to_string(),
        }
    }

    /// Infer a unit from a room token's leading digit via the facility's
    /// alias table, e.g. "251-A" -> aliases["2"] -> Unit 2.
    pub fn from_room(room: &str, aliases: &std::collections::BTreeMap<String, u8>) -> Self {
        let leading = match room.trim().chars().next() {
            Some(c) if c.is_ascii_digit() => c.to_string(),
            _ => return Self::Unknown,
        };
        match aliases.get(&leading) {
            Some(n) => Self::Numbered(*n),
            None => Self::Unknown,
        }
    }
}
