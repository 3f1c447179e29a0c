use regex::Regex;
use serde::Serialize;

use super::Warehouse;
use crate::errors::ServiceError;

const DNPB_PATTERN: &str =
    r"^DNPB/([A-Z]+)/WHS/(\d{4})/(XII|XI|X|IX|VIII|VII|VI|V|IV|III|II|I)/(\d{3})$";

const ROMAN_MONTHS: [&str; 12] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII",
];

/// A delivery note number that passed the format check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryNote {
    pub number: String,
    /// Warehouse code as written in the number; not necessarily a known bucket.
    pub warehouse_code: String,
    pub year: u16,
    pub month: u8,
    pub sequence: u16,
}

impl DeliveryNote {
    /// The bucket the number claims, if the code is one we know.
    pub fn warehouse(&self) -> Option<Warehouse> {
        Warehouse::from_code(&self.warehouse_code)
    }
}

/// Compiled `DNPB/<WAREHOUSE>/WHS/<YYYY>/<ROMAN MONTH>/<NNN>` matcher.
#[derive(Debug, Clone)]
pub struct DeliveryNoteFormat {
    pattern: Regex,
}

impl DeliveryNoteFormat {
    pub fn new() -> Result<Self, ServiceError> {
        let pattern = Regex::new(DNPB_PATTERN).map_err(|e| {
            ServiceError::InternalError(format!("delivery note pattern failed to compile: {}", e))
        })?;
        Ok(Self { pattern })
    }

    /// Parses a candidate number. The error is the human-readable reason.
    pub fn parse(&self, candidate: &str) -> Result<DeliveryNote, String> {
        let invalid = || {
            format!(
                "'{}' is not a valid DNPB number (expected DNPB/<WAREHOUSE>/WHS/<YYYY>/<ROMAN MONTH>/<NNN>)",
                candidate
            )
        };

        let captures = self.pattern.captures(candidate).ok_or_else(invalid)?;
        let warehouse_code = captures[1].to_string();
        let year = captures[2].parse::<u16>().map_err(|_| invalid())?;
        let month = ROMAN_MONTHS
            .iter()
            .position(|m| *m == &captures[3])
            .ok_or_else(invalid)?;
        let sequence = captures[4].parse::<u16>().map_err(|_| invalid())?;

        Ok(DeliveryNote {
            number: candidate.to_string(),
            warehouse_code,
            year,
            month: (month + 1) as u8,
            sequence,
        })
    }

    pub fn is_well_formed(&self, candidate: &str) -> bool {
        !candidate.trim().is_empty() && self.pattern.is_match(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> DeliveryNoteFormat {
        DeliveryNoteFormat::new().unwrap()
    }

    #[test]
    fn accepts_canonical_number() {
        let note = format().parse("DNPB/DDD/WHS/2026/I/001").unwrap();
        assert_eq!(note.warehouse_code, "DDD");
        assert_eq!(note.warehouse(), Some(Warehouse::Ddd));
        assert_eq!((note.year, note.month, note.sequence), (2026, 1, 1));
    }

    #[test]
    fn unknown_warehouse_code_is_still_well_formed() {
        let note = format().parse("DNPB/XXX/WHS/2026/I/001").unwrap();
        assert_eq!(note.warehouse(), None);
    }

    #[test]
    fn month_numerals_map_to_calendar_months() {
        let note = format().parse("DNPB/LJBB/WHS/2025/XII/120").unwrap();
        assert_eq!(note.month, 12);
        let note = format().parse("DNPB/MBB/WHS/2025/IX/007").unwrap();
        assert_eq!(note.month, 9);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let f = format();
        for raw in [
            "DDD/WHS/2026/I/001",
            "DNPB/DDD/WHS/26/I/001",
            "DNPB/DDD/WHS/2026/1/001",
            "DNPB/DDD/WHS/2026/XIII/001",
            "DNPB/DDD/WHS/2026/I/01",
            "DNPB/ddd/WHS/2026/I/001",
            " DNPB/DDD/WHS/2026/I/001",
            "",
        ] {
            assert!(f.parse(raw).is_err(), "{raw:?} should be rejected");
            assert!(!f.is_well_formed(raw));
        }
    }
}
