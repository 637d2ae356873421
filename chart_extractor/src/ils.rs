use crate::error::ExtractorBuildError;
use crate::text::{LineIndex, compile, is_embedded_number, parse_decimal};
use regex::Regex;
use shared::charts::extracted::{ILS_MAX_MHZ, ILS_MIN_MHZ, mhz_to_khz};
use shared::charts::{IlsCategory, IlsEntry};
use std::collections::HashSet;

/// Words that look like a Morse identifier but are not one.
const NOT_AN_IDENTIFIER: &[&str] = &[
    "ILS", "RWY", "CAT", "DME", "LOC", "LLZ", "GP", "GS", "MHZ", "FT", "QFU", "OM", "MM", "NDB",
    "VOR", "THR", "DA", "DH", "MDA", "RVR", "II", "III",
];

pub(crate) struct IlsScanner {
    keyword: Regex,
    runway: Regex,
    frequency: Regex,
    identifier: Regex,
    category: Regex,
}

impl IlsScanner {
    pub(crate) fn new() -> Result<Self, ExtractorBuildError> {
        Ok(Self {
            keyword: compile("ILS keyword", r"\bILS\b")?,
            runway: compile(
                "ILS runway",
                r"(?i)\b(?:RWY\s*)?(0[1-9]|[12]\d|3[0-6])([LCR])?\b",
            )?,
            frequency: compile("ILS frequency", r"\b(1(?:0[89]|1[01])[.,]\d{1,2})\b")?,
            identifier: compile("ILS identifier", r"\b([A-Z]{2,3})\b")?,
            category: compile("ILS category", r"(?i)\bCAT\s*(III|II|I)\b")?,
        })
    }

    pub(crate) fn scan(&self, text: &str, lines: &LineIndex<'_>) -> Vec<IlsEntry> {
        let mut entries = Vec::new();
        let mut seen: HashSet<(String, u32)> = HashSet::new();

        for keyword in self.keyword.find_iter(text) {
            let line_idx = lines.line_of(keyword.start());
            let window = lines.window(line_idx, 1);
            let offset = keyword.end() - lines.start_of(line_idx);
            let after = &window[offset.min(window.len())..];

            let Some(entry) = self.entry(after) else {
                continue;
            };
            if seen.insert((entry.runway.clone(), mhz_to_khz(entry.frequency))) {
                entries.push(entry);
            }
        }

        entries
    }

    fn entry(&self, after: &str) -> Option<IlsEntry> {
        let runway = self.runway.captures_iter(after).find_map(|caps| {
            let number = caps.get(1)?;
            let end = caps.get(2).map_or(number.end(), |m| m.end());
            if is_embedded_number(after, number.start(), end) {
                return None;
            }
            let side = caps.get(2).map(|m| m.as_str().to_uppercase()).unwrap_or_default();
            Some(format!("{}{side}", number.as_str()))
        })?;

        let (frequency, frequency_end) = self.frequency.captures_iter(after).find_map(|caps| {
            let m = caps.get(1)?;
            let mhz = parse_decimal(m.as_str())?;
            in_ils_band(mhz).then_some((mhz, m.end()))
        })?;

        let identifier = self
            .identifier
            .captures_iter(&after[frequency_end..])
            .chain(self.identifier.captures_iter(&after[..frequency_end]))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .find(|word| !NOT_AN_IDENTIFIER.contains(word))?
            .to_string();

        let category = self
            .category
            .captures(after)
            .and_then(|caps| caps.get(1))
            .map_or(IlsCategory::I, |m| match m.as_str().to_uppercase().as_str() {
                "III" => IlsCategory::III,
                "II" => IlsCategory::II,
                _ => IlsCategory::I,
            });

        Some(IlsEntry {
            runway,
            frequency,
            identifier,
            category,
        })
    }
}

fn in_ils_band(mhz: f64) -> bool {
    (mhz_to_khz(ILS_MIN_MHZ)..=mhz_to_khz(ILS_MAX_MHZ)).contains(&mhz_to_khz(mhz))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Vec<IlsEntry> {
        let scanner = IlsScanner::new().expect("patterns compile");
        scanner.scan(text, &LineIndex::new(text))
    }

    #[test]
    fn reads_full_ils_line() {
        let entries = scan("ILS RWY 27R 110.35 PGE CAT III");
        assert_eq!(
            entries,
            vec![IlsEntry {
                runway: "27R".to_string(),
                frequency: 110.35,
                identifier: "PGE".to_string(),
                category: IlsCategory::III,
            }]
        );
    }

    #[test]
    fn category_defaults_to_one() {
        let entries = scan("Approach aids\nILS 09 109.9 ABC");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, IlsCategory::I);
        assert_eq!(entries[0].runway, "09");
    }

    #[test]
    fn identifier_may_precede_frequency() {
        let entries = scan("ILS 26L CGC 108.70 CAT II");
        assert_eq!(entries[0].identifier, "CGC");
        assert_eq!(entries[0].category, IlsCategory::II);
    }

    #[test]
    fn incomplete_entries_are_skipped() {
        assert!(scan("ILS 27R PGE").is_empty());
        assert!(scan("ILS 27R 112.50 PGE").is_empty());
        assert!(scan("ILS 110.35 PGE").is_empty());
    }

    #[test]
    fn repeated_entries_are_deduplicated() {
        let entries = scan("ILS 27R 110.35 PGE\nILS 27R 110.35 PGE");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn lowercase_french_pronoun_is_not_a_keyword() {
        assert!(scan("ils 27 110.35 ABC").is_empty());
    }
}
