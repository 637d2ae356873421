use crate::error::ExtractorBuildError;
use crate::text::{LineIndex, compile, parse_decimal};
use regex::Regex;
use shared::PhoneRule;
use shared::charts::extracted::{VHF_COM_MAX_MHZ, VHF_COM_MIN_MHZ, mhz_to_khz};
use shared::charts::{Frequency, FrequencyRole};
use std::collections::HashMap;

/// Maximum gap, in bytes, between a role keyword and its frequency.
const MAX_KEYWORD_DISTANCE: usize = 32;
const MIN_PHONE_DIGITS: usize = 8;
const MAX_PHONE_DIGITS: usize = 15;

pub(crate) struct FrequencyScanner {
    role: Regex,
    value: Regex,
    hours: Regex,
    phone: Regex,
    frequency_prefix: Regex,
    phone_rule: Option<PhoneRule>,
}

struct Token {
    start: usize,
    end: usize,
    mhz: f64,
}

impl FrequencyScanner {
    pub(crate) fn new(phone_rule: Option<PhoneRule>) -> Result<Self, ExtractorBuildError> {
        Ok(Self {
            role: compile(
                "frequency role",
                r"(?i)\b(TWR|TOWER|TOUR|GND|GROUND|SOL|ATIS|APP|APPROACH|APPROCHE|INFO|AFIS)\b",
            )?,
            value: compile("frequency value", r"\b(\d{3}[.,]\d{1,3})\b")?,
            hours: compile(
                "operating hours",
                r"\b(H24|HO|HJ|HN|HX)\b|\bHR\s*:?\s*(\d{4}\s*-\s*\d{4})",
            )?,
            phone: compile(
                "phone number",
                r"(?i)(?:\bT[ÉE]L\b|\bPHONE\b|\bATIS\b)\s*[.:]?\s*((?:\+|00)?\d[\d .\-]{6,18}\d)",
            )?,
            frequency_prefix: compile("frequency prefix", r"^\d{3}[.,]\d{1,3}\b")?,
            phone_rule,
        })
    }

    pub(crate) fn scan(&self, lines: &LineIndex<'_>) -> Vec<Frequency> {
        let mut frequencies: Vec<Frequency> = Vec::new();
        let mut by_key: HashMap<(FrequencyRole, u32), usize> = HashMap::new();

        for idx in 0..lines.line_count() {
            let line = lines.line(idx);
            let tokens: Vec<Token> = self
                .value
                .captures_iter(line)
                .filter_map(|caps| {
                    let m = caps.get(1)?;
                    let mhz = parse_decimal(m.as_str())?;
                    in_com_band(mhz).then_some(Token {
                        start: m.start(),
                        end: m.end(),
                        mhz,
                    })
                })
                .collect();
            if tokens.is_empty() {
                continue;
            }

            let hours = self.hours(line);
            let phone = self.phone(line);

            for caps in self.role.captures_iter(line) {
                let Some(keyword) = caps.get(1) else {
                    continue;
                };
                let Some(role) = role_for(keyword.as_str(), &line[keyword.end()..]) else {
                    continue;
                };
                let Some(token) = nearest(&tokens, keyword.start(), keyword.end()) else {
                    continue;
                };

                merge_frequency(
                    &mut frequencies,
                    &mut by_key,
                    Frequency {
                        role,
                        value: token.mhz,
                        hours: hours.clone(),
                        phone: phone.clone(),
                    },
                );
            }
        }

        frequencies
    }

    fn hours(&self, line: &str) -> Option<String> {
        let caps = self.hours.captures(line)?;
        let token = caps.get(1).or_else(|| caps.get(2))?;
        Some(token.as_str().split_whitespace().collect())
    }

    fn phone(&self, line: &str) -> Option<String> {
        self.phone.captures_iter(line).find_map(|caps| {
            let raw = caps.get(1)?.as_str();
            if self.frequency_prefix.is_match(raw) {
                return None;
            }
            normalize_phone(raw, self.phone_rule.as_ref())
        })
    }
}

pub(crate) fn in_com_band(mhz: f64) -> bool {
    (mhz_to_khz(VHF_COM_MIN_MHZ)..=mhz_to_khz(VHF_COM_MAX_MHZ)).contains(&mhz_to_khz(mhz))
}

fn role_for(keyword: &str, rest_of_line: &str) -> Option<FrequencyRole> {
    match keyword.to_uppercase().as_str() {
        // "TOUR DE PISTE" is the circuit, not the tower.
        "TOUR" if rest_of_line.trim_start().to_uppercase().starts_with("DE PISTE") => None,
        "TWR" | "TOWER" | "TOUR" => Some(FrequencyRole::Tower),
        "GND" | "GROUND" | "SOL" => Some(FrequencyRole::Ground),
        "ATIS" => Some(FrequencyRole::Atis),
        "APP" | "APPROACH" | "APPROCHE" => Some(FrequencyRole::Approach),
        "INFO" | "AFIS" => Some(FrequencyRole::Info),
        _ => None,
    }
}

/// Closest in-band token on either side of the keyword; ties go to the
/// token after it.
fn nearest(tokens: &[Token], keyword_start: usize, keyword_end: usize) -> Option<&Token> {
    tokens
        .iter()
        .filter_map(|token| {
            if token.start >= keyword_end {
                Some((token.start - keyword_end, 0, token))
            } else if token.end <= keyword_start {
                Some((keyword_start - token.end, 1, token))
            } else {
                None
            }
        })
        .filter(|(distance, _, _)| *distance <= MAX_KEYWORD_DISTANCE)
        .min_by_key(|(distance, side, _)| (*distance, *side))
        .map(|(_, _, token)| token)
}

fn merge_frequency(
    frequencies: &mut Vec<Frequency>,
    by_key: &mut HashMap<(FrequencyRole, u32), usize>,
    frequency: Frequency,
) {
    let key = (frequency.role, frequency.khz());
    match by_key.get(&key) {
        Some(&idx) => {
            let existing = &mut frequencies[idx];
            if existing.hours.is_none() {
                existing.hours = frequency.hours;
            }
            if existing.phone.is_none() {
                existing.phone = frequency.phone;
            }
        }
        None => {
            by_key.insert(key, frequencies.len());
            frequencies.push(frequency);
        }
    }
}

/// Reduces a phone number to digits (keeping an international `+`), then
/// applies the configured national rule.
pub(crate) fn normalize_phone(raw: &str, rule: Option<&PhoneRule>) -> Option<String> {
    let trimmed = raw.trim();
    let international = trimmed.starts_with('+') || trimmed.starts_with("00");
    let mut digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed.starts_with("00") {
        digits.replace_range(..2, "");
    }
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return None;
    }

    if international {
        return Some(format!("+{digits}"));
    }

    match rule {
        Some(rule)
            if digits.len() == rule.national_length && digits.starts_with(&rule.trunk_prefix) =>
        {
            Some(format!(
                "{}{}",
                rule.international_prefix,
                &digits[rule.trunk_prefix.len()..]
            ))
        }
        _ => Some(digits),
    }
}
