use crate::error::ExtractorBuildError;
use crate::text::compile;
use regex::Regex;
use shared::charts::{Altitude, AltitudeUnit, Minima};

pub(crate) struct AltitudeScanner {
    circling: Regex,
    straight: Regex,
    circuit: Regex,
}

impl AltitudeScanner {
    pub(crate) fn new() -> Result<Self, ExtractorBuildError> {
        Ok(Self {
            circling: compile(
                "circling minima",
                r"(?i)\b(?:CIRCLING|CIRCLE[- ]TO[- ]LAND|MVL|VPT)\b[^\d\n]{0,24}(\d{3,4})\b",
            )?,
            straight: compile(
                "straight-in minima",
                r"(?i)\b(?:STRAIGHT[- ]?IN|STRAIGHT|S-IN|DIRECT)\b[^\d\n]{0,24}(\d{3,4})\b",
            )?,
            circuit: compile(
                "circuit altitude",
                r"(?i)\b(?:CIRCUIT|PATTERN|TOUR\s+DE\s+PISTE|TDP)\b[^\n]{0,40}?\b(\d{3,5})\s*(FT|FEET|M)\b",
            )?,
        })
    }

    pub(crate) fn minima(&self, text: &str) -> Option<Minima> {
        let circling = first_number(&self.circling, text);
        let straight = first_number(&self.straight, text);
        (circling.is_some() || straight.is_some()).then_some(Minima { circling, straight })
    }

    pub(crate) fn pattern_altitude(&self, text: &str) -> Option<Altitude> {
        let caps = self.circuit.captures(text)?;
        let value = caps.get(1)?.as_str().parse().ok()?;
        let unit = match caps.get(2)?.as_str().to_uppercase().as_str() {
            "M" => AltitudeUnit::Meters,
            _ => AltitudeUnit::Feet,
        };
        Some(Altitude { value, unit })
    }
}

fn first_number(regex: &Regex, text: &str) -> Option<u32> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> AltitudeScanner {
        AltitudeScanner::new().expect("patterns compile")
    }

    #[test]
    fn finds_circling_and_straight_independently() {
        let minima = scanner()
            .minima("Circling: 1340\nStraight-in MDA 980 ft")
            .expect("minima present");
        assert_eq!(minima.circling, Some(1340));
        assert_eq!(minima.straight, Some(980));
    }

    #[test]
    fn single_minimum_leaves_other_empty() {
        let minima = scanner().minima("MVL 1200").expect("circling present");
        assert_eq!(minima.circling, Some(1200));
        assert_eq!(minima.straight, None);
    }

    #[test]
    fn no_minima_is_none_not_zero() {
        assert_eq!(scanner().minima("RWY 09 650 x 30"), None);
    }

    #[test]
    fn reads_circuit_altitude_with_unit() {
        let altitude = scanner()
            .pattern_altitude("Tour de piste : 1500 ft QNH")
            .expect("circuit altitude");
        assert_eq!(
            altitude,
            Altitude {
                value: 1500,
                unit: AltitudeUnit::Feet
            }
        );

        let metric = scanner()
            .pattern_altitude("Circuit height 300 m AAL")
            .expect("metric circuit altitude");
        assert_eq!(metric.unit, AltitudeUnit::Meters);
    }

    #[test]
    fn circuit_altitude_requires_unit() {
        assert_eq!(scanner().pattern_altitude("Circuit 1500"), None);
        assert_eq!(scanner().pattern_altitude("RWY 27 1500 ft"), None);
    }
}
