use crate::error::ExtractorBuildError;
use crate::text::{LineIndex, compile, is_embedded_number};
use regex::{Captures, Regex};
use shared::charts::{Runway, Surface};
use std::collections::HashMap;

/// Lines after the designator line that still describe the same runway.
const CONTEXT_FOLLOWING_LINES: usize = 5;

pub(crate) struct RunwayScanner {
    designator: Regex,
    table_row: Regex,
    heading: Regex,
    bare_heading: Regex,
    dimensions: Regex,
    surface: Regex,
}

/// A designator occurrence and the text describing it.
struct Candidate<'t> {
    offset: usize,
    primary: Designator,
    reciprocal: Option<Designator>,
    context: &'t str,
    table_row: bool,
}

impl RunwayScanner {
    pub(crate) fn new() -> Result<Self, ExtractorBuildError> {
        Ok(Self {
            designator: compile(
                "runway designator",
                r"(?i)\b(?:RWY|RUNWAY|PISTE|THR|QFU)S?\b[\s.:#-]*(\d{2})([LCR])?\b(?:\s*/\s*(\d{2})([LCR])?\b)?",
            )?,
            table_row: compile(
                "runway table row",
                r"(?im)(?:^|\|)[ \t]*(\d{2})([LCR])?\b(?:[ \t]*/[ \t]*(\d{2})([LCR])?\b)?",
            )?,
            heading: compile(
                "runway heading",
                r"(?i)(?:\bQFU\s*:?\s*(\d{3})\b|\b(\d{3})\s*°)",
            )?,
            bare_heading: compile(
                "runway table heading",
                r"(?i)\b(\d{3})\b([ \t]*(?:m[ \t]*)?[x×])?",
            )?,
            dimensions: compile(
                "runway dimensions",
                r"(?i)\b(\d{2,4})\s*(?:m\s*)?[x×]\s*(\d{2,3})\b",
            )?,
            surface: compile(
                "runway surface",
                r"(?i)\b(ASPH\w*|BITUM\w*|ENROB\w*|GRASS\w*|HERBE\w*|GAZON\w*|CONC\b|CONCRETE\b|B[ÉE]TON\w*|GRAVEL\w*|GRAVIER\w*)",
            )?,
        })
    }

    pub(crate) fn scan(&self, text: &str, lines: &LineIndex<'_>) -> Vec<Runway> {
        let mut candidates = self.keyword_candidates(text, lines);
        candidates.extend(self.table_candidates(text, lines));
        candidates.sort_by_key(|candidate| candidate.offset);

        let mut runways: Vec<Runway> = Vec::new();
        let mut by_identifier: HashMap<String, usize> = HashMap::new();

        for candidate in candidates {
            let measured_heading = self.heading(candidate.context).or_else(|| {
                candidate
                    .table_row
                    .then(|| self.bare_heading(candidate.context))
                    .flatten()
            });
            let (length_m, width_m) = self.dimensions(candidate.context);
            let surface = self.surface(candidate.context);

            let primary = candidate.primary;
            merge_runway(
                &mut runways,
                &mut by_identifier,
                Runway {
                    identifier: primary.identifier(),
                    orientation: measured_heading.unwrap_or_else(|| primary.derived_heading()),
                    length_m,
                    width_m,
                    surface,
                },
            );

            if let Some(reciprocal) = candidate.reciprocal {
                merge_runway(
                    &mut runways,
                    &mut by_identifier,
                    Runway {
                        identifier: reciprocal.identifier(),
                        orientation: measured_heading
                            .map_or_else(|| reciprocal.derived_heading(), reciprocal_heading),
                        length_m,
                        width_m,
                        surface,
                    },
                );
            }
        }

        runways
    }

    /// Designators introduced by a runway keyword; the context spans the
    /// following lines.
    fn keyword_candidates<'t>(&self, text: &'t str, lines: &LineIndex<'t>) -> Vec<Candidate<'t>> {
        self.designator
            .captures_iter(text)
            .filter_map(|caps| {
                let primary = designator(text, &caps, 1, 2)?;
                let whole = caps.get(0)?;
                Some(Candidate {
                    offset: whole.start(),
                    primary,
                    reciprocal: designator(text, &caps, 3, 4),
                    context: lines.window(lines.line_of(whole.start()), CONTEXT_FOLLOWING_LINES),
                    table_row: false,
                })
            })
            .collect()
    }

    /// Designators opening a line or table cell. Only the rest of that line
    /// describes the runway, and it must carry a heading, dimensions or a
    /// surface, which rules out dates and counts.
    fn table_candidates<'t>(&self, text: &'t str, lines: &LineIndex<'t>) -> Vec<Candidate<'t>> {
        self.table_row
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let number = caps.get(1)?;
                if text[whole.end()..].starts_with('/') {
                    return None;
                }
                let primary = designator(text, &caps, 1, 2)?;

                let line = lines.line_of(number.start());
                let line_end = lines.start_of(line) + lines.line(line).len();
                let rest = &text[whole.end()..line_end.max(whole.end())];

                let described = self.heading(rest).is_some()
                    || self.bare_heading(rest).is_some()
                    || self.dimensions.is_match(rest)
                    || self.surface.is_match(rest);
                if !described {
                    return None;
                }

                Some(Candidate {
                    offset: number.start(),
                    primary,
                    reciprocal: designator(text, &caps, 3, 4),
                    context: rest,
                    table_row: true,
                })
            })
            .collect()
    }

    /// A bare three-digit column value, as in `09L  087  2700 x 45`.
    /// Lengths written as `800 x 20` are not headings.
    fn bare_heading(&self, row: &str) -> Option<u16> {
        self.bare_heading.captures_iter(row).find_map(|caps| {
            if caps.get(2).is_some() {
                return None;
            }
            let token = caps.get(1)?;
            if is_embedded_number(row, token.start(), token.end()) {
                return None;
            }
            token
                .as_str()
                .parse::<u16>()
                .ok()
                .filter(|deg| (1..=360).contains(deg))
        })
    }

    fn heading(&self, context: &str) -> Option<u16> {
        self.heading.captures_iter(context).find_map(|caps| {
            let token = caps.get(1).or_else(|| caps.get(2))?;
            token
                .as_str()
                .parse::<u16>()
                .ok()
                .filter(|deg| (1..=360).contains(deg))
        })
    }

    fn dimensions(&self, context: &str) -> (u32, u32) {
        self.dimensions
            .captures(context)
            .and_then(|caps| {
                let length = caps.get(1)?.as_str().parse().ok()?;
                let width = caps.get(2)?.as_str().parse().ok()?;
                Some((length, width))
            })
            .unwrap_or((0, 0))
    }

    fn surface(&self, context: &str) -> Surface {
        self.surface
            .find(context)
            .map_or(Surface::Unknown, |m| classify_surface(m.as_str()))
    }
}

struct Designator {
    number: u16,
    side: Option<char>,
}

impl Designator {
    fn identifier(&self) -> String {
        match self.side {
            Some(side) => format!("{:02}{side}", self.number),
            None => format!("{:02}", self.number),
        }
    }

    /// Runway numbers are the magnetic heading rounded to tens of degrees.
    fn derived_heading(&self) -> u16 {
        self.number * 10
    }
}

fn designator(text: &str, caps: &Captures<'_>, number_group: usize, side_group: usize) -> Option<Designator> {
    let number_match = caps.get(number_group)?;
    let end = caps.get(side_group).map_or(number_match.end(), |m| m.end());
    if is_embedded_number(text, number_match.start(), end) {
        return None;
    }
    let number: u16 = number_match.as_str().parse().ok()?;
    if !(1..=36).contains(&number) {
        return None;
    }
    let side = caps
        .get(side_group)
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_uppercase());
    Some(Designator { number, side })
}

fn reciprocal_heading(heading: u16) -> u16 {
    if heading > 180 { heading - 180 } else { heading + 180 }
}

fn classify_surface(keyword: &str) -> Surface {
    let keyword = keyword.to_uppercase();
    if keyword.starts_with("ASPH") || keyword.starts_with("BITUM") || keyword.starts_with("ENROB") {
        Surface::Asphalt
    } else if keyword.starts_with("GRASS") || keyword.starts_with("HERBE") || keyword.starts_with("GAZON") {
        Surface::Grass
    } else if keyword.starts_with("CONC") || keyword.starts_with("BÉTON") || keyword.starts_with("BETON") {
        Surface::Concrete
    } else if keyword.starts_with("GRAV") {
        Surface::Gravel
    } else {
        Surface::Unknown
    }
}

/// Keeps one entry per identifier; the longer declared length wins.
fn merge_runway(runways: &mut Vec<Runway>, by_identifier: &mut HashMap<String, usize>, runway: Runway) {
    match by_identifier.get(&runway.identifier) {
        Some(&idx) => {
            if runway.length_m > runways[idx].length_m {
                runways[idx] = runway;
            }
        }
        None => {
            by_identifier.insert(runway.identifier.clone(), runways.len());
            runways.push(runway);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Vec<Runway> {
        let scanner = RunwayScanner::new().expect("patterns compile");
        scanner.scan(text, &LineIndex::new(text))
    }

    #[test]
    fn reads_designator_dimensions_and_surface() {
        let runways = scan("RWY 09L 118.250 TWR ... 650 x 30 ASPH");
        assert_eq!(runways.len(), 1);
        let rwy = &runways[0];
        assert_eq!(rwy.identifier, "09L");
        assert_eq!(rwy.length_m, 650);
        assert_eq!(rwy.width_m, 30);
        assert_eq!(rwy.surface, Surface::Asphalt);
        assert_eq!(rwy.orientation, 90);
    }

    #[test]
    fn prefers_measured_heading_over_derived() {
        let runways = scan("PISTE 27\nQFU 266\n1200 x 20 revêtue bitume");
        assert_eq!(runways[0].orientation, 266);
        assert_eq!(runways[0].surface, Surface::Asphalt);
    }

    #[test]
    fn reciprocal_pair_yields_two_runways() {
        let runways = scan("RWY 04/22 800x18 herbe");
        let ids: Vec<_> = runways.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["04", "22"]);
        assert_eq!(runways[0].orientation, 40);
        assert_eq!(runways[1].orientation, 220);
        assert!(runways.iter().all(|r| r.surface == Surface::Grass));
    }

    #[test]
    fn reciprocal_of_measured_heading_is_opposite() {
        let runways = scan("RWY 09R/27L 087° 2700 x 45 CONCRETE");
        assert_eq!(runways[0].orientation, 87);
        assert_eq!(runways[1].orientation, 267);
        assert_eq!(runways[1].surface, Surface::Concrete);
    }

    #[test]
    fn duplicate_identifier_keeps_longest() {
        let runways = scan("RWY 18 600 x 20 GRASS\n\n\n\n\n\n\nRWY 18 900 x 25 GRASS");
        assert_eq!(runways.len(), 1);
        assert_eq!(runways[0].length_m, 900);
    }

    #[test]
    fn missing_dimensions_are_zero_not_absent() {
        let runways = scan("THR 36");
        assert_eq!(runways[0].length_m, 0);
        assert_eq!(runways[0].width_m, 0);
        assert_eq!(runways[0].surface, Surface::Unknown);
        assert_eq!(runways[0].orientation, 360);
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        assert!(scan("RWY 37 RWY 00").is_empty());
        assert!(scan("no runway here, 650 x 30").is_empty());
    }

    #[test]
    fn reads_runway_table_rows_without_keyword() {
        let runways = scan(
            "RWY  QFU  DIMENSIONS  SURFACE\n\
             09L  087  2700 x 45  ASPH\n\
             27R  267  2700 x 45  ASPH\n\
             04   040  800 x 20  HERBE\n",
        );
        let ids: Vec<_> = runways.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["09L", "27R", "04"]);
        assert_eq!(runways[0].orientation, 87);
        assert_eq!(runways[1].orientation, 267);
        assert_eq!((runways[1].length_m, runways[1].width_m), (2700, 45));
        assert_eq!(runways[2].orientation, 40);
        assert_eq!((runways[2].length_m, runways[2].width_m), (800, 20));
        assert_eq!(runways[2].surface, Surface::Grass);
    }

    #[test]
    fn reads_bare_designator_with_dimensions() {
        let runways = scan("09L 650 x 30 ASPH");
        assert_eq!(runways.len(), 1);
        assert_eq!(runways[0].identifier, "09L");
        assert_eq!(runways[0].orientation, 90);
        assert_eq!((runways[0].length_m, runways[0].width_m), (650, 30));
        assert_eq!(runways[0].surface, Surface::Asphalt);
    }

    #[test]
    fn reads_designator_in_table_cell() {
        let runways = scan("| 18/36 | 1100 x 25 | CONCRETE |");
        let ids: Vec<_> = runways.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["18", "36"]);
        assert_eq!(runways[1].length_m, 1100);
    }

    #[test]
    fn line_leading_numbers_without_runway_data_are_ignored() {
        assert!(scan("25/01/2024 ASPH works\n12 NM east of the field\n118.250 TWR").is_empty());
    }

    #[test]
    fn derived_orientation_is_multiple_of_ten() {
        for n in 1..=36 {
            let runways = scan(&format!("RWY {n:02}C"));
            assert_eq!(runways.len(), 1, "runway {n:02}");
            let rwy = &runways[0];
            assert_eq!(rwy.identifier, format!("{n:02}C"));
            assert!((10..=360).contains(&rwy.orientation));
            assert_eq!(rwy.orientation % 10, 0);
        }
    }
}
