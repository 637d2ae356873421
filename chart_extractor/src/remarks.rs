use crate::error::ExtractorBuildError;
use crate::text::compile;
use regex::Regex;
use shared::charts::extracted::MAX_REMARKS;

const MIN_REMARK_CHARS: usize = 10;

pub(crate) struct RemarkScanner {
    label: Regex,
}

impl RemarkScanner {
    pub(crate) fn new() -> Result<Self, ExtractorBuildError> {
        Ok(Self {
            label: compile(
                "remarks label",
                r"(?im)^[ \t]*(?:REMARKS?|RMK|CONSIGNES\s+PARTICULI[ÈE]RES|OBSERVATIONS?)\b[ \t]*:?",
            )?,
        })
    }

    pub(crate) fn remarks(&self, text: &str) -> Option<Vec<String>> {
        let label = self.label.find(text)?;
        let remarks: Vec<String> = text[label.end()..]
            .lines()
            .map(str::trim)
            .filter(|line| line.chars().count() >= MIN_REMARK_CHARS)
            .take(MAX_REMARKS)
            .map(str::to_string)
            .collect();

        (!remarks.is_empty()).then_some(remarks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remarks(text: &str) -> Option<Vec<String>> {
        RemarkScanner::new().expect("pattern compiles").remarks(text)
    }

    #[test]
    fn keeps_long_lines_after_label() {
        let text = "RWY 09\nRemarks: Birds hazard in autumn\nok\n  Noise abatement procedures apply  \n";
        assert_eq!(
            remarks(text),
            Some(vec![
                "Birds hazard in autumn".to_string(),
                "Noise abatement procedures apply".to_string(),
            ])
        );
    }

    #[test]
    fn caps_number_of_remarks() {
        let body: String = (0..9).map(|i| format!("remark line number {i}\n")).collect();
        let found = remarks(&format!("CONSIGNES PARTICULIÈRES\n{body}")).expect("remarks");
        assert_eq!(found.len(), MAX_REMARKS);
        assert_eq!(found[0], "remark line number 0");
    }

    #[test]
    fn missing_section_is_none() {
        assert_eq!(remarks("TWR 118.250\nRWY 09 650 x 30"), None);
        assert_eq!(remarks("RMK:\nshort\n"), None);
    }
}
