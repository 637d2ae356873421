use crate::error::{ExtractionError, ExtractorBuildError};
use crate::frequencies::FrequencyScanner;
use crate::ils::IlsScanner;
use crate::minima::AltitudeScanner;
use crate::remarks::RemarkScanner;
use crate::runways::RunwayScanner;
use crate::text::LineIndex;
use crate::text_layer::TextLayer;
use shared::ExtractorConfig;
use shared::charts::ExtractedData;
use std::borrow::Cow;
use tracing::debug;

/// Compiled extraction patterns. Build once and share; extraction itself
/// holds no state.
pub struct ChartExtractor {
    runways: RunwayScanner,
    frequencies: FrequencyScanner,
    ils: IlsScanner,
    altitudes: AltitudeScanner,
    remarks: RemarkScanner,
}

impl ChartExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractorBuildError> {
        Ok(Self {
            runways: RunwayScanner::new()?,
            frequencies: FrequencyScanner::new(config.phone.clone())?,
            ils: IlsScanner::new()?,
            altitudes: AltitudeScanner::new()?,
            remarks: RemarkScanner::new()?,
        })
    }

    /// Never fails: sections that are not found come back empty or `None`.
    pub fn extract(&self, text: &str) -> ExtractedData {
        let text = normalize_line_endings(text);
        let lines = LineIndex::new(&text);

        let ils = self.ils.scan(&text, &lines);
        let data = ExtractedData {
            runways: self.runways.scan(&text, &lines),
            frequencies: self.frequencies.scan(&lines),
            ils: (!ils.is_empty()).then_some(ils),
            minima: self.altitudes.minima(&text),
            pattern_altitude: self.altitudes.pattern_altitude(&text),
            remarks: self.remarks.remarks(&text),
        };

        debug!(
            runways = data.runways.len(),
            frequencies = data.frequencies.len(),
            ils = data.ils.as_ref().map_or(0, Vec::len),
            has_minima = data.minima.is_some(),
            has_pattern_altitude = data.pattern_altitude.is_some(),
            "extracted chart data"
        );

        data
    }

    /// Reads the document's text layer, then extracts from it.
    pub fn extract_document(
        &self,
        layer: &dyn TextLayer,
        document: &[u8],
    ) -> Result<ExtractedData, ExtractionError> {
        let text = layer.read_text(document)?;
        Ok(self.extract(&text))
    }
}

fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_layer::Utf8TextLayer;
    use shared::charts::{FrequencyRole, Surface};

    const SAMPLE_VAC: &str = "\
LFXX - SAMPLE AERODROME\r\n\
RWY 09L/27R QFU 087 650 x 30 ASPH\r\n\
TWR 118.250 H24\r\n\
ATIS 128.425 Tél 01 23 45 67 89\r\n\
ILS 27R 110.35 SMP CAT II\r\n\
Circling 1340 / Straight-in 980\r\n\
Tour de piste 1500 ft\r\n\
Remarks:\r\n\
Intense glider activity on weekends\r\n";

    fn extractor() -> ChartExtractor {
        ChartExtractor::new(&ExtractorConfig::default()).expect("extractor builds")
    }

    #[test]
    fn extracts_every_section_from_sample() {
        let data = extractor().extract(SAMPLE_VAC);

        let ids: Vec<_> = data.runways.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["09L", "27R"]);
        assert_eq!(data.runways[0].orientation, 87);
        assert_eq!(data.runways[1].orientation, 267);
        assert!(data.runways.iter().all(|r| r.surface == Surface::Asphalt));

        let roles: Vec<_> = data.frequencies.iter().map(|f| f.role).collect();
        assert_eq!(roles, vec![FrequencyRole::Tower, FrequencyRole::Atis]);
        assert_eq!(data.frequencies[1].phone.as_deref(), Some("0123456789"));

        let ils = data.ils.expect("ils entries");
        assert_eq!(ils[0].identifier, "SMP");

        let minima = data.minima.expect("minima");
        assert_eq!((minima.circling, minima.straight), (Some(1340), Some(980)));
        assert_eq!(data.pattern_altitude.map(|a| a.value), Some(1500));
        assert_eq!(
            data.remarks,
            Some(vec!["Intense glider activity on weekends".to_string()])
        );
    }

    #[test]
    fn runway_table_without_keyword_is_extracted() {
        let data = extractor().extract("RWY  QFU  DIMENSIONS  SURFACE\r\n09L  087  2700 x 45  ASPH\r\n");
        assert_eq!(data.runways.len(), 1);
        assert_eq!(data.runways[0].identifier, "09L");
        assert_eq!(data.runways[0].orientation, 87);
        assert!(data.frequencies.is_empty());
    }

    #[test]
    fn empty_text_yields_empty_data() {
        let data = extractor().extract("");
        assert!(data.is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = extractor();
        assert_eq!(extractor.extract(SAMPLE_VAC), extractor.extract(SAMPLE_VAC));
    }

    #[test]
    fn unreadable_document_is_an_error() {
        let result = extractor().extract_document(&Utf8TextLayer, &[0xff, 0xfe, 0x00, 0x41]);
        assert!(matches!(result, Err(ExtractionError::InvalidEncoding(_))));
    }
}
