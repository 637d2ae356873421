use crate::error::ExtractionError;

/// Produces the plain text of a stored chart document.
pub trait TextLayer: Send + Sync {
    fn read_text(&self, document: &[u8]) -> Result<String, ExtractionError>;
}

/// Reads documents whose text layer was exported as UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8TextLayer;

const BOM: char = '\u{feff}';

impl TextLayer for Utf8TextLayer {
    fn read_text(&self, document: &[u8]) -> Result<String, ExtractionError> {
        let text = std::str::from_utf8(document)?;
        let text: String = text
            .strip_prefix(BOM)
            .unwrap_or(text)
            .chars()
            .filter(|c| *c != '\0')
            .collect();

        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyTextLayer);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bom_and_nul_bytes() {
        let text = Utf8TextLayer
            .read_text("\u{feff}RWY 09\0L".as_bytes())
            .expect("valid text");
        assert_eq!(text, "RWY 09L");
    }

    #[test]
    fn blank_document_has_no_text_layer() {
        assert!(matches!(
            Utf8TextLayer.read_text(b" \n\t"),
            Err(ExtractionError::EmptyTextLayer)
        ));
        assert!(matches!(
            Utf8TextLayer.read_text(b""),
            Err(ExtractionError::EmptyTextLayer)
        ));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        assert!(matches!(
            Utf8TextLayer.read_text(&[0xc3, 0x28]),
            Err(ExtractionError::InvalidEncoding(_))
        ));
    }
}
