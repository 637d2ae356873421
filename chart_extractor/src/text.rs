use crate::error::ExtractorBuildError;
use regex::Regex;

pub(crate) fn compile(name: &'static str, pattern: &str) -> Result<Regex, ExtractorBuildError> {
    Regex::new(pattern).map_err(|source| ExtractorBuildError::Pattern { name, source })
}

/// Byte offsets of line starts, for mapping a match back to its line.
pub(crate) struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, starts }
    }

    pub(crate) fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset) - 1
    }

    pub(crate) fn start_of(&self, line: usize) -> usize {
        self.starts[line]
    }

    pub(crate) fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Lines `first..=first + following`, clamped to the end of the text.
    pub(crate) fn window(&self, first: usize, following: usize) -> &'a str {
        let last = (first + following).min(self.line_count() - 1);
        let start = self.starts[first];
        let end = self
            .starts
            .get(last + 1)
            .map_or(self.text.len(), |&next| next - 1);
        &self.text[start..end.max(start)]
    }

    pub(crate) fn line(&self, idx: usize) -> &'a str {
        self.window(idx, 0)
    }
}

/// True when the token at `start..end` is part of a longer number such as
/// `118.25`, so it must not be read as a standalone designator.
pub(crate) fn is_embedded_number(haystack: &str, start: usize, end: usize) -> bool {
    let bytes = haystack.as_bytes();
    let before = start.checked_sub(1).map(|i| bytes[i]);
    let before_sep = start.checked_sub(2).map(|i| bytes[i]);
    let after = bytes.get(end).copied();
    let after_sep = bytes.get(end + 1).copied();

    let digit_before = matches!(before, Some(b) if b.is_ascii_digit())
        || (matches!(before, Some(b'.' | b',')) && matches!(before_sep, Some(b) if b.is_ascii_digit()));
    let digit_after = matches!(after, Some(b) if b.is_ascii_digit())
        || (matches!(after, Some(b'.' | b',')) && matches!(after_sep, Some(b) if b.is_ascii_digit()));

    digit_before || digit_after
}

/// Parses `118.250` or `118,250` as MHz.
pub(crate) fn parse_decimal(token: &str) -> Option<f64> {
    token.replace(',', ".").parse().ok()
}
