use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("document has no text layer")]
    EmptyTextLayer,
    #[error("document text layer is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

#[derive(Debug, Error)]
pub enum ExtractorBuildError {
    #[error("invalid {name} pattern: {source}")]
    Pattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
}
