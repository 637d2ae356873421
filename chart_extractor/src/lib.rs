//! Heuristic extraction of aerodrome data from the text layer of approach charts.
//!
//! Everything here is pure: text in, [`ExtractedData`](shared::charts::ExtractedData)
//! out. Absence of a section is never an error; only a text layer that cannot be
//! read at all is reported, through [`TextLayer`].

pub mod error;
mod extractor;
mod frequencies;
mod ils;
mod minima;
mod remarks;
mod runways;
mod text;
pub mod text_layer;

pub use error::{ExtractionError, ExtractorBuildError};
pub use extractor::ChartExtractor;
pub use text_layer::{TextLayer, Utf8TextLayer};
