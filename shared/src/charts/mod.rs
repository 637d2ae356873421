pub mod chart;
pub mod extracted;
pub mod manifest;

pub use chart::{Chart, ExtractionStatus, SessionRecord};
pub use extracted::{
    Altitude, AltitudeUnit, ExtractedData, ExtractedDataPatch, Frequency, FrequencyRole,
    IlsCategory, IlsEntry, Minima, Runway, Surface,
};
pub use manifest::ManifestEntry;
