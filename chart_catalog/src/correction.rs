use crate::error::CatalogError;
use crate::store::ChartStore;
use shared::charts::{Chart, ExtractedDataPatch, ExtractionStatus};
use tracing::{info, instrument};

/// Merges `patch` into the stored extraction and pins the chart to `Manual`.
/// Last write wins.
#[instrument(skip(store, patch))]
pub async fn update_extracted_data(
    store: &dyn ChartStore,
    id: &str,
    patch: ExtractedDataPatch,
) -> Result<Chart, CatalogError> {
    let mut chart = store
        .get(id)
        .await?
        .ok_or_else(|| CatalogError::UnknownChart(id.to_string()))?;

    let data = patch.apply(chart.extracted_data.take().unwrap_or_default());
    if !store
        .record_extraction(id, ExtractionStatus::Manual, Some(&data), true)
        .await?
    {
        return Err(CatalogError::UnknownChart(id.to_string()));
    }

    info!(name: "correction.saved", "manual correction saved");
    chart.extraction_status = ExtractionStatus::Manual;
    chart.extracted_data = Some(data);
    Ok(chart)
}
