use crate::error::CatalogError;
use crate::store::{AirportSummary, ChartStore};
use tracing::info;

/// Airports whose ICAO code or name contains `query`, ignoring case.
/// A blank query returns every airport. Sorted by ICAO code.
pub async fn search_airports(
    store: &dyn ChartStore,
    query: &str,
) -> Result<Vec<AirportSummary>, CatalogError> {
    let airports = store.airports().await?;
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(airports);
    }

    Ok(airports
        .into_iter()
        .filter(|airport| {
            airport.icao.to_lowercase().contains(&needle)
                || airport.name.to_lowercase().contains(&needle)
        })
        .collect())
}

/// Persists the focused airport; `None` or a blank code clears it.
pub async fn select_airport(
    store: &dyn ChartStore,
    icao: Option<&str>,
) -> Result<Option<String>, CatalogError> {
    let selected = icao
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty());
    store.save_selected_airport(selected.as_deref()).await?;
    info!(name: "query.airport.selected", airport = ?selected, "selected airport");
    Ok(selected)
}

pub async fn selected_airport(store: &dyn ChartStore) -> Result<Option<String>, CatalogError> {
    Ok(store.load_session().await?.selected_airport)
}
