pub mod airports;
pub mod cache;
pub mod charts;

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use chart_catalog::{ChartService, ChartSource, FetchError, NoUsageApi, SqliteChartStore};
    use chart_extractor::{ChartExtractor, Utf8TextLayer};
    use chrono::{TimeDelta, Utc};
    use shared::charts::ManifestEntry;
    use shared::{DatabaseConfig, ExtractorConfig};
    use std::sync::Arc;

    pub(crate) const VAC_TEXT: &str = "RWY 09L 118.250 TWR ... 650 x 30 ASPH";

    struct FixedSource;

    #[async_trait]
    impl ChartSource for FixedSource {
        async fn fetch_manifest(&self) -> Result<Vec<ManifestEntry>, FetchError> {
            let expiry = Utc::now() + TimeDelta::days(20);
            Ok(vec![ManifestEntry {
                id: "LFPG-VAC-2024-01".to_string(),
                airport_icao: "LFPG".to_string(),
                airport_name: "Paris Charles de Gaulle".to_string(),
                document_type: "VAC".to_string(),
                version: "2401".to_string(),
                effective_date: expiry - TimeDelta::days(28),
                expiry_date: expiry,
                file_size_bytes: 2048,
            }])
        }

        async fn fetch_document(&self, _id: &str) -> Result<Vec<u8>, FetchError> {
            Ok(VAC_TEXT.as_bytes().to_vec())
        }
    }

    pub(crate) async fn service() -> Arc<ChartService> {
        let pool = shared::initialize_db(
            &DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            true,
        )
        .await
        .expect("in-memory db");

        Arc::new(ChartService::new(
            Arc::new(SqliteChartStore::new(pool)),
            Arc::new(FixedSource),
            Arc::new(NoUsageApi),
            ChartExtractor::new(&ExtractorConfig::default()).expect("extractor"),
            Arc::new(Utf8TextLayer),
            2,
        ))
    }
}
