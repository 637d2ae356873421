use crate::error::FetchError;
use async_trait::async_trait;
use shared::SourceConfig;
use shared::charts::ManifestEntry;
use std::time::Duration;
use tracing::{debug, instrument};

/// Remote provider of the chart manifest and chart documents.
#[async_trait]
pub trait ChartSource: Send + Sync {
    async fn fetch_manifest(&self) -> Result<Vec<ManifestEntry>, FetchError>;

    async fn fetch_document(&self, id: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reads `{base_url}/manifest.json` and `{base_url}/charts/{id}`.
pub struct HttpChartSource {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpChartSource {
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Self::with_client(client, &config.base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, FetchError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| FetchError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    fn manifest_url(&self) -> Result<reqwest::Url, FetchError> {
        self.endpoint(&["manifest.json"])
    }

    /// The id is a single percent-encoded path segment.
    fn document_url(&self, id: &str) -> Result<reqwest::Url, FetchError> {
        self.endpoint(&["charts", id])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl ChartSource for HttpChartSource {
    #[instrument(skip(self))]
    async fn fetch_manifest(&self) -> Result<Vec<ManifestEntry>, FetchError> {
        let body = self
            .client
            .get(self.manifest_url()?)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let entries: Vec<ManifestEntry> = serde_json::from_str(&body)?;
        debug!(name: "source.manifest.fetched", count = entries.len(), "fetched chart manifest");
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn fetch_document(&self, id: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .client
            .get(self.document_url(id)?)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        debug!(name: "source.document.fetched", size = bytes.len(), "fetched chart document");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slash() {
        let source = HttpChartSource::with_client(reqwest::Client::new(), "https://charts.example/")
            .expect("valid base url");
        assert_eq!(
            source.manifest_url().expect("url").as_str(),
            "https://charts.example/manifest.json"
        );
        assert_eq!(
            source.document_url("LFPG-VAC-2024-01").expect("url").as_str(),
            "https://charts.example/charts/LFPG-VAC-2024-01"
        );
    }

    #[test]
    fn urls_keep_base_path_and_encode_ids() {
        let source = HttpChartSource::with_client(reqwest::Client::new(), "https://charts.example/v2/")
            .expect("valid base url");
        assert_eq!(
            source.document_url("LFPG/VAC?rev=2#p1").expect("url").as_str(),
            "https://charts.example/v2/charts/LFPG%2FVAC%3Frev=2%23p1"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        let client = reqwest::Client::new();
        assert!(matches!(
            HttpChartSource::with_client(client.clone(), "not a url"),
            Err(FetchError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            HttpChartSource::with_client(client, "mailto:charts@example.org"),
            Err(FetchError::InvalidBaseUrl(_))
        ));
    }
}
