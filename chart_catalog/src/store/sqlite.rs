use crate::error::StoreError;
use crate::store::models::{AirportSummary, BlobRow, ChartFilter, ChartRow, MergeReport};
use crate::store::ChartStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::charts::{Chart, ExtractedData, ExtractionStatus, ManifestEntry, SessionRecord};
use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{debug, instrument, warn};

const ZSTD_LEVEL: i32 = 3;
const COMPRESSION_ZSTD: &str = "zstd";

const CHART_COLUMNS: &str = "id, airport_icao, airport_name, document_type, version, \
    effective_date, expiry_date, file_size_bytes, downloaded_at, last_accessed_at, \
    is_downloaded, is_outdated, extraction_status, extracted_data";

#[derive(Clone)]
pub struct SqliteChartStore {
    pool: Pool<Sqlite>,
}

impl SqliteChartStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

fn into_charts(rows: Vec<ChartRow>) -> Result<Vec<Chart>, StoreError> {
    rows.into_iter()
        .map(|row| Chart::try_from(row).map_err(StoreError::from))
        .collect()
}

fn serialize_extracted(data: Option<&ExtractedData>) -> Result<Option<String>, StoreError> {
    data.map(serde_json::to_string)
        .transpose()
        .map_err(StoreError::from)
}

#[async_trait]
impl ChartStore for SqliteChartStore {
    async fn load_all(&self) -> Result<Vec<Chart>, StoreError> {
        let sql =
            format!("SELECT {CHART_COLUMNS} FROM charts ORDER BY airport_icao, document_type, id");
        let rows = sqlx::query_as::<_, ChartRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_charts(rows)
    }

    async fn get(&self, id: &str) -> Result<Option<Chart>, StoreError> {
        let sql = format!("SELECT {CHART_COLUMNS} FROM charts WHERE id = ?");
        sqlx::query_as::<_, ChartRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| Chart::try_from(row).map_err(StoreError::from))
            .transpose()
    }

    async fn list_filtered(&self, filter: &ChartFilter) -> Result<Vec<Chart>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {CHART_COLUMNS} FROM charts WHERE 1 = 1"));

        if let Some(icao) = &filter.airport_icao {
            query.push(" AND airport_icao = ").push_bind(icao.to_uppercase());
        }
        if let Some(document_type) = &filter.document_type {
            query.push(" AND document_type = ").push_bind(document_type.clone());
        }
        if let Some(version) = &filter.version {
            query.push(" AND version = ").push_bind(version.clone());
        }
        if let Some(is_downloaded) = filter.is_downloaded {
            query.push(" AND is_downloaded = ").push_bind(is_downloaded);
        }
        if let Some(is_outdated) = filter.is_outdated {
            query.push(" AND is_outdated = ").push_bind(is_outdated);
        }
        query.push(" ORDER BY airport_icao, document_type, id");

        let rows = query
            .build_query_as::<ChartRow>()
            .fetch_all(&self.pool)
            .await?;
        into_charts(rows)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn merge_manifest(
        &self,
        entries: &[ManifestEntry],
        now: DateTime<Utc>,
    ) -> Result<MergeReport, StoreError> {
        let mut report = MergeReport::default();
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM charts WHERE id = ?)")
                    .bind(&entry.id)
                    .fetch_one(&mut *tx)
                    .await?;

            sqlx::query(
                r"
                INSERT INTO charts (
                    id,
                    airport_icao,
                    airport_name,
                    document_type,
                    version,
                    effective_date,
                    expiry_date,
                    file_size_bytes,
                    is_downloaded,
                    is_outdated,
                    extraction_status
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    airport_icao = excluded.airport_icao,
                    airport_name = excluded.airport_name,
                    document_type = excluded.document_type,
                    version = excluded.version,
                    effective_date = excluded.effective_date,
                    expiry_date = excluded.expiry_date,
                    file_size_bytes = excluded.file_size_bytes,
                    is_outdated = excluded.is_outdated
                ",
            )
            .bind(&entry.id)
            .bind(entry.airport_icao.to_uppercase())
            .bind(&entry.airport_name)
            .bind(&entry.document_type)
            .bind(&entry.version)
            .bind(entry.effective_date)
            .bind(entry.expiry_date)
            .bind(i64::try_from(entry.file_size_bytes)?)
            .bind(now > entry.expiry_date)
            .bind(ExtractionStatus::Pending)
            .execute(&mut *tx)
            .await?;

            if exists {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }

        tx.commit().await?;
        debug!(name: "store.manifest.merged", inserted = report.inserted, updated = report.updated, "merged manifest");
        Ok(report)
    }

    async fn put(&self, chart: &Chart) -> Result<(), StoreError> {
        let extracted = serialize_extracted(chart.extracted_data.as_ref())?;
        let mut tx = self.pool.begin().await?;

        if chart.is_downloaded {
            let has_blob: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM blobs WHERE id = ?)")
                    .bind(&chart.id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !has_blob {
                return Err(StoreError::MissingBlob(chart.id.clone()));
            }
        }

        sqlx::query(
            r"
            INSERT INTO charts (
                id,
                airport_icao,
                airport_name,
                document_type,
                version,
                effective_date,
                expiry_date,
                file_size_bytes,
                downloaded_at,
                last_accessed_at,
                is_downloaded,
                is_outdated,
                extraction_status,
                extracted_data
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                airport_icao = excluded.airport_icao,
                airport_name = excluded.airport_name,
                document_type = excluded.document_type,
                version = excluded.version,
                effective_date = excluded.effective_date,
                expiry_date = excluded.expiry_date,
                file_size_bytes = excluded.file_size_bytes,
                downloaded_at = excluded.downloaded_at,
                last_accessed_at = excluded.last_accessed_at,
                is_downloaded = excluded.is_downloaded,
                is_outdated = excluded.is_outdated,
                extraction_status = excluded.extraction_status,
                extracted_data = excluded.extracted_data
            ",
        )
        .bind(&chart.id)
        .bind(chart.airport_icao.to_uppercase())
        .bind(&chart.airport_name)
        .bind(&chart.document_type)
        .bind(&chart.version)
        .bind(chart.effective_date)
        .bind(chart.expiry_date)
        .bind(i64::try_from(chart.file_size_bytes)?)
        .bind(chart.downloaded_at)
        .bind(chart.last_accessed_at)
        .bind(chart.is_downloaded)
        .bind(chart.is_outdated)
        .bind(chart.extraction_status)
        .bind(extracted)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put_blob(
        &self,
        id: &str,
        bytes: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let original_size = i64::try_from(bytes.len())?;
        let payload_compressed = zstd::encode_all(bytes, ZSTD_LEVEL)?;

        sqlx::query(
            r"
            INSERT INTO blobs (id, payload_compressed, original_size_bytes, compression_algo, stored_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                payload_compressed = excluded.payload_compressed,
                original_size_bytes = excluded.original_size_bytes,
                compression_algo = excluded.compression_algo,
                stored_at = excluded.stored_at
            ",
        )
        .bind(id)
        .bind(payload_compressed)
        .bind(original_size)
        .bind(COMPRESSION_ZSTD)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_blob(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(row) = sqlx::query_as::<_, BlobRow>(
            "SELECT payload_compressed, original_size_bytes, compression_algo FROM blobs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        sqlx::query("UPDATE charts SET last_accessed_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        let bytes = match row.compression_algo.as_str() {
            COMPRESSION_ZSTD => zstd::decode_all(row.payload_compressed.as_slice())?,
            "none" => row.payload_compressed,
            other => return Err(StoreError::UnsupportedCompression(other.to_string())),
        };
        if i64::try_from(bytes.len())? != row.original_size_bytes {
            warn!(
                name: "store.blob.size_mismatch",
                id,
                expected = row.original_size_bytes,
                actual = bytes.len(),
                "stored blob size differs from recorded original size"
            );
        }

        Ok(Some(bytes))
    }

    async fn mark_downloaded(&self, id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE charts
            SET is_downloaded = TRUE, downloaded_at = ?, last_accessed_at = ?
            WHERE id = ? AND EXISTS (SELECT 1 FROM blobs WHERE blobs.id = charts.id)
            ",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn begin_extraction(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE charts SET extraction_status = ? WHERE id = ? AND extraction_status != ?",
        )
        .bind(ExtractionStatus::Processing)
        .bind(id)
        .bind(ExtractionStatus::Manual)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_extraction(
        &self,
        id: &str,
        status: ExtractionStatus,
        data: Option<&ExtractedData>,
        overwrite_manual: bool,
    ) -> Result<bool, StoreError> {
        let extracted = serialize_extracted(data)?;
        let result = sqlx::query(
            r"
            UPDATE charts
            SET extraction_status = ?, extracted_data = COALESCE(?, extracted_data)
            WHERE id = ? AND (? OR extraction_status != ?)
            ",
        )
        .bind(status)
        .bind(extracted)
        .bind(id)
        .bind(overwrite_manual)
        .bind(ExtractionStatus::Manual)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_outdated(&self, flags: &[(String, bool)]) -> Result<u64, StoreError> {
        let mut changed = 0;
        let mut tx = self.pool.begin().await?;

        for (id, is_outdated) in flags {
            changed += sqlx::query(
                "UPDATE charts SET is_outdated = ? WHERE id = ? AND is_outdated != ?",
            )
            .bind(*is_outdated)
            .bind(id)
            .bind(*is_outdated)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let blobs = sqlx::query("DELETE FROM blobs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let charts = sqlx::query("DELETE FROM charts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(blobs + charts > 0)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM blobs").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM charts").execute(&mut *tx).await?;
        sqlx::query(
            "UPDATE session SET selected_airport = NULL, last_sync_timestamp = NULL WHERE id = 1",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn airports(&self) -> Result<Vec<AirportSummary>, StoreError> {
        sqlx::query_as::<_, AirportSummary>(
            r"
            SELECT
                airport_icao AS icao,
                MAX(airport_name) AS name,
                COUNT(*) AS chart_count,
                COALESCE(SUM(is_downloaded), 0) AS downloaded_count
            FROM charts
            GROUP BY airport_icao
            ORDER BY airport_icao
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)
    }

    async fn load_session(&self) -> Result<SessionRecord, StoreError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT selected_airport, last_sync_timestamp FROM session WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.unwrap_or_default())
    }

    async fn save_selected_airport(&self, icao: Option<&str>) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO session (id, selected_airport) VALUES (1, ?)
            ON CONFLICT (id) DO UPDATE SET selected_airport = excluded.selected_airport
            ",
        )
        .bind(icao)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_last_sync(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO session (id, last_sync_timestamp) VALUES (1, ?)
            ON CONFLICT (id) DO UPDATE SET last_sync_timestamp = excluded.last_sync_timestamp
            ",
        )
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
