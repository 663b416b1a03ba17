//! SQLite implementation of IWatermarkStore

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use photosync_core::domain::WatermarkRecord;
use photosync_core::ports::IWatermarkStore;

use crate::CacheError;

pub struct SqliteWatermarkStore {
    pool: SqlitePool,
}

impl SqliteWatermarkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn watermark_from_row(row: &SqliteRow) -> Result<WatermarkRecord, CacheError> {
    let profile_name: String = row.try_get("profile_name")?;
    let last_scan_time: String = row.try_get("last_scan_time")?;
    let high_water_us: i64 = row.try_get("high_water_mtime_us")?;

    let high_water_mtime = DateTime::<Utc>::from_timestamp_micros(high_water_us)
        .ok_or_else(|| {
            CacheError::SerializationError(format!(
                "high-water mtime out of range for {profile_name}"
            ))
        })?;

    Ok(WatermarkRecord {
        last_scan_time: parse_datetime(&last_scan_time)?,
        profile_name,
        high_water_mtime,
    })
}

#[async_trait::async_trait]
impl IWatermarkStore for SqliteWatermarkStore {
    async fn get(&self, profile: &str) -> anyhow::Result<Option<WatermarkRecord>> {
        let row = sqlx::query(
            "SELECT profile_name, last_scan_time, high_water_mtime_us \
             FROM watermarks WHERE profile_name = ?",
        )
        .bind(profile)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(watermark_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn advance(
        &self,
        profile: &str,
        high_water: Option<DateTime<Utc>>,
        scan_time: DateTime<Utc>,
    ) -> anyhow::Result<Option<WatermarkRecord>> {
        let scan_time = scan_time.to_rfc3339();

        match high_water {
            Some(mtime) => {
                sqlx::query(
                    "INSERT INTO watermarks (profile_name, last_scan_time, high_water_mtime_us) \
                     VALUES (?, ?, ?) \
                     ON CONFLICT(profile_name) DO UPDATE SET \
                     last_scan_time = excluded.last_scan_time, \
                     high_water_mtime_us = MAX(high_water_mtime_us, excluded.high_water_mtime_us)",
                )
                .bind(profile)
                .bind(&scan_time)
                .bind(mtime.timestamp_micros())
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query("UPDATE watermarks SET last_scan_time = ? WHERE profile_name = ?")
                    .bind(&scan_time)
                    .bind(profile)
                    .execute(&self.pool)
                    .await?;
            }
        }

        let record = self.get(profile).await?;
        tracing::debug!(
            profile,
            high_water = ?record.as_ref().map(|r| r.high_water_mtime),
            "Watermark advanced"
        );
        Ok(record)
    }

    async fn reset(&self, profile: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM watermarks WHERE profile_name = ?")
            .bind(profile)
            .execute(&self.pool)
            .await?;
        tracing::info!(profile, "Watermark reset");
        Ok(())
    }
}
