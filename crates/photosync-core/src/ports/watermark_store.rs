//! Watermark store port

use chrono::{DateTime, Utc};

use crate::domain::watermark::WatermarkRecord;

#[async_trait::async_trait]
pub trait IWatermarkStore: Send + Sync {
    async fn get(&self, profile: &str) -> anyhow::Result<Option<WatermarkRecord>>;

    /// Records a finished scan and raises the high-water mtime
    ///
    /// The stored value becomes `MAX(old, high_water)`, so the watermark
    /// never moves backwards. With `high_water = None` only the scan time of
    /// an existing record is updated. Returns the stored record, if any.
    async fn advance(
        &self,
        profile: &str,
        high_water: Option<DateTime<Utc>>,
        scan_time: DateTime<Utc>,
    ) -> anyhow::Result<Option<WatermarkRecord>>;

    /// Forgets the watermark so the next run scans the full tree
    async fn reset(&self, profile: &str) -> anyhow::Result<()>;
}
