//! Per-profile scan watermark

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Incremental scan watermark for one profile
///
/// `high_water_mtime` never decreases. Every in-window file with an mtime at
/// or below it has been committed, so later scans may skip those files
/// without a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkRecord {
    pub profile_name: String,
    /// When the last run that advanced this record finished scanning
    pub last_scan_time: DateTime<Utc>,
    pub high_water_mtime: DateTime<Utc>,
}

impl WatermarkRecord {
    /// Whether a file with this mtime falls at or below the watermark
    #[must_use]
    pub fn covers(&self, mtime: DateTime<Utc>) -> bool {
        mtime <= self.high_water_mtime
    }
}
