//! Per-region, per-family statistics rows and the facade that persists them.
//!
//! Each (table, family, region) triple owns one row holding guide posts and
//! the observed key bounds. A bare-table row holds the time the table's
//! statistics were last touched.

use crate::error::{Error, Result};
use crate::storage::RowSnapshot;
use crate::types::Timestamp;

pub mod gateway;
pub mod mutation;
pub mod row_key;
pub mod table;

pub use gateway::PersistenceGateway;
pub use mutation::{delete_timestamp, MutationBuilder, DELETE_TIMESTAMP_OFFSET};
pub use row_key::{region_stats_key, table_marker_key, StatsKey};
pub use table::StatisticsTable;

pub const GUIDE_POSTS: &[u8] = b"guideposts";
pub const MIN_KEY: &[u8] = b"min_key";
pub const MAX_KEY: &[u8] = b"max_key";
/// Sentinel column written on every statistics row, always with an empty value
pub const EMPTY_COLUMN: &[u8] = b"_0";
pub const LAST_STATS_UPDATE_TIME: &[u8] = b"last_stats_update_time";

/// Statistics computed by a collector for one region, per column family
pub trait StatisticsSource {
    fn guide_posts(&self, family: &str) -> Option<Vec<u8>>;
    fn min_key(&self, family: &str) -> Vec<u8>;
    fn max_key(&self, family: &str) -> Vec<u8>;
}

/// Statistics for one (table, family, region) at one write time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsRecord {
    pub table_name: String,
    pub family_name: String,
    pub region_name: String,
    pub guide_posts: Option<Vec<u8>>,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
    pub timestamp: Timestamp,
}

impl StatisticsRecord {
    pub fn from_source(
        table: &str,
        family: &str,
        region: &str,
        source: &dyn StatisticsSource,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            table_name: table.to_string(),
            family_name: family.to_string(),
            region_name: region.to_string(),
            guide_posts: source.guide_posts(family),
            min_key: source.min_key(family),
            max_key: source.max_key(family),
            timestamp,
        }
    }

    pub fn key(&self) -> StatsKey<'_> {
        StatsKey {
            table: &self.table_name,
            family: &self.family_name,
            region: &self.region_name,
        }
    }

    /// Check identifiers and that min_key <= max_key in byte order
    pub fn validate(&self) -> Result<()> {
        self.key().row_key()?;
        if self.min_key > self.max_key {
            return Err(Error::InvalidKeyRange(format!(
                "min key {:?} sorts after max key {:?} in {}",
                self.min_key, self.max_key, self.region_name
            )));
        }
        Ok(())
    }
}

/// Statistics as read back from the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStatistics {
    pub guide_posts: Option<Vec<u8>>,
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,
    pub timestamp: Timestamp,
}

impl StoredStatistics {
    /// Decode a statistics row. A row without the sentinel column holds no
    /// statistics. Guide posts count only when written together with the
    /// sentinel, so a newer cycle without guide posts hides older ones.
    pub fn from_snapshot(snapshot: &RowSnapshot, family: &[u8]) -> Result<Option<Self>> {
        let Some(sentinel) = snapshot.cell(family, EMPTY_COLUMN) else {
            return Ok(None);
        };
        let required = |qualifier: &[u8]| {
            snapshot.value(family, qualifier).map(<[u8]>::to_vec).ok_or_else(|| {
                Error::StorageIo(format!(
                    "statistics row is missing {}",
                    String::from_utf8_lossy(qualifier)
                ))
            })
        };
        Ok(Some(Self {
            guide_posts: snapshot
                .cell(family, GUIDE_POSTS)
                .filter(|cell| cell.timestamp == sentinel.timestamp)
                .map(|cell| cell.value.clone()),
            min_key: required(MIN_KEY)?,
            max_key: required(MAX_KEY)?,
            timestamp: sentinel.timestamp,
        }))
    }
}
