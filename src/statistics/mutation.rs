use super::row_key::{table_marker_key, StatsKey};
use super::{StatisticsRecord, EMPTY_COLUMN, GUIDE_POSTS, LAST_STATS_UPDATE_TIME, MAX_KEY, MIN_KEY};
use crate::error::{Error, Result};
use crate::types::{encode_date, Delete, Put, Timestamp};

/// Distance between a collection cycle's write time and the tombstone that
/// retires older statistics. Versions written at the cycle's own time stay
/// visible.
pub const DELETE_TIMESTAMP_OFFSET: Timestamp = 1;

/// Tombstone timestamp for a delete requested at `timestamp`
pub fn delete_timestamp(timestamp: Timestamp) -> Result<Timestamp> {
    timestamp
        .checked_sub(DELETE_TIMESTAMP_OFFSET)
        .ok_or(Error::InvalidTimestamp(timestamp))
}

/// Turns statistics into versioned writes and tombstones
#[derive(Debug, Clone)]
pub struct MutationBuilder {
    family: Vec<u8>,
}

impl MutationBuilder {
    pub fn new(family: impl Into<Vec<u8>>) -> Self {
        Self {
            family: family.into(),
        }
    }

    pub fn family(&self) -> &[u8] {
        &self.family
    }

    /// One put at `record.timestamp`: guide posts when present, then min key,
    /// max key and the empty sentinel column.
    pub fn build_upsert(&self, record: &StatisticsRecord) -> Result<Put> {
        record.validate()?;
        let mut put = Put::new(record.key().row_key()?, record.timestamp);
        if let Some(guide_posts) = &record.guide_posts {
            put.add(&self.family, GUIDE_POSTS, guide_posts.clone());
        }
        put.add(&self.family, MIN_KEY, record.min_key.clone())
            .add(&self.family, MAX_KEY, record.max_key.clone())
            // Keeps the row present for scans even without guide posts
            .add(&self.family, EMPTY_COLUMN, Vec::new());
        Ok(put)
    }

    /// Row tombstone shadowing everything written strictly before `timestamp`
    pub fn build_delete(&self, key: &StatsKey<'_>, timestamp: Timestamp) -> Result<Delete> {
        Ok(Delete {
            row: key.row_key()?,
            timestamp: delete_timestamp(timestamp)?,
        })
    }

    /// Last-update marker for `table`, stamped and valued with `time`
    pub fn build_marker(&self, table: &str, time: Timestamp) -> Result<Put> {
        let mut put = Put::new(table_marker_key(table)?, time);
        put.add(&self.family, LAST_STATS_UPDATE_TIME, encode_date(time)?.to_vec());
        Ok(put)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(guide_posts: Option<&[u8]>, timestamp: Timestamp) -> StatisticsRecord {
        StatisticsRecord {
            table_name: "T".into(),
            family_name: "F".into(),
            region_name: "R1".into(),
            guide_posts: guide_posts.map(<[u8]>::to_vec),
            min_key: vec![0x01],
            max_key: vec![0xFF],
            timestamp,
        }
    }

    fn qualifiers(put: &Put) -> Vec<&[u8]> {
        put.writes().iter().map(|w| w.qualifier.as_slice()).collect()
    }

    #[test]
    fn test_upsert_without_guide_posts() -> Result<()> {
        let builder = MutationBuilder::new("default");
        let put = builder.build_upsert(&record(None, 100))?;

        assert_eq!(put.row(), b"T\0F\0R1");
        assert_eq!(qualifiers(&put), vec![MIN_KEY, MAX_KEY, EMPTY_COLUMN]);
        assert!(put.writes().iter().all(|w| w.timestamp == 100));
        assert!(put.writes().iter().all(|w| w.family == b"default"));
        assert!(put.writes()[2].value.is_empty());
        Ok(())
    }

    #[test]
    fn test_upsert_with_guide_posts() -> Result<()> {
        let builder = MutationBuilder::new("default");
        let put = builder.build_upsert(&record(Some(b"posts"), 7))?;

        assert_eq!(qualifiers(&put), vec![GUIDE_POSTS, MIN_KEY, MAX_KEY, EMPTY_COLUMN]);
        assert_eq!(put.writes()[0].value, b"posts".to_vec());
        Ok(())
    }

    #[test]
    fn test_delete_lands_one_below() -> Result<()> {
        let builder = MutationBuilder::new("default");
        let key = StatsKey { table: "T", family: "F", region: "R1" };
        let delete = builder.build_delete(&key, 150)?;

        assert_eq!(delete.row, b"T\0F\0R1".to_vec());
        assert_eq!(delete.timestamp, 149);
        Ok(())
    }

    #[test]
    fn test_delete_at_minimum_timestamp() {
        let builder = MutationBuilder::new("default");
        let key = StatsKey { table: "T", family: "F", region: "R1" };
        assert!(matches!(
            builder.build_delete(&key, Timestamp::MIN),
            Err(Error::InvalidTimestamp(t)) if t == Timestamp::MIN
        ));
        assert_eq!(delete_timestamp(Timestamp::MIN + 1).ok(), Some(Timestamp::MIN));
    }

    #[test]
    fn test_marker_encodes_date() -> Result<()> {
        let builder = MutationBuilder::new("default");
        let put = builder.build_marker("T", 100)?;

        assert_eq!(put.row(), b"T");
        assert_eq!(qualifiers(&put), vec![LAST_STATS_UPDATE_TIME]);
        assert_eq!(put.writes()[0].value, 100i64.to_be_bytes().to_vec());
        Ok(())
    }
}
