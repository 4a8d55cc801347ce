use chrono::{DateTime, Utc};

use super::gateway::PersistenceGateway;
use super::mutation::MutationBuilder;
use super::row_key::{table_marker_key, StatsKey};
use super::{StatisticsRecord, StatisticsSource, StoredStatistics, LAST_STATS_UPDATE_TIME};
use crate::config::StatsConfig;
use crate::error::Result;
use crate::storage::StatsStore;
use crate::types::{decode_date, Mutation, MutationBatch, Timestamp, LATEST_TIMESTAMP};

/// Access to the statistics table for collection and region lifecycle code
pub struct StatisticsTable<S: StatsStore> {
    gateway: PersistenceGateway<S>,
    builder: MutationBuilder,
    config: StatsConfig,
}

impl<S: StatsStore> StatisticsTable<S> {
    pub fn open(store: S) -> Self {
        Self::with_config(store, StatsConfig::default())
    }

    pub fn with_config(store: S, config: StatsConfig) -> Self {
        let builder = MutationBuilder::new(config.family_bytes());
        Self {
            gateway: PersistenceGateway::new(store, builder.clone()),
            builder,
            config,
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Queue the statistics `source` computed for `family` of `region`.
    ///
    /// Without a source nothing happens at all. Otherwise the table's
    /// last-update marker is written immediately, and only once that write
    /// succeeds is the upsert appended to `batch`. Nothing is committed here;
    /// see [`StatisticsTable::commit_batch`].
    pub fn record_stats(
        &self,
        table: &str,
        region: &str,
        source: Option<&dyn StatisticsSource>,
        family: &str,
        batch: &mut MutationBatch,
        time: Timestamp,
    ) -> Result<()> {
        self.gateway.ensure_open()?;
        let Some(source) = source else {
            return Ok(());
        };
        let record = StatisticsRecord::from_source(table, family, region, source, time);
        let put = self.builder.build_upsert(&record)?;

        self.gateway.put_marker(table, time)?;
        batch.push(put);
        Ok(())
    }

    /// Commit everything gathered in `batch` atomically
    pub fn commit_batch(&self, batch: &MutationBatch) -> Result<()> {
        self.gateway.commit(batch)
    }

    /// Queue a tombstone retiring statistics written before `time`.
    /// The last-update marker is left alone.
    pub fn delete_stats(
        &self,
        table: &str,
        region: &str,
        family: &str,
        batch: &mut MutationBatch,
        time: Timestamp,
    ) -> Result<()> {
        self.gateway.ensure_open()?;
        let key = StatsKey { table, family, region };
        batch.push(self.builder.build_delete(&key, time)?);
        Ok(())
    }

    /// Write a mutation straight through, bypassing any batch
    pub fn apply_now(&self, mutation: &Mutation) -> Result<()> {
        self.gateway.apply(mutation)
    }

    /// Row key of the last-update marker row for `table`
    pub fn row_key_for_marker(table: &str) -> Result<Vec<u8>> {
        table_marker_key(table)
    }

    pub fn read_stats(
        &self,
        table: &str,
        family: &str,
        region: &str,
        as_of: Timestamp,
    ) -> Result<Option<StoredStatistics>> {
        let row = StatsKey { table, family, region }.row_key()?;
        match self.gateway.get_row(&row, as_of)? {
            Some(snapshot) => StoredStatistics::from_snapshot(&snapshot, self.builder.family()),
            None => Ok(None),
        }
    }

    pub fn last_update_time(&self, table: &str) -> Result<Option<DateTime<Utc>>> {
        let row = table_marker_key(table)?;
        let Some(snapshot) = self.gateway.get_row(&row, LATEST_TIMESTAMP)? else {
            return Ok(None);
        };
        snapshot
            .value(self.builder.family(), LAST_STATS_UPDATE_TIME)
            .map(decode_date)
            .transpose()
    }

    /// True when `table` has no marker or its marker is older than the
    /// configured minimum update frequency
    pub fn needs_refresh(&self, table: &str, now: DateTime<Utc>) -> Result<bool> {
        Ok(match self.last_update_time(table)? {
            Some(updated) => now - updated >= self.config.min_update_frequency,
            None => true,
        })
    }

    pub fn close(&self) -> Result<()> {
        self.gateway.close()
    }
}
