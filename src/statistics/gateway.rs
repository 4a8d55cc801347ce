use parking_lot::RwLock;
use tracing::{debug, warn};

use super::mutation::MutationBuilder;
use crate::error::{Error, Result};
use crate::storage::{RowSnapshot, StatsStore};
use crate::types::{Mutation, MutationBatch, Timestamp};

/// Owns the connection to the statistics table.
///
/// Operations run synchronously on the caller's thread and are never
/// retried. Once `close` has run every other operation fails with
/// [`Error::ClosedHandle`].
pub struct PersistenceGateway<S: StatsStore> {
    store: RwLock<Option<S>>,
    builder: MutationBuilder,
}

impl<S: StatsStore> PersistenceGateway<S> {
    pub fn new(store: S, builder: MutationBuilder) -> Self {
        Self {
            store: RwLock::new(Some(store)),
            builder,
        }
    }

    fn with_store<T>(&self, f: impl FnOnce(&S) -> Result<T>) -> Result<T> {
        let guard = self.store.read();
        let store = guard.as_ref().ok_or(Error::ClosedHandle)?;
        f(store)
    }

    /// Fail with [`Error::ClosedHandle`] once the connection is released
    pub fn ensure_open(&self) -> Result<()> {
        self.with_store(|_| Ok(()))
    }

    /// Write the last-update marker for `table` right away, outside any batch
    pub fn put_marker(&self, table: &str, time: Timestamp) -> Result<()> {
        let put = self.builder.build_marker(table, time)?;
        self.with_store(|store| {
            store.put(&put).inspect_err(|err| {
                warn!(table, time, error = %err, "statistics marker write failed");
            })
        })?;
        debug!(table, time, "statistics marker written");
        Ok(())
    }

    /// Make every mutation in `batch` durable as one unit, or none of them.
    ///
    /// The row of the first mutation coordinates the commit; order confers
    /// nothing beyond that. An empty batch is a no-op.
    pub fn commit(&self, batch: &MutationBatch) -> Result<()> {
        self.with_store(|store| {
            let Some(row) = batch.first_row() else {
                return Ok(());
            };
            let coordination_row = String::from_utf8_lossy(row);
            store.mutate_rows(row, batch.as_slice()).inspect_err(|err| {
                warn!(
                    %coordination_row,
                    mutations = batch.len(),
                    error = %err,
                    "statistics batch commit failed"
                );
            })?;
            debug!(%coordination_row, mutations = batch.len(), "statistics batch committed");
            Ok(())
        })
    }

    /// Apply one mutation directly through the single-row path
    pub fn apply(&self, mutation: &Mutation) -> Result<()> {
        self.with_store(|store| {
            let result = match mutation {
                Mutation::Put(put) => store.put(put),
                Mutation::Delete(delete) => store.delete(delete),
            };
            result.inspect_err(|err| warn!(%mutation, error = %err, "statistics write failed"))
        })
    }

    pub fn get_row(&self, row: &[u8], as_of: Timestamp) -> Result<Option<RowSnapshot>> {
        self.with_store(|store| store.get_row(row, as_of))
    }

    /// Release the connection. Later calls are no-ops.
    pub fn close(&self) -> Result<()> {
        let store = self.store.write().take();
        match store {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.store.read().is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::statistics::LAST_STATS_UPDATE_TIME;
    use crate::storage::MemoryStore;
    use crate::types::{decode_date, Delete, Put, LATEST_TIMESTAMP};

    fn gateway() -> (Arc<MemoryStore>, PersistenceGateway<Arc<MemoryStore>>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = PersistenceGateway::new(Arc::clone(&store), MutationBuilder::new("default"));
        (store, gateway)
    }

    /// Store that remembers the coordination row of every atomic commit
    #[derive(Default)]
    struct RecordingStore {
        coordination_rows: Mutex<Vec<Vec<u8>>>,
    }

    impl StatsStore for RecordingStore {
        fn put(&self, _put: &Put) -> Result<()> {
            Ok(())
        }

        fn delete(&self, _delete: &Delete) -> Result<()> {
            Ok(())
        }

        fn mutate_rows(&self, coordination_row: &[u8], _mutations: &[Mutation]) -> Result<()> {
            self.coordination_rows.lock().push(coordination_row.to_vec());
            Ok(())
        }

        fn get_row(&self, _row: &[u8], _as_of: Timestamp) -> Result<Option<RowSnapshot>> {
            Ok(None)
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn put(row: &[u8], ts: Timestamp) -> Put {
        let mut put = Put::new(row.to_vec(), ts);
        put.add(b"default", b"q", vec![1]);
        put
    }

    #[test]
    fn test_put_marker_is_immediate() -> Result<()> {
        let (store, gateway) = gateway();
        gateway.put_marker("T", 100)?;

        let row = store.get_row(b"T", LATEST_TIMESTAMP)?.unwrap();
        let cell = row.cell(b"default", LAST_STATS_UPDATE_TIME).unwrap();
        assert_eq!(cell.timestamp, 100);
        assert_eq!(decode_date(&cell.value)?.timestamp_millis(), 100);
        Ok(())
    }

    #[test]
    fn test_empty_commit_is_noop() -> Result<()> {
        let (store, gateway) = gateway();
        store.fail_after(0);
        gateway.commit(&MutationBatch::new())?;
        assert_eq!(store.row_count(), 0);
        Ok(())
    }

    #[test]
    fn test_commit_spans_rows() -> Result<()> {
        let (store, gateway) = gateway();
        let mut batch = MutationBatch::new();
        batch.push(put(b"a", 5));
        batch.push(put(b"b", 5));
        batch.push(Delete { row: b"c".to_vec(), timestamp: 4 });
        gateway.commit(&batch)?;

        assert!(store.get_row(b"a", LATEST_TIMESTAMP)?.is_some());
        assert!(store.get_row(b"b", LATEST_TIMESTAMP)?.is_some());
        Ok(())
    }

    #[test]
    fn test_first_mutation_coordinates_commit() -> Result<()> {
        let store = Arc::new(RecordingStore::default());
        let gateway = PersistenceGateway::new(Arc::clone(&store), MutationBuilder::new("default"));

        let mut batch = MutationBatch::new();
        batch.push(Delete { row: b"c".to_vec(), timestamp: 4 });
        batch.push(put(b"a", 5));
        batch.push(put(b"b", 5));
        gateway.commit(&batch)?;

        let mut batch = MutationBatch::new();
        batch.push(put(b"m", 6));
        batch.push(put(b"z", 6));
        gateway.commit(&batch)?;

        // Empty batches never reach the store
        gateway.commit(&MutationBatch::new())?;

        assert_eq!(*store.coordination_rows.lock(), vec![b"c".to_vec(), b"m".to_vec()]);
        Ok(())
    }

    #[test]
    fn test_commit_failure_propagates() {
        let (store, gateway) = gateway();
        let mut batch = MutationBatch::new();
        batch.push(put(b"a", 5));
        batch.push(put(b"b", 5));

        store.fail_after(1);
        assert!(matches!(gateway.commit(&batch), Err(Error::StorageIo(_))));
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn test_apply_direct() -> Result<()> {
        let (store, gateway) = gateway();
        gateway.apply(&put(b"a", 5).into())?;
        gateway.apply(&Delete { row: b"a".to_vec(), timestamp: 5 }.into())?;
        assert!(store.get_row(b"a", LATEST_TIMESTAMP)?.is_none());
        Ok(())
    }

    #[test]
    fn test_close_is_idempotent() -> Result<()> {
        let (_store, gateway) = gateway();
        gateway.close()?;
        gateway.close()?;
        assert!(gateway.is_closed());

        assert!(matches!(gateway.commit(&MutationBatch::new()), Err(Error::ClosedHandle)));
        assert!(matches!(gateway.put_marker("T", 1), Err(Error::ClosedHandle)));
        let mut batch = MutationBatch::new();
        batch.push(put(b"a", 5));
        assert!(matches!(gateway.commit(&batch), Err(Error::ClosedHandle)));
        assert!(matches!(gateway.get_row(b"a", 5), Err(Error::ClosedHandle)));
        Ok(())
    }
}
