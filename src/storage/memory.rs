use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Cell, RowSnapshot, StatsStore};
use crate::error::{Error, Result};
use crate::types::{Delete, Mutation, Put, Timestamp};

/// Every version of one row: cell versions per column plus row tombstones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RowVersions {
    columns: BTreeMap<(Vec<u8>, Vec<u8>), BTreeMap<Timestamp, Vec<u8>>>,
    tombstones: BTreeSet<Timestamp>,
}

impl RowVersions {
    fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::Put(put) => {
                for write in put.writes() {
                    // Same coordinates overwrite rather than accumulate
                    self.columns
                        .entry((write.family.clone(), write.qualifier.clone()))
                        .or_default()
                        .insert(write.timestamp, write.value.clone());
                }
            }
            Mutation::Delete(delete) => {
                self.tombstones.insert(delete.timestamp);
            }
        }
    }

    fn snapshot(&self, as_of: Timestamp) -> Option<RowSnapshot> {
        let shadow = self.tombstones.range(..=as_of).next_back().copied();
        let mut snapshot = RowSnapshot::default();
        for ((family, qualifier), versions) in &self.columns {
            let Some((&timestamp, value)) = versions.range(..=as_of).next_back() else {
                continue;
            };
            if shadow.is_some_and(|t| timestamp <= t) {
                continue;
            }
            snapshot.insert(
                family,
                qualifier,
                Cell {
                    timestamp,
                    value: value.clone(),
                },
            );
        }
        (!snapshot.is_empty()).then_some(snapshot)
    }
}

struct Inner {
    rows: BTreeMap<Vec<u8>, RowVersions>,
    closed: bool,
    fail_after: Option<usize>,
}

/// In-process versioned table.
///
/// Writes are staged on copies of the touched rows and swapped in under a
/// single write lock, so a failed write leaves no trace. With a snapshot path
/// the whole table is saved after every successful write.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                rows: BTreeMap::new(),
                closed: false,
                fail_after: None,
            }),
            snapshot_path: None,
        }
    }

    /// Open a store persisted at `path`, loading the snapshot if one exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rows = if path.exists() {
            let bytes = fs::read(&path)?;
            let rows: BTreeMap<Vec<u8>, RowVersions> = bincode::deserialize(&bytes)?;
            debug!(path = %path.display(), rows = rows.len(), "loaded statistics snapshot");
            rows
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            inner: RwLock::new(Inner {
                rows,
                closed: false,
                fail_after: None,
            }),
            snapshot_path: Some(path),
        })
    }

    /// Fail the write that would stage mutation number `n + 1` from now.
    /// The fault fires once.
    pub fn fail_after(&self, n: usize) {
        self.inner.write().fail_after = Some(n);
    }

    pub fn row_count(&self) -> usize {
        self.inner.read().rows.len()
    }

    fn persist(&self, rows: &BTreeMap<Vec<u8>, RowVersions>) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let bytes = bincode::serialize(rows)?;
        let tmp = temp_path(path);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write<'a>(&self, mutations: impl IntoIterator<Item = &'a Mutation>) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(Error::StorageIo("store is closed".to_string()));
        }

        let mut staged: BTreeMap<Vec<u8>, RowVersions> = BTreeMap::new();
        for mutation in mutations {
            if let Some(remaining) = inner.fail_after.as_mut() {
                if *remaining == 0 {
                    inner.fail_after = None;
                    warn!(row = %String::from_utf8_lossy(mutation.row()), "injected write failure");
                    return Err(Error::StorageIo("injected write failure".to_string()));
                }
                *remaining -= 1;
            }
            let row = mutation.row();
            staged
                .entry(row.to_vec())
                .or_insert_with(|| inner.rows.get(row).cloned().unwrap_or_default())
                .apply(mutation);
        }

        let mut previous = Vec::with_capacity(staged.len());
        for (row, versions) in staged {
            let prior = inner.rows.insert(row.clone(), versions);
            previous.push((row, prior));
        }

        if let Err(err) = self.persist(&inner.rows) {
            for (row, prior) in previous.into_iter().rev() {
                match prior {
                    Some(versions) => inner.rows.insert(row, versions),
                    None => inner.rows.remove(&row),
                };
            }
            return Err(err);
        }
        Ok(())
    }
}

/// Sibling of `path` used while a snapshot is being written
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

impl StatsStore for MemoryStore {
    fn put(&self, put: &Put) -> Result<()> {
        self.write([&Mutation::Put(put.clone())])
    }

    fn delete(&self, delete: &Delete) -> Result<()> {
        self.write([&Mutation::Delete(delete.clone())])
    }

    fn mutate_rows(&self, coordination_row: &[u8], mutations: &[Mutation]) -> Result<()> {
        if mutations.is_empty() {
            return Ok(());
        }
        if !mutations.iter().any(|m| m.row() == coordination_row) {
            return Err(Error::StorageIo(format!(
                "coordination row {} is not part of the batch",
                String::from_utf8_lossy(coordination_row)
            )));
        }
        self.write(mutations)
    }

    fn get_row(&self, row: &[u8], as_of: Timestamp) -> Result<Option<RowSnapshot>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(Error::StorageIo("store is closed".to_string()));
        }
        Ok(inner.rows.get(row).and_then(|versions| versions.snapshot(as_of)))
    }

    fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Ok(());
        }
        self.persist(&inner.rows)?;
        inner.closed = true;
        Ok(())
    }
}
