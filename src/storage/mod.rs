use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{Delete, Mutation, Put, Timestamp};

pub mod memory;

pub use memory::MemoryStore;

/// Connection to the table that holds statistics rows.
///
/// Implementations must be safe for concurrent use; callers share one
/// connection across threads without further locking.
pub trait StatsStore: Send + Sync {
    /// Apply a single-row put immediately
    fn put(&self, put: &Put) -> Result<()>;

    /// Apply a single-row tombstone immediately
    fn delete(&self, delete: &Delete) -> Result<()>;

    /// Apply every mutation or none of them. `coordination_row` names the
    /// row that coordinates the commit and must be the row of one of the
    /// mutations.
    fn mutate_rows(&self, coordination_row: &[u8], mutations: &[Mutation]) -> Result<()>;

    /// Read a row as it was at `as_of`. Only cells and tombstones stamped at
    /// or before `as_of` are considered.
    fn get_row(&self, row: &[u8], as_of: Timestamp) -> Result<Option<RowSnapshot>>;

    /// Release the connection
    fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub timestamp: Timestamp,
    pub value: Vec<u8>,
}

/// Visible cells of one row at a read point, keyed by (family, qualifier)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSnapshot {
    cells: BTreeMap<(Vec<u8>, Vec<u8>), Cell>,
}

impl RowSnapshot {
    pub fn insert(&mut self, family: &[u8], qualifier: &[u8], cell: Cell) {
        self.cells.insert((family.to_vec(), qualifier.to_vec()), cell);
    }

    pub fn cell(&self, family: &[u8], qualifier: &[u8]) -> Option<&Cell> {
        self.cells.get(&(family.to_vec(), qualifier.to_vec()))
    }

    pub fn value(&self, family: &[u8], qualifier: &[u8]) -> Option<&[u8]> {
        self.cell(family, qualifier).map(|c| c.value.as_slice())
    }

    pub fn contains(&self, family: &[u8], qualifier: &[u8]) -> bool {
        self.cell(family, qualifier).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<T: StatsStore + ?Sized> StatsStore for std::sync::Arc<T> {
    fn put(&self, put: &Put) -> Result<()> {
        (**self).put(put)
    }

    fn delete(&self, delete: &Delete) -> Result<()> {
        (**self).delete(delete)
    }

    fn mutate_rows(&self, coordination_row: &[u8], mutations: &[Mutation]) -> Result<()> {
        (**self).mutate_rows(coordination_row, mutations)
    }

    fn get_row(&self, row: &[u8], as_of: Timestamp) -> Result<Option<RowSnapshot>> {
        (**self).get_row(row, as_of)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}
