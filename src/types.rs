// src/types.rs
use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::{Error, Result};

/// Logical write time in milliseconds, supplied by the caller.
pub type Timestamp = i64;

/// Read point that sees every version ever written.
pub const LATEST_TIMESTAMP: Timestamp = i64::MAX;

/// Width of an encoded calendar date.
pub const DATE_LEN: usize = 8;

/// A single versioned cell write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWrite {
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    pub timestamp: Timestamp,
    pub value: Vec<u8>,
}

/// Field writes under one row key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    row: Vec<u8>,
    timestamp: Timestamp,
    writes: Vec<FieldWrite>,
}

impl Put {
    pub fn new(row: Vec<u8>, timestamp: Timestamp) -> Self {
        Self {
            row,
            timestamp,
            writes: Vec::new(),
        }
    }

    /// Add a field at the put's own timestamp
    pub fn add(&mut self, family: &[u8], qualifier: &[u8], value: Vec<u8>) -> &mut Self {
        self.writes.push(FieldWrite {
            family: family.to_vec(),
            qualifier: qualifier.to_vec(),
            timestamp: self.timestamp,
            value,
        });
        self
    }

    pub fn row(&self) -> &[u8] {
        &self.row
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn writes(&self) -> &[FieldWrite] {
        &self.writes
    }
}

/// Row tombstone. Shadows every cell of the row with a timestamp less than
/// or equal to its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub row: Vec<u8>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put(Put),
    Delete(Delete),
}

impl Mutation {
    pub fn row(&self) -> &[u8] {
        match self {
            Mutation::Put(put) => put.row(),
            Mutation::Delete(delete) => &delete.row,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Mutation::Put(put) => put.timestamp(),
            Mutation::Delete(delete) => delete.timestamp,
        }
    }
}

impl From<Put> for Mutation {
    fn from(put: Put) -> Self {
        Mutation::Put(put)
    }
}

impl From<Delete> for Mutation {
    fn from(delete: Delete) -> Self {
        Mutation::Delete(delete)
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Put(put) => write!(
                f,
                "PUT {} @{} ({} fields)",
                String::from_utf8_lossy(put.row()),
                put.timestamp(),
                put.writes().len()
            ),
            Mutation::Delete(delete) => write!(
                f,
                "DELETE {} @{}",
                String::from_utf8_lossy(&delete.row),
                delete.timestamp
            ),
        }
    }
}

/// Pending mutations gathered by a caller before one atomic commit.
///
/// Order is preserved; the row of the first mutation coordinates the commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    mutations: Vec<Mutation>,
}

impl MutationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: impl Into<Mutation>) {
        self.mutations.push(mutation.into());
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    /// Row key that coordinates an atomic commit of this batch
    pub fn first_row(&self) -> Option<&[u8]> {
        self.mutations.first().map(Mutation::row)
    }

    pub fn as_slice(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn clear(&mut self) {
        self.mutations.clear();
    }

    pub fn into_inner(self) -> Vec<Mutation> {
        self.mutations
    }
}

/// Encode a timestamp as a calendar date: big-endian epoch milliseconds.
pub fn encode_date(time: Timestamp) -> Result<[u8; DATE_LEN]> {
    DateTime::<Utc>::from_timestamp_millis(time).ok_or(Error::InvalidTimestamp(time))?;
    Ok(time.to_be_bytes())
}

pub fn decode_date(bytes: &[u8]) -> Result<DateTime<Utc>> {
    let raw: [u8; DATE_LEN] = bytes.try_into().map_err(|_| {
        Error::StorageIo(format!(
            "date cell has {} bytes, expected {}",
            bytes.len(),
            DATE_LEN
        ))
    })?;
    let millis = i64::from_be_bytes(raw);
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or(Error::InvalidTimestamp(millis))
}
