// src/lib.rs
pub mod config;
pub mod error;
pub mod statistics;
pub mod storage;
pub mod types;

pub use config::StatsConfig;
pub use error::{Error, Result};
pub use statistics::{
    MutationBuilder, PersistenceGateway, StatisticsRecord, StatisticsSource, StatisticsTable,
    StoredStatistics,
};
pub use storage::{MemoryStore, StatsStore};
pub use types::{Delete, Mutation, MutationBatch, Put, Timestamp};
