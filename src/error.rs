use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("Invalid key range: {0}")]
    InvalidKeyRange(String),

    #[error("Storage I/O failure: {0}")]
    StorageIo(String),

    #[error("Statistics table handle is closed")]
    ClosedHandle,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageIo(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::StorageIo(format!("snapshot encoding: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
