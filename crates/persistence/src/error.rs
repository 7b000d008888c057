use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Sequence storage location is not configured")]
    Configuration,
    #[error("Counter '{name}' holds unparsable content {content:?}")]
    CorruptState {
        name: String,
        content: String,
    },
    #[error("Counter '{name}' is exhausted")]
    Exhausted {
        name: String,
    },
    #[error("Lock for counter '{name}' was poisoned")]
    LockPoisoned {
        name: String,
    },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
