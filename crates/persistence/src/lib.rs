pub mod error;
pub mod files;
pub mod sequence;

pub use error::{PersistenceError, Result};
pub use files::{DiskFiles, Files, MemoryFiles};
pub use sequence::{EventSequenceNumbers, SequenceGenerator};
