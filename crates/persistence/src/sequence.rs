//! Durable sequence numbers.
//!
//! One global counter (`sequence`) plus one counter per application resource
//! (`sequence_for_<identifier>`). Each counter is a file holding the last
//! value handed out.
//!
//! # Guarantees
//! - A value is persisted before it is returned
//! - A counter never hands out a value twice, across restarts
//! - Callers on the same counter are serialized, callers on different
//!   counters never contend
//! - Unparsable state is surfaced, never reset to 0
//!
//! Locks are in-process only: two processes sharing a directory can still
//! hand out the same value.

use crate::error::{PersistenceError, Result};
use crate::files::{DiskFiles, Files};
use horizon_kernel::{ApplicationResourceIdentifier, EventSequenceNumber};
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

pub const SEQUENCE_FILE_NAME: &str = "sequence";
pub const SEQUENCE_FOR_PREFIX: &str = "sequence_for_";

/// Source of monotonically increasing sequence numbers.
pub trait EventSequenceNumbers: Send + Sync {
    /// Next value of the global counter.
    fn next(&self) -> Result<EventSequenceNumber>;

    /// Next value of the counter scoped to `identifier`.
    fn next_for_type(&self, identifier: &ApplicationResourceIdentifier) -> Result<EventSequenceNumber>;
}

pub struct SequenceGenerator<F: Files = DiskFiles> {
    files: F,
    path: PathBuf,
    global_lock: Mutex<()>,
    /// Created on first use of a counter name, never removed.
    locks_per_type: RwLock<FxHashMap<String, Arc<Mutex<()>>>>,
}

impl<F: Files> SequenceGenerator<F> {
    pub fn new(files: F, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(PersistenceError::Configuration);
        }

        Ok(Self {
            files,
            path,
            global_lock: Mutex::new(()),
            locks_per_type: RwLock::new(FxHashMap::default()),
        })
    }

    /// Like `new`, for a location that may not have been configured at all.
    pub fn configured(files: F, path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::new(files, path),
            None => Err(PersistenceError::Configuration),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the counter scoped to `identifier`.
    pub fn counter_name_for(identifier: &ApplicationResourceIdentifier) -> String {
        format!("{}{}", SEQUENCE_FOR_PREFIX, identifier)
    }

    fn lock_for(&self, name: &str) -> Result<Arc<Mutex<()>>> {
        // Fast path: read lock
        {
            let locks = self
                .locks_per_type
                .read()
                .map_err(|_| PersistenceError::LockPoisoned { name: name.to_string() })?;
            if let Some(lock) = locks.get(name) {
                return Ok(lock.clone());
            }
        }

        // Slow path: another caller may have inserted it in between
        let mut locks = self
            .locks_per_type
            .write()
            .map_err(|_| PersistenceError::LockPoisoned { name: name.to_string() })?;
        Ok(locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Read, increment and persist `name`. The caller must hold its lock.
    fn advance(&self, name: &str) -> Result<EventSequenceNumber> {
        // Only a missing file starts a counter; any other read failure is surfaced
        let current = match self.files.read_string(&self.path, name) {
            Ok(content) => content
                .trim()
                .parse::<u64>()
                .map_err(|_| PersistenceError::CorruptState {
                    name: name.to_string(),
                    content,
                })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Starting sequence counter '{}' in {:?}", name, self.path);
                0
            }
            Err(e) => return Err(e.into()),
        };

        let next = current.checked_add(1).ok_or_else(|| PersistenceError::Exhausted {
            name: name.to_string(),
        })?;
        self.files.write_string(&self.path, name, &next.to_string())?;

        Ok(EventSequenceNumber(next))
    }
}

impl<F: Files> EventSequenceNumbers for SequenceGenerator<F> {
    fn next(&self) -> Result<EventSequenceNumber> {
        let _guard = self.global_lock.lock().map_err(|_| PersistenceError::LockPoisoned {
            name: SEQUENCE_FILE_NAME.to_string(),
        })?;
        self.advance(SEQUENCE_FILE_NAME)
    }

    fn next_for_type(&self, identifier: &ApplicationResourceIdentifier) -> Result<EventSequenceNumber> {
        let name = Self::counter_name_for(identifier);
        let lock = self.lock_for(&name)?;
        let _guard = lock
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned { name: name.clone() })?;
        self.advance(&name)
    }
}

impl<T: EventSequenceNumbers + ?Sized> EventSequenceNumbers for Arc<T> {
    fn next(&self) -> Result<EventSequenceNumber> {
        (**self).next()
    }

    fn next_for_type(&self, identifier: &ApplicationResourceIdentifier) -> Result<EventSequenceNumber> {
        (**self).next_for_type(identifier)
    }
}
