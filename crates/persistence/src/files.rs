//! Named string files under a directory.
//!
//! Counters are persisted as one small text file each. `DiskFiles` replaces a
//! file atomically (write temp, fsync, rename) so a crash mid-write leaves
//! either the old or the new value, never a torn one.

use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A missing file is reported as `io::ErrorKind::NotFound` by `read_string`,
/// every other failure keeps its own kind.
pub trait Files: Send + Sync {
    fn read_string(&self, path: &Path, name: &str) -> io::Result<String>;
    fn write_string(&self, path: &Path, name: &str, value: &str) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFiles;

impl Files for DiskFiles {
    fn read_string(&self, path: &Path, name: &str) -> io::Result<String> {
        fs::read_to_string(path.join(name))
    }

    fn write_string(&self, path: &Path, name: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(path)?;

        let target = path.join(name);
        let tmp = path.join(format!("{}.tmp", name));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(tmp, target)
    }
}

/// Process-local files. Contents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: Mutex<FxHashMap<PathBuf, String>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "memory files lock poisoned")
    }
}

impl Files for MemoryFiles {
    fn read_string(&self, path: &Path, name: &str) -> io::Result<String> {
        let files = self.files.lock().map_err(|_| Self::poisoned())?;
        files
            .get(&path.join(name))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }

    fn write_string(&self, path: &Path, name: &str, value: &str) -> io::Result<()> {
        let mut files = self.files.lock().map_err(|_| Self::poisoned())?;
        files.insert(path.join(name), value.to_string());
        Ok(())
    }
}
