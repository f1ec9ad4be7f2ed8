//! Flat flash-style filesystem seam
//!
//! Paths are absolute flash names (`/settings.json`). The host implementation maps
//! them under a data directory; tests use an in-memory implementation with fault
//! injection.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

pub trait Storage {
    fn exists(&self, path: &str) -> bool;

    fn reader(&self, path: &str) -> io::Result<Box<dyn Read + '_>>;

    /// Create or truncate `path` for writing
    fn writer(&self, path: &str) -> io::Result<Box<dyn Write + '_>>;

    fn remove(&self, path: &str) -> io::Result<()>;

    /// Replace `to` with `from` in one step
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
}

/// Storage rooted at a host directory
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Create the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for DirStorage {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn reader(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(fs::File::open(self.resolve(path))?))
    }

    fn writer(&self, path: &str) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(SyncedFile(fs::File::create(self.resolve(path))?)))
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let target = self.resolve(to);
        fs::rename(self.resolve(from), &target)?;
        sync_parent(&target)
    }
}

/// File whose `flush` also syncs data and metadata to the device
struct SyncedFile(fs::File);

impl Write for SyncedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.sync_all()
    }
}

/// Persist the directory entry created by a rename
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) => fs::File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
