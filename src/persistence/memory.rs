//! In-memory storage with fault injection for crash-safety tests

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Read, Write};
use std::rc::Rc;

use super::storage::Storage;

#[derive(Debug, Default)]
struct Inner {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    /// Remaining bytes before every write fails (None = unlimited)
    write_budget: Cell<Option<usize>>,
    unreadable: RefCell<HashSet<String>>,
}

/// Clones share the same files, so a test can keep a handle after moving one into the lamp
#[derive(Debug, Default, Clone)]
pub struct MemStorage {
    inner: Rc<Inner>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: &str, contents: &[u8]) {
        self.inner.files.borrow_mut().insert(path.to_string(), contents.to_vec());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.files.borrow().get(path).cloned()
    }

    pub fn get_json(&self, path: &str) -> Option<serde_json::Value> {
        self.get(path).and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    pub fn paths(&self) -> Vec<String> {
        self.inner.files.borrow().keys().cloned().collect()
    }

    /// Let `bytes` more bytes through, then fail every write
    pub fn fail_writes_after(&self, bytes: usize) {
        self.inner.write_budget.set(Some(bytes));
    }

    pub fn heal(&self) {
        self.inner.write_budget.set(None);
        self.inner.unreadable.borrow_mut().clear();
    }

    pub fn make_unreadable(&self, path: &str) {
        self.inner.unreadable.borrow_mut().insert(path.to_string());
    }
}

struct MemWriter {
    inner: Rc<Inner>,
    path: String,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let allowed = match self.inner.write_budget.get() {
            Some(0) => return Err(io::Error::new(io::ErrorKind::StorageFull, "injected write failure")),
            Some(budget) => {
                let allowed = budget.min(buf.len());
                self.inner.write_budget.set(Some(budget - allowed));
                allowed
            }
            None => buf.len(),
        };
        self.inner
            .files
            .borrow_mut()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(&buf[..allowed]);
        Ok(allowed)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Storage for MemStorage {
    fn exists(&self, path: &str) -> bool {
        self.inner.files.borrow().contains_key(path)
    }

    fn reader(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        if self.inner.unreadable.borrow().contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected read failure"));
        }
        let contents = self
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        Ok(Box::new(io::Cursor::new(contents)))
    }

    fn writer(&self, path: &str) -> io::Result<Box<dyn Write + '_>> {
        self.inner.files.borrow_mut().insert(path.to_string(), Vec::new());
        Ok(Box::new(MemWriter {
            inner: Rc::clone(&self.inner),
            path: path.to_string(),
        }))
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        self.inner
            .files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let mut files = self.inner.files.borrow_mut();
        let contents = files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.to_string()))?;
        files.insert(to.to_string(), contents);
        Ok(())
    }
}
