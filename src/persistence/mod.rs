//! Crash-safe JSON persistence with a primary/shadow file pair per domain
//!
//! The shadow is the working copy and the source of truth on a normal boot; the
//! primary is the last confirmed-good copy used to repair a bad shadow.
//!
//! ```text
//! NoPrimary -> HasPrimaryNoShadow -> HasBoth -> (Corrupt -> restart)
//! ```
//!
//! Copies go through a staging file that is renamed over the target, so a
//! primary is always either the previous complete version or the new one.

mod storage;

#[cfg(test)]
pub(crate) mod memory;

pub use storage::{DirStorage, Storage};

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::{self, Read, Write};
use tracing::{debug, error, info, warn};

use crate::constants::{capacity, files};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Settings,
    Effects,
}

impl Domain {
    pub fn primary(self) -> &'static str {
        match self {
            Domain::Settings => files::SETTINGS,
            Domain::Effects => files::EFFECTS,
        }
    }

    pub fn shadow(self) -> &'static str {
        match self {
            Domain::Settings => files::SETTINGS_SHADOW,
            Domain::Effects => files::EFFECTS_SHADOW,
        }
    }

    /// Largest serialized document this domain accepts
    pub fn capacity(self) -> usize {
        match self {
            Domain::Settings => capacity::SETTINGS,
            Domain::Effects => capacity::EFFECTS,
        }
    }

    /// Settings must be a non-empty object, effects a non-empty array
    fn is_empty_document(self, doc: &Value) -> bool {
        match self {
            Domain::Settings => doc.as_object().is_none_or(|obj| obj.is_empty()),
            Domain::Effects => doc.as_array().is_none_or(|arr| arr.is_empty()),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Settings => write!(f, "settings"),
            Domain::Effects => write!(f, "effects"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} parsed but holds no {domain}")]
    EmptyDocument { domain: Domain, path: String },

    #[error("{domain} document needs {needed} bytes, capacity is {capacity}")]
    SerializationOverflow {
        domain: Domain,
        needed: usize,
        capacity: usize,
    },

    #[error("failed to serialize {domain}: {source}")]
    Serialize {
        domain: Domain,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    fn io(path: &str, source: io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    /// Transient failures are retried on a later flush; the rest require a restart at load
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SerializationOverflow { .. } | Self::Serialize { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// No primary existed; the defaults were written to both files
    FirstBoot,
    /// Parsed from the shadow file
    Loaded(Value),
}

/// Primary/shadow persistence over a [`Storage`]
#[derive(Debug)]
pub struct Persistence<S> {
    storage: S,
}

impl<S: Storage> Persistence<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load a domain, creating it from `defaults` on first boot
    ///
    /// On any read, parse or emptiness failure the shadow is restored from the
    /// primary and the error is returned; the caller must restart rather than
    /// adopt anything from this load.
    pub fn load<T: Serialize>(&self, domain: Domain, defaults: &T) -> Result<LoadOutcome, PersistError> {
        let primary = domain.primary();
        let shadow = domain.shadow();

        let primary_exists = self.storage.exists(primary);
        info!(domain = %domain, path = %primary, exists = primary_exists, "Checking primary file");
        if !primary_exists {
            match self.commit(domain, defaults) {
                Ok(bytes) => info!(domain = %domain, bytes = bytes, "First boot, wrote defaults"),
                Err(e) => error!(domain = %domain, error = %e, "First boot, failed to write defaults"),
            }
            return Ok(LoadOutcome::FirstBoot);
        }

        if !self.storage.exists(shadow) {
            info!(domain = %domain, path = %shadow, "Shadow file missing, copying from primary");
            if let Err(e) = self.copy(primary, shadow) {
                warn!(domain = %domain, error = %e, "Failed to create shadow from primary");
            }
        }

        let doc = match self.read_document(domain) {
            Ok(doc) => doc,
            Err(e) => {
                error!(domain = %domain, error = %e, "Shadow file unusable, restoring from primary");
                self.restore_shadow(domain);
                return Err(e);
            }
        };

        if let Err(e) = self.copy(shadow, primary) {
            warn!(domain = %domain, error = %e, "Failed to promote shadow to primary after load");
        }

        Ok(LoadOutcome::Loaded(doc))
    }

    /// Serialize into the shadow, then promote it to primary
    /// Returns the document size in bytes
    pub fn commit<T: Serialize>(&self, domain: Domain, doc: &T) -> Result<usize, PersistError> {
        let bytes = serde_json::to_vec(doc).map_err(|source| PersistError::Serialize { domain, source })?;
        if bytes.len() > domain.capacity() {
            return Err(PersistError::SerializationOverflow {
                domain,
                needed: bytes.len(),
                capacity: domain.capacity(),
            });
        }

        let shadow = domain.shadow();
        {
            let mut writer = self.storage.writer(shadow).map_err(|e| PersistError::io(shadow, e))?;
            writer
                .write_all(&bytes)
                .and_then(|()| writer.flush())
                .map_err(|e| PersistError::io(shadow, e))?;
        }

        self.copy(shadow, domain.primary())?;
        debug!(domain = %domain, bytes = bytes.len(), "Committed document");
        Ok(bytes.len())
    }

    fn read_document(&self, domain: Domain) -> Result<Value, PersistError> {
        let shadow = domain.shadow();
        let mut contents = Vec::new();
        self.storage
            .reader(shadow)
            .and_then(|mut reader| reader.read_to_end(&mut contents))
            .map_err(|e| PersistError::io(shadow, e))?;
        debug!(domain = %domain, bytes = contents.len(), "Read shadow file");

        let doc: Value = serde_json::from_slice(&contents).map_err(|source| PersistError::Parse {
            path: shadow.to_string(),
            source,
        })?;
        if domain.is_empty_document(&doc) {
            return Err(PersistError::EmptyDocument {
                domain,
                path: shadow.to_string(),
            });
        }
        Ok(doc)
    }

    fn restore_shadow(&self, domain: Domain) {
        if let Err(e) = self.copy(domain.primary(), domain.shadow()) {
            error!(domain = %domain, error = %e, "Failed to restore shadow from primary");
        }
    }

    /// Byte-for-byte copy through `<to>.tmp`; the staging file never outlives a failure
    fn copy(&self, from: &str, to: &str) -> Result<(), PersistError> {
        debug!(from = %from, to = %to, "Copying file");
        let staging = format!("{to}{}", files::STAGING_SUFFIX);

        let streamed = self.stream(from, &staging);
        let result = streamed.and_then(|()| self.storage.rename(&staging, to).map_err(|e| PersistError::io(to, e)));

        if result.is_err() && self.storage.exists(&staging) {
            if let Err(e) = self.storage.remove(&staging) {
                warn!(path = %staging, error = %e, "Failed to remove partial copy");
            }
        }
        result
    }

    fn stream(&self, from: &str, to: &str) -> Result<(), PersistError> {
        let mut reader = self.storage.reader(from).map_err(|e| PersistError::io(from, e))?;
        let mut writer = self.storage.writer(to).map_err(|e| PersistError::io(to, e))?;

        let mut block = [0u8; files::COPY_BLOCK_SIZE];
        loop {
            let n = match reader.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PersistError::io(from, e)),
            };
            writer.write_all(&block[..n]).map_err(|e| PersistError::io(to, e))?;
        }
        writer.flush().map_err(|e| PersistError::io(to, e))
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemStorage;
    use super::*;
    use serde_json::json;

    fn persistence() -> (Persistence<MemStorage>, MemStorage) {
        let storage = MemStorage::new();
        (Persistence::new(storage.clone()), storage)
    }

    fn no_staging_files(storage: &MemStorage) -> bool {
        storage.paths().iter().all(|p| !p.ends_with(files::STAGING_SUFFIX))
    }

    #[test]
    fn test_first_boot_writes_defaults_to_both_files() {
        let (persistence, storage) = persistence();
        let defaults = json!({ "working": false, "activeEffect": 0 });

        let outcome = persistence.load(Domain::Settings, &defaults).unwrap();

        assert_eq!(outcome, LoadOutcome::FirstBoot);
        assert_eq!(storage.get_json(files::SETTINGS), Some(defaults.clone()));
        assert_eq!(storage.get_json(files::SETTINGS_SHADOW), Some(defaults));
        assert!(no_staging_files(&storage));
    }

    #[test]
    fn test_primary_only_creates_shadow() {
        let (persistence, storage) = persistence();
        storage.put(files::SETTINGS, br#"{"working":true}"#);

        let outcome = persistence.load(Domain::Settings, &json!({})).unwrap();

        assert_eq!(outcome, LoadOutcome::Loaded(json!({ "working": true })));
        assert_eq!(storage.get(files::SETTINGS_SHADOW), storage.get(files::SETTINGS));
    }

    #[test]
    fn test_shadow_is_source_of_truth_and_gets_promoted() {
        let (persistence, storage) = persistence();
        storage.put(files::EFFECTS, br#"[{"i":"Fire","b":1}]"#);
        storage.put(files::EFFECTS_SHADOW, br#"[{"i":"Fire","b":2}]"#);

        let outcome = persistence.load(Domain::Effects, &json!([])).unwrap();

        assert_eq!(outcome, LoadOutcome::Loaded(json!([{ "i": "Fire", "b": 2 }])));
        assert_eq!(storage.get(files::EFFECTS), Some(br#"[{"i":"Fire","b":2}]"#.to_vec()));
    }

    #[test]
    fn test_unparsable_shadow_is_restored_from_primary() {
        let (persistence, storage) = persistence();
        storage.put(files::SETTINGS, br#"{"working":true}"#);
        storage.put(files::SETTINGS_SHADOW, br#"{"working":tr"#);

        let err = persistence.load(Domain::Settings, &json!({})).unwrap_err();

        assert!(matches!(err, PersistError::Parse { .. }));
        assert!(!err.is_transient());
        assert_eq!(storage.get(files::SETTINGS_SHADOW), storage.get(files::SETTINGS));
    }

    #[test]
    fn test_empty_documents_are_corrupt() {
        let (persistence, storage) = persistence();
        storage.put(files::SETTINGS, br#"{"working":true}"#);
        storage.put(files::SETTINGS_SHADOW, b"{}");
        storage.put(files::EFFECTS, br#"[{"i":"Fire"}]"#);
        storage.put(files::EFFECTS_SHADOW, b"[]");

        let settings = persistence.load(Domain::Settings, &json!({})).unwrap_err();
        let effects = persistence.load(Domain::Effects, &json!([])).unwrap_err();

        assert!(matches!(settings, PersistError::EmptyDocument { domain: Domain::Settings, .. }));
        assert!(matches!(effects, PersistError::EmptyDocument { domain: Domain::Effects, .. }));
        assert_eq!(storage.get_json(files::SETTINGS_SHADOW), Some(json!({ "working": true })));
        assert_eq!(storage.get_json(files::EFFECTS_SHADOW), Some(json!([{ "i": "Fire" }])));
    }

    #[test]
    fn test_wrong_top_level_type_is_corrupt() {
        let (persistence, storage) = persistence();
        storage.put(files::SETTINGS, br#"{"working":true}"#);
        storage.put(files::SETTINGS_SHADOW, b"[1,2,3]");

        let err = persistence.load(Domain::Settings, &json!({})).unwrap_err();
        assert!(matches!(err, PersistError::EmptyDocument { .. }));
    }

    #[test]
    fn test_unreadable_shadow_is_io_error() {
        let (persistence, storage) = persistence();
        storage.put(files::SETTINGS, br#"{"working":true}"#);
        storage.put(files::SETTINGS_SHADOW, br#"{"working":false}"#);
        storage.make_unreadable(files::SETTINGS_SHADOW);

        let err = persistence.load(Domain::Settings, &json!({})).unwrap_err();
        assert!(matches!(err, PersistError::Io { .. }));
    }

    #[test]
    fn test_commit_then_load_roundtrip() {
        let (persistence, _storage) = persistence();
        let doc = json!({ "matrix": { "width": 32 }, "working": true });

        persistence.commit(Domain::Settings, &doc).unwrap();

        assert_eq!(persistence.load(Domain::Settings, &json!({})).unwrap(), LoadOutcome::Loaded(doc));
    }

    #[test]
    fn test_overflow_touches_nothing() {
        let (persistence, storage) = persistence();
        storage.put(files::SETTINGS, br#"{"working":true}"#);
        storage.put(files::SETTINGS_SHADOW, br#"{"working":true}"#);
        let huge = json!({ "login": "x".repeat(capacity::SETTINGS) });

        let err = persistence.commit(Domain::Settings, &huge).unwrap_err();

        assert!(matches!(err, PersistError::SerializationOverflow { domain: Domain::Settings, .. }));
        assert!(err.is_transient());
        assert_eq!(storage.get(files::SETTINGS_SHADOW), Some(br#"{"working":true}"#.to_vec()));
        assert_eq!(storage.get(files::SETTINGS), Some(br#"{"working":true}"#.to_vec()));
    }

    #[test]
    fn test_interrupted_copy_keeps_old_primary() {
        let (persistence, storage) = persistence();
        let old = json!({ "working": false });
        persistence.commit(Domain::Settings, &old).unwrap();

        let new = json!({ "working": true, "login": "x".repeat(200) });
        let new_len = serde_json::to_vec(&new).unwrap().len();
        // Shadow write succeeds, copy to primary dies after one block
        storage.fail_writes_after(new_len + files::COPY_BLOCK_SIZE);

        let err = persistence.commit(Domain::Settings, &new).unwrap_err();

        assert!(matches!(err, PersistError::Io { .. }));
        assert_eq!(storage.get_json(files::SETTINGS), Some(old));
        assert_eq!(storage.get_json(files::SETTINGS_SHADOW), Some(new));
        assert!(no_staging_files(&storage));
    }

    #[test]
    fn test_dir_storage_first_boot_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(DirStorage::open(dir.path()).unwrap());
        let defaults = json!([{ "i": "Fire", "n": "Fire" }]);

        assert_eq!(persistence.load(Domain::Effects, &defaults).unwrap(), LoadOutcome::FirstBoot);
        assert!(dir.path().join("effects.json").is_file());
        assert!(dir.path().join("effects.json.save").is_file());
        assert!(!dir.path().join("effects.json.tmp").exists());

        assert_eq!(persistence.load(Domain::Effects, &json!([])).unwrap(), LoadOutcome::Loaded(defaults));
    }
}
