use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::error::DocumentError;
use crate::host::DocumentStore;

/// Document store backed by the local file system.
///
/// Documents live in memory. Those opened from a file remember the file's
/// modification time and length so a later change on disk is reported as
/// stale. Relative paths resolve against `root`.
#[derive(Debug)]
pub struct FsDocumentStore {
    root: PathBuf,
    documents: HashMap<String, Document>,
}

#[derive(Debug)]
struct Document {
    text: String,
    backing: Option<FileBacking>,
}

#[derive(Debug)]
struct FileBacking {
    path: PathBuf,
    fingerprint: Option<Fingerprint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            documents: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location `path` refers to.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// File backing the document, if any.
    pub fn backing_path(&self, id: &str) -> Option<&Path> {
        self.documents
            .get(id)
            .and_then(|document| document.backing.as_ref())
            .map(|backing| backing.path.as_path())
    }

    fn document(&self, id: &str) -> Result<&Document, DocumentError> {
        self.documents
            .get(id)
            .ok_or_else(|| DocumentError::Missing(id.to_string()))
    }
}

fn read_source(path: &Path) -> Result<String, DocumentError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            DocumentError::FileNotFound(path.to_path_buf())
        } else {
            DocumentError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

impl DocumentStore for FsDocumentStore {
    fn exists(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    fn open_from_file(&mut self, path: &Path) -> Result<String, DocumentError> {
        let resolved = self.resolve(path);
        let text = read_source(&resolved)?;
        let id = path.to_string_lossy().into_owned();
        debug!(id = %id, path = %resolved.display(), bytes = text.len(), "opened shader file");
        self.documents.insert(
            id.clone(),
            Document {
                text,
                backing: Some(FileBacking {
                    fingerprint: Fingerprint::of(&resolved),
                    path: resolved,
                }),
            },
        );
        Ok(id)
    }

    fn create_empty(&mut self, id: &str) -> Result<(), DocumentError> {
        self.documents.insert(
            id.to_string(),
            Document {
                text: String::new(),
                backing: None,
            },
        );
        Ok(())
    }

    fn write(&mut self, id: &str, text: &str) -> Result<(), DocumentError> {
        let document = self
            .documents
            .get_mut(id)
            .ok_or_else(|| DocumentError::Missing(id.to_string()))?;
        document.text.clear();
        document.text.push_str(text);
        Ok(())
    }

    fn read_all(&self, id: &str) -> Result<String, DocumentError> {
        self.document(id).map(|document| document.text.clone())
    }

    fn is_externally_backed(&self, id: &str) -> bool {
        self.backing_path(id).is_some()
    }

    fn is_stale_on_disk(&self, id: &str) -> bool {
        let Some(backing) = self
            .documents
            .get(id)
            .and_then(|document| document.backing.as_ref())
        else {
            return false;
        };
        match Fingerprint::of(&backing.path) {
            Some(current) => backing.fingerprint != Some(current),
            // A vanished file keeps the in-memory text authoritative.
            None => false,
        }
    }

    fn reload_from_disk(&mut self, id: &str) -> Result<(), DocumentError> {
        let document = self
            .documents
            .get_mut(id)
            .ok_or_else(|| DocumentError::Missing(id.to_string()))?;
        let backing = document
            .backing
            .as_mut()
            .ok_or_else(|| DocumentError::NotExternal(id.to_string()))?;
        document.text = read_source(&backing.path)?;
        backing.fingerprint = Fingerprint::of(&backing.path);
        debug!(id = %id, path = %backing.path.display(), "reloaded shader file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_reports_not_found() {
        let root = TempDir::new().unwrap();
        let mut store = FsDocumentStore::new(root.path());
        let err = store.open_from_file(Path::new("nope.frag")).unwrap_err();
        assert!(matches!(err, DocumentError::FileNotFound(_)));
        assert!(!store.exists("nope.frag"));
    }

    #[test]
    fn internal_documents_are_never_stale() {
        let root = TempDir::new().unwrap();
        let mut store = FsDocumentStore::new(root.path());
        store.create_empty("memory.frag").unwrap();
        assert!(!store.is_externally_backed("memory.frag"));
        assert!(!store.is_stale_on_disk("memory.frag"));
        assert!(matches!(
            store.reload_from_disk("memory.frag"),
            Err(DocumentError::NotExternal(_))
        ));
    }

    #[test]
    fn detects_and_clears_staleness() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("wave.frag");
        fs::write(&path, "a").unwrap();
        let mut store = FsDocumentStore::new(root.path());
        let id = store.open_from_file(Path::new("wave.frag")).unwrap();
        assert_eq!(id, "wave.frag");
        assert!(!store.is_stale_on_disk(&id));

        fs::write(&path, "bb").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();
        assert!(store.is_stale_on_disk(&id));

        store.reload_from_disk(&id).unwrap();
        assert!(!store.is_stale_on_disk(&id));
        assert_eq!(store.read_all(&id).unwrap(), "bb");
    }

    #[test]
    fn deleted_backing_file_keeps_memory_text() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("gone.frag");
        fs::write(&path, "kept").unwrap();
        let mut store = FsDocumentStore::new(root.path());
        let id = store.open_from_file(Path::new("gone.frag")).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(!store.is_stale_on_disk(&id));
        assert_eq!(store.read_all(&id).unwrap(), "kept");
    }
}
