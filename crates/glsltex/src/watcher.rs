use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::DocumentError;
use crate::host::DocumentStore;
use crate::template::DEFAULT_FRAGMENT;

/// What the watcher observed about its document on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub text: String,
    /// The text differs from the last text the session consumed.
    pub content_changed: bool,
    /// The backing file changed on disk and was reloaded this tick.
    pub externally_modified: bool,
}

/// Tracks one named shader document in the host's text storage.
#[derive(Debug, Clone)]
pub struct SourceWatcher {
    source_id: String,
}

impl SourceWatcher {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Looks the document up, creating or reloading it when needed, and
    /// compares its full text with `last_text`.
    pub fn poll<D: DocumentStore>(
        &self,
        documents: &mut D,
        last_text: &str,
    ) -> Result<SourceSnapshot, DocumentError> {
        if !documents.exists(&self.source_id) {
            self.materialize(documents)?;
        }

        let mut externally_modified = false;
        if documents.is_externally_backed(&self.source_id)
            && documents.is_stale_on_disk(&self.source_id)
        {
            info!(source = %self.source_id, "external shader file was modified; reloading");
            match documents.reload_from_disk(&self.source_id) {
                Ok(()) => externally_modified = true,
                Err(err) => {
                    warn!(source = %self.source_id, error = %err, "failed to reload shader file; keeping in-memory text");
                }
            }
        }

        let text = documents.read_all(&self.source_id)?;
        let content_changed = text != last_text;
        Ok(SourceSnapshot {
            text,
            content_changed,
            externally_modified,
        })
    }

    fn materialize<D: DocumentStore>(&self, documents: &mut D) -> Result<(), DocumentError> {
        info!(source = %self.source_id, "shader document not found; creating it");
        match documents.open_from_file(Path::new(&self.source_id)) {
            Ok(id) if id == self.source_id => {
                info!(source = %self.source_id, "opened external shader file");
                return Ok(());
            }
            Ok(id) => {
                warn!(source = %self.source_id, opened = %id, "external file was stored under another name; using built-in template");
            }
            Err(DocumentError::FileNotFound(path)) => {
                debug!(path = %path.display(), "no external shader file; using built-in template");
            }
            Err(err) => {
                warn!(source = %self.source_id, error = %err, "shader file could not be opened; using built-in template");
            }
        }

        documents.create_empty(&self.source_id)?;
        documents.write(&self.source_id, DEFAULT_FRAGMENT)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, SystemTime};

    use tempfile::TempDir;

    use super::*;
    use crate::documents::FsDocumentStore;

    #[test]
    fn creates_internal_default_when_file_is_missing() {
        let root = TempDir::new().unwrap();
        let mut documents = FsDocumentStore::new(root.path());
        let watcher = SourceWatcher::new("missing.frag");

        let snapshot = watcher.poll(&mut documents, "").unwrap();

        assert!(documents.exists("missing.frag"));
        assert!(!documents.is_externally_backed("missing.frag"));
        assert_eq!(snapshot.text, DEFAULT_FRAGMENT);
        assert!(snapshot.content_changed);
        assert!(!snapshot.externally_modified);
    }

    #[test]
    fn default_template_round_trips_through_store() {
        let root = TempDir::new().unwrap();
        let mut documents = FsDocumentStore::new(root.path());
        documents.create_empty("fresh.frag").unwrap();
        documents.write("fresh.frag", DEFAULT_FRAGMENT).unwrap();
        assert_eq!(documents.read_all("fresh.frag").unwrap(), DEFAULT_FRAGMENT);
    }

    #[test]
    fn imports_matching_external_file() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("plasma.frag"), "void main() {}\n").unwrap();
        let mut documents = FsDocumentStore::new(root.path());
        let watcher = SourceWatcher::new("plasma.frag");

        let snapshot = watcher.poll(&mut documents, "").unwrap();

        assert!(documents.is_externally_backed("plasma.frag"));
        assert_eq!(snapshot.text, "void main() {}\n");
        assert!(snapshot.content_changed);
    }

    #[test]
    fn unchanged_text_is_not_reported_as_changed() {
        let root = TempDir::new().unwrap();
        let mut documents = FsDocumentStore::new(root.path());
        let watcher = SourceWatcher::new("still.frag");

        let first = watcher.poll(&mut documents, "").unwrap();
        let second = watcher.poll(&mut documents, &first.text).unwrap();

        assert!(!second.content_changed);
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn in_memory_edits_are_caught_by_full_text_comparison() {
        let root = TempDir::new().unwrap();
        let mut documents = FsDocumentStore::new(root.path());
        let watcher = SourceWatcher::new("edit.frag");
        let first = watcher.poll(&mut documents, "").unwrap();

        documents
            .write("edit.frag", "void main() { gl_FragColor = vec4(1.0); }\n")
            .unwrap();
        let second = watcher.poll(&mut documents, &first.text).unwrap();

        assert!(second.content_changed);
        assert!(!second.externally_modified);
    }

    #[test]
    fn reloads_stale_external_file() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("live.frag");
        fs::write(&path, "// first\n").unwrap();
        let mut documents = FsDocumentStore::new(root.path());
        let watcher = SourceWatcher::new("live.frag");
        let first = watcher.poll(&mut documents, "").unwrap();

        fs::write(&path, "// second version\n").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();

        let second = watcher.poll(&mut documents, &first.text).unwrap();
        assert!(second.externally_modified);
        assert!(second.content_changed);
        assert_eq!(second.text, "// second version\n");
    }
}
