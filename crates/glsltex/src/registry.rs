use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::session::SessionParams;
use crate::sink::image_key;

/// What is needed to re-invoke a session later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

impl SessionRecord {
    pub fn image_key(&self) -> String {
        image_key(&self.source)
    }

    /// Rewrites a relative `source` as a path under `root`, so the record
    /// still finds its file when resumed from another working directory.
    pub fn anchored_at(mut self, root: &Path) -> Self {
        let source = Path::new(&self.source);
        if source.is_relative() {
            self.source = root.join(source).to_string_lossy().into_owned();
        }
        self
    }

    pub fn params(&self) -> SessionParams {
        SessionParams {
            source: self.source.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

/// Known sessions keyed by the image they publish.
///
/// A newer session writing the same image replaces the older record, so
/// resuming re-creates each image exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRegistry {
    #[serde(default)]
    sessions: BTreeMap<String, SessionRecord>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `record`, returning the record it replaced.
    pub fn register(&mut self, record: SessionRecord) -> Option<SessionRecord> {
        self.sessions.insert(record.image_key(), record)
    }

    pub fn forget(&mut self, key: &str) -> Option<SessionRecord> {
        self.sessions.remove(key)
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn get(&self, key: &str) -> Option<&SessionRecord> {
        self.sessions.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Records in image-key order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &SessionRecord)> {
        self.sessions.iter().map(|(key, record)| (key.as_str(), record))
    }

    /// Parameters to re-invoke every known session at its recorded size.
    pub fn resume_params(&self) -> Vec<SessionParams> {
        self.sessions.values().map(SessionRecord::params).collect()
    }
}
