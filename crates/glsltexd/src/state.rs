use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glsltex::SessionRegistry;
use serde::{Deserialize, Serialize};

/// Everything glsltexd remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub registry: SessionRegistry,
}

impl AppState {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read state file at {}", path.display()))?;
            let state: Self = toml::from_str(&contents)
                .with_context(|| format!("failed to parse state file at {}", path.display()))?;
            Ok(state)
        } else {
            Ok(Self::default())
        }
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("state path has no parent: {}", path.display()))?;
        fs::create_dir_all(dir).with_context(|| {
            format!(
                "failed to prepare directory for state file at {}",
                dir.display()
            )
        })?;
        let serialized = toml::to_string_pretty(self)
            .with_context(|| "failed to serialize state file to TOML".to_string())?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write state file to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glsltex::SessionRecord;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_yields_empty_registry() {
        let dir = TempDir::new().unwrap();
        let state = AppState::load_or_default(&dir.path().join("state.toml")).unwrap();
        assert!(state.registry.is_empty());
    }

    #[test]
    fn persisted_registry_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state.toml");
        let mut state = AppState::default();
        state.registry.register(SessionRecord {
            source: "shaders/wave.frag".into(),
            width: 256,
            height: 128,
        });

        state.persist(&path).unwrap();
        let loaded = AppState::load_or_default(&path).unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.registry.get("wave").map(|r| r.width), Some(256));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "registry = 3").unwrap();
        assert!(AppState::load_or_default(&path).is_err());
    }
}
