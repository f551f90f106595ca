use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::paths::AppPaths;
use crate::state::AppState;

pub fn bootstrap_filesystem(paths: &AppPaths) -> Result<AppState> {
    for dir in [paths.config_dir(), paths.data_dir()] {
        ensure_directory(dir)?;
    }

    let state_path = paths.state_file();
    let state_exists = state_path.exists();
    let state = AppState::load_or_default(&state_path)?;
    if state_exists {
        debug!(path = %state_path.display(), sessions = state.registry.len(), "loaded glsltex state file");
    } else {
        state.persist(&state_path)?;
        info!(path = %state_path.display(), "initialised glsltex state file");
    }

    Ok(state)
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if path.is_dir() {
            debug!(path = %path.display(), "reusing existing directory");
            Ok(())
        } else {
            bail!("filesystem entry at {} is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path).with_context(|| {
            format!("failed to create glsltex directory at {}", path.display())
        })?;
        info!(path = %path.display(), "created glsltex directory");
        Ok(())
    }
}
