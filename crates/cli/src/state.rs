//! The process-level state file: where the reopen handle lives between runs.

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Everything needed to reopen the filesystem: the authenticated index
/// root, the ratchet-store root, and the root node's key and private name.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExternalState {
    pub index_root: Option<String>,
    pub ratchet_root: Option<String>,
    pub root_key: Option<String>,
    pub root_name: Option<String>,
}

/// The data directory: `$VEILFS_PATH`, or `~/.veilfs`.
pub fn data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("VEILFS_PATH") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".veilfs"))
}

impl ExternalState {
    pub fn path(dir: &std::path::Path) -> PathBuf {
        dir.join("state.json")
    }

    pub fn load_or_create(dir: &std::path::Path) -> anyhow::Result<ExternalState> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating state directory {}", dir.display()))?;
        let path = Self::path(dir);
        match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .with_context(|| format!("parsing state file {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(ExternalState::default())
            }
            Err(err) => Err(err).with_context(|| format!("reading state file {}", path.display())),
        }
    }

    pub fn write(&self, dir: &std::path::Path) -> anyhow::Result<()> {
        let path = Self::path(dir);
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(&path, data)
            .with_context(|| format!("writing state file {}", path.display()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_missing_is_default() {
        let temp = tempfile::TempDir::new().unwrap();
        let state = ExternalState::load_or_create(temp.path()).unwrap();
        assert!(state.index_root.is_none());
        assert!(state.root_key.is_none());
    }

    #[test]
    fn test_write_and_reload() {
        let temp = tempfile::TempDir::new().unwrap();
        let state = ExternalState {
            index_root: Some("bafy-root".to_string()),
            ratchet_root: Some("bafy-ratchets".to_string()),
            root_key: Some("key".to_string()),
            root_name: Some("name".to_string()),
        };
        state.write(temp.path()).unwrap();

        let reloaded = ExternalState::load_or_create(temp.path()).unwrap();
        assert_eq!(reloaded.index_root.as_deref(), Some("bafy-root"));
        assert_eq!(reloaded.root_name.as_deref(), Some("name"));
    }
}
