//! Local storage collaborator: scratch area + promotion into final storage.
//!
//! Promotion renames when possible (atomic on the same filesystem) and falls
//! back to copy+remove for cross-device moves.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::MdmConfig;

/// Scratch and final directories for job artifacts.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    scratch_dir: PathBuf,
    storage_dir: PathBuf,
}

impl LocalStorage {
    /// Create a storage handle, ensuring both directories exist.
    pub fn new(scratch_dir: PathBuf, storage_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&scratch_dir)
            .with_context(|| format!("create scratch dir {}", scratch_dir.display()))?;
        fs::create_dir_all(&storage_dir)
            .with_context(|| format!("create storage dir {}", storage_dir.display()))?;
        Ok(LocalStorage {
            scratch_dir,
            storage_dir,
        })
    }

    /// Resolve directories from config, defaulting to XDG cache/data homes.
    pub fn from_config(cfg: &MdmConfig) -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
        let scratch = cfg
            .scratch_dir
            .clone()
            .unwrap_or_else(|| xdg_dirs.get_cache_home().join("scratch"));
        let storage = cfg
            .storage_dir
            .clone()
            .unwrap_or_else(|| xdg_dirs.get_data_home().join("media"));
        Self::new(scratch, storage)
    }

    /// Path for an in-flight artifact. Caller guarantees name uniqueness.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.scratch_dir.join(name)
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Move a finished artifact into storage under `final_name` and return
    /// the permanent path.
    pub fn move_into_storage(&self, src: &Path, final_name: &str) -> Result<PathBuf> {
        let dest = self.storage_dir.join(final_name);
        if fs::rename(src, &dest).is_err() {
            // Rename fails across filesystems; copy then remove.
            fs::copy(src, &dest).with_context(|| {
                format!("copy {} to {}", src.display(), dest.display())
            })?;
            fs::remove_file(src)
                .with_context(|| format!("remove scratch file {}", src.display()))?;
        }
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_path_is_under_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(
            dir.path().join("scratch"),
            dir.path().join("media"),
        )
        .unwrap();
        let p = storage.scratch_path("clip-1234-v.mp4");
        assert!(p.starts_with(dir.path().join("scratch")));
    }

    #[test]
    fn move_into_storage_promotes_and_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            LocalStorage::new(dir.path().join("scratch"), dir.path().join("media")).unwrap();

        let src = storage.scratch_path("work.bin");
        fs::write(&src, b"payload").unwrap();

        let dest = storage.move_into_storage(&src, "final.bin").unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert_eq!(dest, dir.path().join("media").join("final.bin"));
    }

    #[test]
    fn move_missing_source_errors() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            LocalStorage::new(dir.path().join("scratch"), dir.path().join("media")).unwrap();
        let missing = storage.scratch_path("nope.bin");
        assert!(storage.move_into_storage(&missing, "out.bin").is_err());
    }
}
