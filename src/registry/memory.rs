//! In-process [`Registry`] backed by a mutex-guarded map.

use super::{incomplete_path_in, ModelField, ModelInfo, Registry, INCOMPLETE_PREFIX};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Registry keeping every [`ModelInfo`] in memory.
///
/// Each call locks the map, mutates or copies one record and releases the
/// lock. The derived `installed` / `is_incomplete` flags are recomputed from
/// the filesystem after every mutating call, outside the lock.
#[derive(Debug)]
pub struct MemoryRegistry {
    models: Mutex<BTreeMap<String, ModelInfo>>,
    local_models_path: PathBuf,
}

impl MemoryRegistry {
    /// Creates an empty registry installing into `local_models_path`.
    pub fn new(local_models_path: impl Into<PathBuf>) -> Self {
        Self {
            models: Mutex::new(BTreeMap::new()),
            local_models_path: local_models_path.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ModelInfo>> {
        self.models.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an empty record for `filename`.
    ///
    /// Returns `false`, leaving the existing record untouched, if the
    /// filename is already present.
    pub fn add_model(&self, filename: &str) -> bool {
        self.insert(ModelInfo::new(filename))
    }

    /// Adds a fully populated record.
    ///
    /// An empty `dirpath` defaults to the registry's install directory.
    pub fn insert(&self, mut info: ModelInfo) -> bool {
        if info.dirpath.as_os_str().is_empty() {
            info.dirpath = self.local_models_path.clone();
        }
        let filename = info.filename.clone();
        {
            let mut models = self.lock();
            if models.contains_key(&filename) {
                warn!("model list already contains {}", filename);
                return false;
            }
            models.insert(filename.clone(), info);
        }
        self.refresh_derived(&filename);
        true
    }

    /// Copies of every record, ordered by filename.
    pub fn list(&self) -> Vec<ModelInfo> {
        self.lock().values().cloned().collect()
    }

    /// Records whose installed file is present on disk.
    pub fn installed(&self) -> Vec<ModelInfo> {
        self.list().into_iter().filter(|m| m.installed).collect()
    }

    /// Registers every artifact already present in the install directory.
    ///
    /// Incomplete downloads and hidden files are skipped. Returns how many
    /// files were found.
    pub fn scan_directory(&self) -> io::Result<usize> {
        let mut found = 0;
        for entry in fs::read_dir(&self.local_models_path)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if name.starts_with(INCOMPLETE_PREFIX) || name.starts_with('.') {
                continue;
            }
            debug!("found installed model {}", name);
            self.add_model(&name);
            self.update_many(
                &name,
                vec![
                    ModelField::Dirpath(self.local_models_path.clone()),
                    ModelField::Filesize(Some(meta.len())),
                ],
            );
            found += 1;
        }
        Ok(found)
    }

    /// Re-derives `installed` and `is_incomplete` for one record.
    fn refresh_derived(&self, filename: &str) {
        let Some(install_path) = self.lock().get(filename).map(ModelInfo::install_path) else {
            return;
        };
        let installed = install_path.exists();
        let incomplete = self.incomplete_download_path(filename).exists();

        if let Some(info) = self.lock().get_mut(filename) {
            info.installed = installed;
            info.is_incomplete = incomplete;
        }
    }
}

impl Registry for MemoryRegistry {
    fn contains(&self, filename: &str) -> bool {
        self.lock().contains_key(filename)
    }

    fn model_info(&self, filename: &str) -> Option<ModelInfo> {
        self.lock().get(filename).cloned()
    }

    fn update_many(&self, filename: &str, fields: Vec<ModelField>) {
        {
            let mut models = self.lock();
            let Some(info) = models.get_mut(filename) else {
                warn!("cannot update as model list does not contain {}", filename);
                return;
            };
            for field in fields {
                info.apply(field);
            }
        }
        self.refresh_derived(filename);
    }

    fn local_models_path(&self) -> PathBuf {
        self.local_models_path.clone()
    }

    fn incomplete_download_path(&self, filename: &str) -> PathBuf {
        incomplete_path_in(Path::new(&self.local_models_path), filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_model_once() {
        let dir = tempfile::tempdir().unwrap();
        let registry = MemoryRegistry::new(dir.path());
        assert!(registry.add_model("m.bin"));
        assert!(!registry.add_model("m.bin"));
        assert!(registry.contains("m.bin"));
        assert_eq!(registry.model_info("m.bin").unwrap().dirpath, dir.path());
    }

    #[test]
    fn test_update_unknown_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let registry = MemoryRegistry::new(dir.path());
        registry.update_data("ghost.bin", ModelField::Downloading(true));
        assert!(registry.model_info("ghost.bin").is_none());
    }

    #[test]
    fn test_derived_flags_follow_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let registry = MemoryRegistry::new(dir.path());
        registry.add_model("m.bin");
        let info = registry.model_info("m.bin").unwrap();
        assert!(!info.installed);
        assert!(!info.is_incomplete);

        fs::write(dir.path().join("incomplete-m.bin"), b"part").unwrap();
        registry.update_data("m.bin", ModelField::Speed(String::new()));
        let info = registry.model_info("m.bin").unwrap();
        assert!(info.is_incomplete);
        assert!(!info.installed);

        fs::rename(dir.path().join("incomplete-m.bin"), dir.path().join("m.bin")).unwrap();
        registry.update_data("m.bin", ModelField::Downloading(false));
        let info = registry.model_info("m.bin").unwrap();
        assert!(info.installed);
        assert!(!info.is_incomplete);
    }

    #[test]
    fn test_update_many_is_applied_together() {
        let dir = tempfile::tempdir().unwrap();
        let registry = MemoryRegistry::new(dir.path());
        registry.add_model("m.bin");
        registry.update_many(
            "m.bin",
            vec![
                ModelField::BytesReceived(10),
                ModelField::BytesTotal(100),
                ModelField::Timestamp(1234),
            ],
        );
        let info = registry.model_info("m.bin").unwrap();
        assert_eq!((info.bytes_received, info.bytes_total, info.timestamp), (10, 100, 1234));
    }

    #[test]
    fn test_scan_directory_skips_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ggml-a.bin"), b"abc").unwrap();
        fs::write(dir.path().join("incomplete-ggml-b.bin"), b"ab").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let registry = MemoryRegistry::new(dir.path());
        assert_eq!(registry.scan_directory().unwrap(), 1);
        let info = registry.model_info("ggml-a.bin").unwrap();
        assert!(info.installed);
        assert_eq!(info.filesize, Some(3));
        assert!(!registry.contains("incomplete-ggml-b.bin"));
        assert_eq!(registry.installed().len(), 1);
    }
}
