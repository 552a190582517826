//! Storage tiers for the quota record.

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Registry key holding the quota record (under HKEY_CURRENT_USER).
pub const REGISTRY_KEY: &str = r"SOFTWARE\FileHashCalculator";
/// Registry value name of the quota record.
pub const REGISTRY_VALUE: &str = "VTQuotaData";

/// A place the serialized quota record can live.
pub trait QuotaBackend: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Read the stored record. `Ok(None)` means nothing has been stored yet.
    fn load(&mut self) -> Result<Option<String>>;

    /// Replace the stored record.
    fn save(&mut self, data: &str) -> Result<()>;
}

/// Windows registry tier.
#[derive(Debug, Default)]
pub struct RegistryBackend;

impl RegistryBackend {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(windows)]
impl QuotaBackend for RegistryBackend {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn load(&mut self) -> Result<Option<String>> {
        use winreg::enums::{HKEY_CURRENT_USER, KEY_READ};
        use winreg::RegKey;

        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let key = match hkcu.open_subkey_with_flags(REGISTRY_KEY, KEY_READ) {
            Ok(key) => key,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::storage(self.name(), e.to_string())),
        };

        match key.get_value::<String, _>(REGISTRY_VALUE) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(self.name(), e.to_string())),
        }
    }

    fn save(&mut self, data: &str) -> Result<()> {
        use winreg::enums::HKEY_CURRENT_USER;
        use winreg::RegKey;

        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let (key, _) = hkcu
            .create_subkey(REGISTRY_KEY)
            .map_err(|e| Error::storage(self.name(), e.to_string()))?;
        key.set_value(REGISTRY_VALUE, &data.to_string())
            .map_err(|e| Error::storage(self.name(), e.to_string()))
    }
}

#[cfg(not(windows))]
impl QuotaBackend for RegistryBackend {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn load(&mut self) -> Result<Option<String>> {
        Err(Error::NotSupported(
            "Registry storage is only available on Windows".to_string(),
        ))
    }

    fn save(&mut self, _data: &str) -> Result<()> {
        Err(Error::NotSupported(
            "Registry storage is only available on Windows".to_string(),
        ))
    }
}

/// JSON file tier.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QuotaBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&mut self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::file_read(&self.path, e)),
        }
    }

    fn save(&mut self, data: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::DirectoryAccess {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, data).map_err(|e| Error::file_write(&self.path, e))
    }
}

/// Process-lifetime tier. Never fails.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    data: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuotaBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&mut self) -> Result<Option<String>> {
        Ok(self.data.clone())
    }

    fn save(&mut self, data: &str) -> Result<()> {
        self.data = Some(data.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_backend_missing_is_none() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path().join("quota.json"));
        assert_eq!(backend.load().unwrap(), None);
    }

    #[test]
    fn test_file_backend_save_creates_parent() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path().join("nested/quota.json"));
        backend.save("{}").unwrap();
        assert_eq!(backend.load().unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_memory_backend() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.load().unwrap(), None);
        backend.save("x").unwrap();
        assert_eq!(backend.load().unwrap().as_deref(), Some("x"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_registry_unsupported_off_windows() {
        let mut backend = RegistryBackend::new();
        assert!(matches!(backend.load(), Err(Error::NotSupported(_))));
        assert!(backend.save("{}").is_err());
    }
}
