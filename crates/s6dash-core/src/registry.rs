//! Service discovery.
//!
//! A service is any subdirectory of the scan directory holding an executable
//! `run` file. The list is read once at startup and never changes afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{DashError, Result};
use crate::types::ServiceRef;

/// Owner-execute permission bit.
const OWNER_EXEC: u32 = 0o100;

/// The ordered, read-only set of services found under a scan directory.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    root: PathBuf,
    services: Arc<[ServiceRef]>,
}

impl ServiceRegistry {
    /// Scan `root` and build the registry.
    pub fn scan(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let services = list_services(&root)?;
        info!(root = %root.display(), count = services.len(), "services discovered");
        Ok(Self {
            root,
            services: services.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared handle to the service list.
    pub fn services(&self) -> Arc<[ServiceRef]> {
        Arc::clone(&self.services)
    }

    pub fn get(&self, index: usize) -> Option<&ServiceRef> {
        self.services.get(index)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// List the services under `dir`, sorted by path.
///
/// Failing to read `dir` itself is an error. Entries that cannot be stat'ed
/// are logged and skipped.
pub fn list_services(dir: &Path) -> Result<Vec<ServiceRef>> {
    let entries = std::fs::read_dir(dir).map_err(|e| DashError::Discovery {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut services = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "error reading directory entry");
                continue;
            }
        };
        let path = entry.path();

        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "error statting entry");
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }

        if has_executable_run(&path) {
            services.push(ServiceRef::new(path));
        } else {
            debug!(path = %path.display(), "skipping directory without executable run");
        }
    }

    services.sort();
    Ok(services)
}

fn has_executable_run(service_dir: &Path) -> bool {
    match std::fs::metadata(service_dir.join("run")) {
        Ok(m) => is_owner_executable(&m),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn is_owner_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & OWNER_EXEC != 0
}

#[cfg(not(unix))]
fn is_owner_executable(metadata: &std::fs::Metadata) -> bool {
    let _ = OWNER_EXEC;
    metadata.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn make_service(root: &Path, name: &str, mode: Option<u32>) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        if let Some(mode) = mode {
            let run = dir.join("run");
            fs::write(&run, "#!/bin/sh\nexec sleep 1000\n").unwrap();
            fs::set_permissions(&run, fs::Permissions::from_mode(mode)).unwrap();
        }
        dir
    }

    #[test]
    fn test_only_executable_run_qualifies() {
        let temp = TempDir::new().unwrap();
        make_service(temp.path(), "web", Some(0o755));
        make_service(temp.path(), "broken", Some(0o644));
        make_service(temp.path(), "api", Some(0o700));

        let services = list_services(temp.path()).unwrap();
        let names: Vec<_> = services.iter().map(ServiceRef::name).collect();
        assert_eq!(names, vec!["api", "web"]);
        assert_eq!(services[0].dir(), temp.path().join("api"));
    }

    #[test]
    fn test_ignores_files_and_dirs_without_run() {
        let temp = TempDir::new().unwrap();
        make_service(temp.path(), "empty", None);
        fs::write(temp.path().join("README"), "not a service").unwrap();
        make_service(temp.path(), "db", Some(0o755));

        let services = list_services(temp.path()).unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name(), "db");
    }

    #[test]
    fn test_dangling_symlink_is_skipped() {
        let temp = TempDir::new().unwrap();
        make_service(temp.path(), "ok", Some(0o755));
        std::os::unix::fs::symlink(temp.path().join("missing"), temp.path().join("ghost")).unwrap();

        let services = list_services(temp.path()).unwrap();
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let err = list_services(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, DashError::Discovery { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_registry_accessors() {
        let temp = TempDir::new().unwrap();
        make_service(temp.path(), "b", Some(0o755));
        make_service(temp.path(), "a", Some(0o755));

        let registry = ServiceRegistry::scan(temp.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert_eq!(registry.get(0).unwrap().name(), "a");
        assert!(registry.get(2).is_none());
        assert_eq!(registry.services().len(), 2);
        assert_eq!(registry.root(), temp.path());
    }
}
