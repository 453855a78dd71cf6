//! Manifest Loader
//!
//! Loads handler manifests from:
//! - JSON strings
//! - JSON files
//! - Directories (every `*.json` file, in file-name order)

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Result};

use super::definition::{HandlerManifest, MANIFEST_VERSION};

/// A loaded manifest with its source information
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    /// The parsed manifest
    pub manifest: HandlerManifest,

    /// Source path (if loaded from file)
    pub source_path: Option<PathBuf>,
}

/// Loads manifests and applies them to a [`Dispatcher`] in load order
#[derive(Debug)]
pub struct ManifestLoader {
    manifests: Vec<LoadedManifest>,

    /// Whether to validate on load
    validate_on_load: bool,
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestLoader {
    /// Create an empty loader that validates on load
    pub fn new() -> Self {
        Self {
            manifests: vec![],
            validate_on_load: true,
        }
    }

    /// Disable validation on load
    pub fn skip_validation(mut self) -> Self {
        self.validate_on_load = false;
        self
    }

    /// Load a manifest from a JSON string
    pub fn load_from_json(&mut self, json: &str) -> Result<String> {
        let manifest: HandlerManifest =
            serde_json::from_str(json).map_err(|e| DispatchError::InvalidManifest {
                reason: e.to_string(),
            })?;

        self.insert(manifest, None)
    }

    /// Load a manifest from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| DispatchError::ManifestLoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let manifest: HandlerManifest =
            serde_json::from_str(&content).map_err(|e| DispatchError::InvalidManifest {
                reason: format!("{}: {}", path.display(), e),
            })?;

        self.insert(manifest, Some(path.to_path_buf()))
    }

    /// Load every `*.json` file in `dir`.
    ///
    /// Files that fail to load are skipped with a warning; the IDs of the
    /// manifests that loaded are returned.
    pub fn load_from_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<Vec<String>> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| DispatchError::ManifestLoadError {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut loaded = vec![];
        for path in paths {
            match self.load_from_file(&path) {
                Ok(manifest_id) => loaded.push(manifest_id),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping manifest");
                }
            }
        }

        Ok(loaded)
    }

    /// Load a file or a directory, whichever `path` is
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<String>> {
        let path = path.as_ref();
        if path.is_dir() {
            self.load_from_directory(path)
        } else {
            self.load_from_file(path).map(|id| vec![id])
        }
    }

    /// Look up a loaded manifest by ID
    pub fn get(&self, manifest_id: &str) -> Option<&LoadedManifest> {
        self.manifests
            .iter()
            .find(|loaded| loaded.manifest.manifest_id == manifest_id)
    }

    /// Loaded manifests in load order
    pub fn manifests(&self) -> &[LoadedManifest] {
        &self.manifests
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Apply every loaded manifest in load order; returns the handler count.
    ///
    /// Every manifest is built before any is registered, so one bad manifest
    /// leaves the dispatcher untouched.
    pub fn apply(&self, dispatcher: &Dispatcher) -> Result<usize> {
        let built = self
            .manifests
            .iter()
            .map(|loaded| loaded.manifest.build())
            .collect::<Result<Vec<_>>>()?;

        let mut total = 0;
        for handlers in built {
            total += handlers.register(dispatcher)?;
        }

        info!(
            manifests = self.manifests.len(),
            handlers = total,
            "Applied handler manifests"
        );
        Ok(total)
    }

    fn insert(
        &mut self,
        manifest: HandlerManifest,
        source_path: Option<PathBuf>,
    ) -> Result<String> {
        if self.validate_on_load {
            if manifest.manifest_version != MANIFEST_VERSION {
                return Err(DispatchError::ManifestVersionMismatch {
                    expected: MANIFEST_VERSION.to_string(),
                    actual: manifest.manifest_version,
                });
            }

            manifest
                .validate()
                .map_err(|errors| DispatchError::InvalidManifest {
                    reason: errors.join("; "),
                })?;
        }

        let manifest_id = manifest.manifest_id.clone();
        if self.get(&manifest_id).is_some() {
            return Err(DispatchError::ManifestAlreadyLoaded { manifest_id });
        }

        info!(
            manifest_id = %manifest_id,
            resources = manifest.resources.len(),
            providers = manifest.providers.len(),
            priorities = manifest.priorities.len(),
            "Loaded handler manifest"
        );

        self.manifests.push(LoadedManifest {
            manifest,
            source_path,
        });
        Ok(manifest_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeContext;
    use crate::handler::Handler;

    const FILES: &str = r#"{
        "manifest_version": "1.0",
        "manifest_id": "core.files",
        "providers": [
            { "key": "file", "implementation": "PosixFile", "filters": { "os": "!windows" } }
        ]
    }"#;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("dispatch-core-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_from_json() {
        let mut loader = ManifestLoader::new();
        let id = loader.load_from_json(FILES).unwrap();

        assert_eq!(id, "core.files");
        assert_eq!(loader.len(), 1);
        assert!(loader.get("core.files").unwrap().source_path.is_none());
    }

    #[test]
    fn test_duplicate_manifest_rejected() {
        let mut loader = ManifestLoader::new();
        loader.load_from_json(FILES).unwrap();

        let err = loader.load_from_json(FILES).unwrap_err();
        assert_eq!(err.error_code(), "MANIFEST_ALREADY_LOADED");
    }

    #[test]
    fn test_version_mismatch() {
        let mut loader = ManifestLoader::new();
        let err = loader
            .load_from_json(r#"{"manifest_version": "0.9", "manifest_id": "old"}"#)
            .unwrap_err();
        assert_eq!(err.error_code(), "MANIFEST_VERSION_MISMATCH");

        let mut lenient = ManifestLoader::new().skip_validation();
        assert!(lenient
            .load_from_json(r#"{"manifest_version": "0.9", "manifest_id": "old"}"#)
            .is_ok());
    }

    #[test]
    fn test_invalid_filter_rejected_on_load() {
        let mut loader = ManifestLoader::new();
        let err = loader
            .load_from_json(
                r#"{"manifest_version": "1.0", "manifest_id": "bad",
                    "providers": [{"key": "file", "implementation": "F",
                                   "filters": {"platform_version": "newest"}}]}"#,
            )
            .unwrap_err();

        assert_eq!(err.error_code(), "INVALID_MANIFEST");
        assert!(err.to_string().contains("newest"));
        assert!(loader.is_empty());
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut loader = ManifestLoader::new().skip_validation();
        loader
            .load_from_json(
                r#"{"manifest_version": "1.0", "manifest_id": "good",
                    "resources": [{"key": "file", "implementation": "File"}]}"#,
            )
            .unwrap();
        loader
            .load_from_json(
                r#"{"manifest_version": "1.0", "manifest_id": "bad",
                    "resources": [{"key": "link", "implementation": "Link",
                                   "filters": {"os": "!"}}]}"#,
            )
            .unwrap();

        let dispatcher = Dispatcher::new();
        let err = loader.apply(&dispatcher).unwrap_err();

        assert_eq!(err.error_code(), "INVALID_FILTER");
        assert!(dispatcher.resources().is_empty());
        assert!(!dispatcher.resources().contains_key("file"));
    }

    #[test]
    fn test_apply_to_locked_dispatcher_registers_nothing() {
        let mut loader = ManifestLoader::new();
        loader.load_from_json(FILES).unwrap();

        let dispatcher = Dispatcher::new();
        dispatcher.lock();

        let err = loader.apply(&dispatcher).unwrap_err();
        assert_eq!(err.error_code(), "REGISTRY_LOCKED");
        assert!(dispatcher.providers().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let mut loader = ManifestLoader::new();
        let err = loader.load_from_file("/nonexistent/handlers.json").unwrap_err();
        assert_eq!(err.error_code(), "MANIFEST_LOAD_ERROR");
    }

    #[test]
    fn test_directory_skips_bad_files() {
        let dir = scratch_dir("loader");
        fs::write(dir.join("10-files.json"), FILES).unwrap();
        fs::write(dir.join("20-broken.json"), "{ not json").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut loader = ManifestLoader::new();
        let loaded = loader.load_path(&dir).unwrap();
        assert_eq!(loaded, ["core.files"]);

        let dispatcher = Dispatcher::new();
        assert_eq!(loader.apply(&dispatcher).unwrap(), 1);

        let subject = "file".to_string();
        let chosen = dispatcher
            .resolve_provider("file", &NodeContext::new().with("os", "linux"), &subject, "create")
            .unwrap()
            .unwrap();
        assert_eq!(chosen.implementation_name(), "PosixFile");

        fs::remove_dir_all(&dir).unwrap();
    }
}
