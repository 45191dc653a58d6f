//! Where script text comes from.
//!
//! The loader never touches `std::fs` directly; it goes through a
//! [`SourceProvider`], so imports can be resolved against an in-memory set
//! of scripts in tests and embedders.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Reads scripts and resolves `import` paths.
pub trait SourceProvider {
    /// Read the text of a script.
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error>;

    /// Resolve an import path relative to the importing script's directory.
    fn resolve_import(&self, base: &Path, import: &str) -> Result<PathBuf, std::io::Error>;

    /// Canonical form of a path, used for cycle detection and the sandbox
    /// check.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error>;
}

/// Reads scripts from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error> {
        std::fs::read_to_string(path)
    }

    fn resolve_import(&self, base: &Path, import: &str) -> Result<PathBuf, std::io::Error> {
        Ok(base.join(import))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        path.canonicalize()
    }
}

/// Scripts held in memory, keyed by normalized path.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProvider {
    scripts: HashMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new(scripts: HashMap<PathBuf, String>) -> Self {
        let scripts = scripts
            .into_iter()
            .map(|(path, text)| (normalize_path(&path), text))
            .collect();
        Self { scripts }
    }

    /// Add a script, builder style.
    pub fn with_script(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.scripts
            .insert(normalize_path(path.as_ref()), text.into());
        self
    }

    fn not_found(path: &Path) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no script at {}", path.display()),
        )
    }
}

impl SourceProvider for InMemoryProvider {
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error> {
        let normalized = normalize_path(path);
        self.scripts
            .get(&normalized)
            .cloned()
            .ok_or_else(|| Self::not_found(&normalized))
    }

    fn resolve_import(&self, base: &Path, import: &str) -> Result<PathBuf, std::io::Error> {
        Ok(normalize_path(&base.join(import)))
    }

    /// A known script, or a directory that contains one.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        let normalized = normalize_path(path);
        let known = self.scripts.contains_key(&normalized)
            || self.scripts.keys().any(|k| k.starts_with(&normalized));
        if known {
            Ok(normalized)
        } else {
            Err(Self::not_found(&normalized))
        }
    }
}

/// Resolve `.` and `..` lexically. `..` above the first component is
/// dropped.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                components.pop();
            }
            other => components.push(other),
        }
    }
    components.iter().collect()
}
