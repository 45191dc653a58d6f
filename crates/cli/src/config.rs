//! Optional defaults file for `lanefile`.
//!
//! Command-line flags override every value here.
//!
//! # Example
//!
//! ```toml
//! [parse]
//! resolve_imports = true
//! max_import_depth = 4
//! sandbox_root = "."
//!
//! [output]
//! format = "json"
//! ignore_top_level = true
//! ```

use std::path::{Path, PathBuf};

use lanefile_core::{ParseOptions, DEFAULT_MAX_IMPORT_DEPTH};
use serde::Deserialize;

use crate::OutputFormat;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub parse: ParseSection,
    pub output: OutputSection,
}

/// `[parse]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ParseSection {
    pub resolve_imports: bool,
    pub max_import_depth: usize,
    pub sandbox_root: Option<PathBuf>,
}

impl Default for ParseSection {
    fn default() -> Self {
        ParseSection {
            resolve_imports: false,
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
            sandbox_root: None,
        }
    }
}

impl ParseSection {
    pub fn to_options(&self) -> ParseOptions {
        ParseOptions {
            resolve_imports: self.resolve_imports,
            max_import_depth: self.max_import_depth,
            sandbox_root: self.sandbox_root.clone(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct OutputSection {
    pub format: OutputFormat,
    pub ignore_top_level: bool,
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read the config file at `path`, or the defaults when no path is given.
pub(crate) fn load(path: Option<&Path>) -> Result<Config, String> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}
