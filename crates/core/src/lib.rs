#![allow(clippy::result_large_err)]
//! lanefile-core: Fastfile parser core library.
//!
//! Turns a Fastfile (a Ruby build script) into a [`Document`] of
//! platforms, lanes, lane descriptions and the actions each lane runs.
//! Constructs outside that vocabulary are kept as re-rendered source.
//!
//! # Public API
//!
//! - [`parse_str()`] / [`parse_file()`] -- script text or path to a [`Document`]
//! - [`load_script()`] -- same, with import resolution through a
//!   [`SourceProvider`]
//! - [`TreeBuilder`] -- syntax tree to [`Document`]
//! - [`normalize()`] -- decode an action's arguments into a [`Value`]
//! - [`ScriptError`] -- loading error type
//!
//! The front-end ([`lexer`], [`parser`], [`unparse`]) is public for
//! callers that want the syntax tree itself.

pub mod ast;
pub mod builder;
pub mod document;
pub mod error;
pub mod lexer;
pub mod loader;
pub mod params;
pub mod parser;
pub mod source;
pub mod unparse;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Node, NodeKind};
pub use builder::{ImportRequest, TreeBuilder};
pub use document::{ActionEntry, Document, LaneEntry, LaneGroup, LaneKey, Value};
pub use error::ScriptError;
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};
pub use unparse::{Render, RubyRenderer};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use loader::{
    load_script, parse_file, parse_str, ImportedScript, ParseOptions, ParsedScript, ScriptInput,
    DEFAULT_MAX_IMPORT_DEPTH,
};
pub use params::normalize;
