//! The structured result of parsing a Fastfile.
//!
//! A [`Document`] maps an optional platform to a [`LaneGroup`], which maps an
//! optional lane key to a [`LaneEntry`]. Absent keys serialize as `""` and
//! the hook blocks use fixed sentinel names.

use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

pub const BEFORE_ALL_KEY: &str = "_before_all_block_";
pub const AFTER_ALL_KEY: &str = "_after_all_block_";
pub const ERROR_KEY: &str = "_error_block_";

// ──────────────────────────────────────────────
// Lane keys and entries
// ──────────────────────────────────────────────

/// A lane key: a user lane name or one of the hook sentinels. Top-level
/// actions outside any lane use `None` as their key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LaneKey {
    Named(String),
    BeforeAll,
    AfterAll,
    Error,
}

impl LaneKey {
    pub fn as_str(&self) -> &str {
        match self {
            LaneKey::Named(name) => name,
            LaneKey::BeforeAll => BEFORE_ALL_KEY,
            LaneKey::AfterAll => AFTER_ALL_KEY,
            LaneKey::Error => ERROR_KEY,
        }
    }
}

impl fmt::Display for LaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No arguments, `nil`, or nothing literal to decode
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A Ruby symbol or bare identifier, without the colon
    Symbol(String),
    /// Keyword arguments; values are never themselves mappings
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) | Value::Symbol(s) => f.write_str(s),
            Value::Map(m) => {
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Absent => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) | Value::Symbol(s) => serializer.serialize_str(s),
            Value::Map(m) => m.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionEntry {
    /// A recognized call with decoded parameters.
    Call {
        #[serde(rename = "action")]
        name: String,
        parameters: Value,
    },
    /// Rendered source of a construct outside the recognized vocabulary.
    Opaque {
        #[serde(rename = "advancedCode")]
        source_text: String,
    },
}

impl ActionEntry {
    pub fn action_name(&self) -> Option<&str> {
        match self {
            ActionEntry::Call { name, .. } => Some(name),
            ActionEntry::Opaque { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LaneEntry {
    pub description: Vec<String>,
    pub actions: Vec<ActionEntry>,
    /// Set only for `lane` (false) and `private_lane` (true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
}

/// Lanes of one platform. `None` holds actions outside any lane.
pub type LaneGroup = IndexMap<Option<LaneKey>, LaneEntry>;

// ──────────────────────────────────────────────
// Document
// ──────────────────────────────────────────────

/// Platforms in insertion order. `None` holds lanes outside any platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    platforms: IndexMap<Option<String>, LaneGroup>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `(platform, lane)`, created empty on first touch.
    pub(crate) fn entry_mut(
        &mut self,
        platform: Option<&str>,
        lane: Option<&LaneKey>,
    ) -> &mut LaneEntry {
        self.platforms
            .entry(platform.map(str::to_owned))
            .or_default()
            .entry(lane.cloned())
            .or_default()
    }

    pub fn get(&self, platform: Option<&str>, lane: Option<&LaneKey>) -> Option<&LaneEntry> {
        let platform = platform.map(str::to_owned);
        let lane = lane.cloned();
        self.platforms.get(&platform)?.get(&lane)
    }

    /// Shorthand for a named lane.
    pub fn lane(&self, platform: Option<&str>, name: &str) -> Option<&LaneEntry> {
        self.get(platform, Some(&LaneKey::Named(name.to_owned())))
    }

    pub fn platforms(&self) -> impl Iterator<Item = (Option<&str>, &LaneGroup)> {
        self.platforms.iter().map(|(p, g)| (p.as_deref(), g))
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Every `(platform, lane)` label in insertion order, skipping the
    /// top-level entry whose label would be empty.
    pub fn available_lanes(&self) -> Vec<String> {
        self.labeled()
            .map(|(label, _)| label)
            .filter(|label| !label.is_empty())
            .collect()
    }

    /// All entries keyed by label. Without `ignore_top_level` the
    /// `(absent, absent)` entry is kept under `""`.
    pub fn flatten(&self, ignore_top_level: bool) -> IndexMap<String, &LaneEntry> {
        let mut flat = IndexMap::new();
        for (label, entry) in self.labeled() {
            if ignore_top_level && label.is_empty() {
                continue;
            }
            flat.insert(label, entry);
        }
        flat
    }

    fn labeled(&self) -> impl Iterator<Item = (String, &LaneEntry)> {
        self.platforms.iter().flat_map(|(platform, group)| {
            group
                .iter()
                .map(move |(lane, entry)| (label(platform.as_deref(), lane.as_ref()), entry))
        })
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.platforms.len()))?;
        for (platform, group) in &self.platforms {
            map.serialize_entry(platform.as_deref().unwrap_or(""), &Lanes(group))?;
        }
        map.end()
    }
}

/// A lane group keyed by lane name, `""` for the top-level entry.
struct Lanes<'a>(&'a LaneGroup);

impl Serialize for Lanes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (lane, entry) in self.0 {
            map.serialize_entry(lane.as_ref().map_or("", LaneKey::as_str), entry)?;
        }
        map.end()
    }
}

/// Non-absent parts joined by a single space.
fn label(platform: Option<&str>, lane: Option<&LaneKey>) -> String {
    let parts: Vec<&str> = platform
        .into_iter()
        .chain(lane.map(LaneKey::as_str))
        .filter(|s| !s.is_empty())
        .collect();
    parts.join(" ")
}
