//! Configuration loading and parsing for the chat filter pipeline.
//!
//! Parses `chatsieve.toml` (or an override path provided by the binary)
//! into filter, tab and history definitions. Unknown fields are ignored
//! (TOML deserialization tolerance) so the format can grow without
//! breaking older files. Definitions here are plain data: patterns are
//! compiled and colors parsed when a chain is built, so one malformed
//! rule never aborts loading.

use anyhow::Result;
use core_match::FindMode;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

/// One authored filter rule. A single definition can yield several
/// pipeline filters: a replace piece, a notify piece, a background color
/// piece and a forward piece all share the same find pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterDef {
    /// Disabled definitions are excluded when a chain is (re)built.
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub find: String,
    #[serde(default)]
    pub mode: FindMode,
    #[serde(default)]
    pub replace: Option<ReplaceDef>,
    #[serde(default)]
    pub notify: Option<NotifyDef>,
    #[serde(default)]
    pub background: Option<BackgroundDef>,
    #[serde(default)]
    pub forward: Option<ForwardDef>,
    /// Child rules applied to this rule's replacement result only.
    #[serde(default)]
    pub children: Vec<FilterDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceDef {
    /// Replacement template. `&x` shorthand is converted to in-band codes
    /// and, in regex mode, `$1`/`${name}` capture references expand.
    pub to: String,
    /// Optional `#RRGGBB[AA]` color override for inserted text.
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyDef {
    pub sound: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_pitch")]
    pub pitch: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundDef {
    /// `#RRGGBB[AA]` highlight color for matching lines.
    pub color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardDef {
    /// Registry ids of the match processors this rule binds.
    pub processors: Vec<String>,
}

/// A display channel fed by pattern routing.
#[derive(Debug, Clone, Deserialize)]
pub struct TabDef {
    pub name: String,
    pub find: String,
    #[serde(default)]
    pub mode: FindMode,
    /// When false, a line matching this tab is not forwarded to the main
    /// channel.
    #[serde(default = "default_true")]
    pub forward: bool,
}

/// Per-channel history sizing.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HistoryConfig {
    /// Entries retained per channel before eviction.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
    /// How many recent entries are scanned for duplicate stacking.
    #[serde(default = "default_stack_depth")]
    pub stack_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
            stack_depth: default_stack_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default, rename = "filter")]
    pub filters: Vec<FilterDef>,
    #[serde(default, rename = "tab")]
    pub tabs: Vec<TabDef>,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file string, kept for diagnostics.
    pub raw: Option<String>,
    pub file: ConfigFile,
}

fn default_true() -> bool {
    true
}
fn default_volume() -> f32 {
    1.0
}
fn default_pitch() -> f32 {
    1.0
}
fn default_max_retained() -> usize {
    100
}
fn default_stack_depth() -> usize {
    5
}

/// Best-effort config path following platform conventions: a local
/// `chatsieve.toml` wins over the platform config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("chatsieve.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("chatsieve").join("chatsieve.toml");
    }
    PathBuf::from("chatsieve.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        let file = toml::from_str::<ConfigFile>(&content)?;
        info!(
            target: "config",
            path = %path.display(),
            filters = file.filters.len(),
            tabs = file.tabs.len(),
            "loaded configuration"
        );
        Ok(Config {
            raw: Some(content),
            file,
        })
    } else {
        info!(target: "config", path = %path.display(), "no configuration file; using defaults");
        Ok(Config::default())
    }
}
