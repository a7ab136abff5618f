//! Match processors: opaque handlers a Forward filter delegates to.

use anyhow::Result;
use core_match::MatchSpan;
use core_style::StyledText;
use std::fmt;
use std::sync::Arc;

/// Stable identifier a processor is registered under. Forward filters
/// bind processors by id, and the per-line fired set is keyed on it so a
/// processor bound to several filters runs at most once per line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(String);

impl ProcessorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProcessorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An external handler for matched lines.
pub trait MatchProcessor: Send + Sync {
    /// When true (the default) the processor is only invoked on matching
    /// lines; otherwise it also receives non-matching lines with `None`
    /// matches.
    fn matches_only(&self) -> bool {
        true
    }

    /// Handle a line. `text` is the current accumulator, `unfiltered` the
    /// original input. Returning `Ok(true)` marks the message consumed,
    /// which terminates the pipeline after the forward stage. An `Err` is
    /// isolated: the chain logs it and treats the message as not
    /// consumed.
    fn process(
        &self,
        text: &StyledText,
        unfiltered: &StyledText,
        matches: Option<&[MatchSpan]>,
    ) -> Result<bool>;
}

struct Entry {
    id: ProcessorId,
    processor: Arc<dyn MatchProcessor>,
    enabled: bool,
}

/// Registry of available processors, keyed by stable id, each with an
/// enabled flag. Forward filters resolve their bindings here at chain
/// build time.
#[derive(Default)]
pub struct ProcessorRegistry {
    entries: Vec<Entry>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a processor under `id`, enabled.
    pub fn register(&mut self, id: impl Into<ProcessorId>, processor: Arc<dyn MatchProcessor>) {
        let id = id.into();
        self.entries.retain(|e| e.id != id);
        self.entries.push(Entry {
            id,
            processor,
            enabled: true,
        });
    }

    /// Returns false when no processor with that id exists.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.id.as_str() == id) {
            Some(e) => {
                e.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Look up an enabled processor; disabled and unknown ids both yield
    /// `None`.
    pub fn get(&self, id: &str) -> Option<(ProcessorId, Arc<dyn MatchProcessor>)> {
        self.entries
            .iter()
            .find(|e| e.id.as_str() == id && e.enabled)
            .map(|e| (e.id.clone(), Arc::clone(&e.processor)))
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProcessorId> {
        self.entries.iter().map(|e| &e.id)
    }
}
