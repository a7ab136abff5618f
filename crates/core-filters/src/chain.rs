//! Chain assembly and staged application.
//!
//! A chain is built fresh from the enabled configuration entries; hosts
//! swap the new chain in as a single reference update so an in-flight
//! apply always runs against one consistent snapshot.

use crate::filter::{
    ColorFilter, Filter, ForwardFilter, ForwardSignal, NotifyFilter, ReplaceFilter,
};
use crate::processor::ProcessorRegistry;
use crate::sound::{SoundCue, SoundPlayer};
use core_config::FilterDef;
use core_match::CompiledPattern;
use core_style::{Color, StyledText, convert_alternate_codes, walker};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of running a line through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Suppressed: a forward processor consumed the line, or nothing
    /// visible remained after filtering.
    Terminated,
    Delivered {
        text: StyledText,
        background: Option<Color>,
    },
}

/// An ordered list of filters applied in two stages: first every
/// Replace/Color/Notify filter mutating the accumulator, then every
/// Forward filter against the result.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    /// Build a chain from configuration entries. Disabled definitions are
    /// excluded; a definition whose pattern fails to compile is skipped
    /// with a warning rather than aborting the build.
    pub fn from_config(
        defs: &[FilterDef],
        registry: &ProcessorRegistry,
        player: &Arc<dyn SoundPlayer>,
    ) -> Self {
        let mut filters = Vec::new();
        for def in defs {
            filters.extend(build_filters(def, registry, player));
        }
        debug!(target: "filter", count = filters.len(), "built filter chain");
        Self::new(filters)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run one line through the chain. The input is normalized first so
    /// every filter sees code-free text.
    pub fn apply(&self, input: &StyledText) -> Outcome {
        let mut text = walker::normalize(input);
        let unfiltered = text.clone();
        let mut background = None;

        // Stage 1: ordered text rewriting, recoloring and notification.
        for filter in &self.filters {
            match filter {
                Filter::Replace(f) => {
                    if let Some(updated) = f.apply(&text) {
                        text = updated;
                    }
                }
                Filter::Color(f) => {
                    // Last matching color filter wins.
                    if let Some(color) = f.background_for(&text) {
                        background = Some(color);
                    }
                }
                Filter::Notify(f) => f.apply(&text),
                Filter::Forward(_) => {}
            }
        }

        // Stage 2: forwarding. One fired set spans all forward filters so
        // a processor bound to several filters runs at most once. Every
        // filter still runs even after a terminate signal, matching the
        // at-most-once bookkeeping.
        let mut fired = HashSet::new();
        let mut terminate = false;
        for filter in &self.filters {
            match filter {
                Filter::Forward(f) => {
                    if f.apply(&text, &unfiltered, &mut fired) == ForwardSignal::Terminate {
                        terminate = true;
                    }
                }
                Filter::Replace(_) | Filter::Color(_) | Filter::Notify(_) => {}
            }
        }
        if terminate {
            return Outcome::Terminated;
        }

        // Stage 3: an empty accumulator has nothing to show.
        if text.unformatted().is_empty() {
            return Outcome::Terminated;
        }
        Outcome::Delivered { text, background }
    }
}

/// One definition can yield several filters sharing a pattern, in the
/// fixed order replace, notify, background, forward.
fn build_filters(
    def: &FilterDef,
    registry: &ProcessorRegistry,
    player: &Arc<dyn SoundPlayer>,
) -> Vec<Filter> {
    if !def.enabled {
        return Vec::new();
    }
    let pattern = match CompiledPattern::compile(&def.find, def.mode) {
        Ok(p) => p,
        Err(err) => {
            warn!(target: "filter", find = %def.find, error = %err, "skipping filter definition");
            return Vec::new();
        }
    };

    let mut filters = Vec::new();
    if let Some(rep) = &def.replace {
        let template = convert_alternate_codes(&rep.to);
        let style_override = rep.color.as_deref().and_then(|hex| {
            let parsed = Color::from_hex(hex);
            if parsed.is_none() {
                warn!(target: "filter", color = hex, "ignoring invalid replace color");
            }
            parsed
        });
        let mut replace = ReplaceFilter::new(
            pattern.clone(),
            template,
            def.mode == core_match::FindMode::Regex,
            style_override,
        );
        for child in &def.children {
            for built in build_filters(child, registry, player) {
                replace.add_child(built);
            }
        }
        filters.push(Filter::Replace(replace));
    }
    if let Some(notify) = &def.notify {
        filters.push(Filter::Notify(NotifyFilter::new(
            pattern.clone(),
            SoundCue {
                sound: notify.sound.clone(),
                volume: notify.volume,
                pitch: notify.pitch,
            },
            Arc::clone(player),
        )));
    }
    if let Some(bg) = &def.background {
        match Color::from_hex(&bg.color) {
            Some(color) => filters.push(Filter::Color(ColorFilter::new(pattern.clone(), color))),
            None => {
                warn!(target: "filter", color = %bg.color, "skipping background with invalid color")
            }
        }
    }
    if let Some(fwd) = &def.forward {
        let processors: Vec<_> = fwd
            .processors
            .iter()
            .filter_map(|id| {
                let found = registry.get(id);
                if found.is_none() {
                    warn!(target: "filter", processor = %id, "unknown or disabled match processor");
                }
                found
            })
            .collect();
        let forward = ForwardFilter::new(pattern, processors);
        if !forward.is_empty() {
            filters.push(Filter::Forward(forward));
        }
    }
    filters
}
