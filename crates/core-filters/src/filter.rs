//! The four filter variants and their per-variant apply operations.
//!
//! The set of variants is closed; everything that walks a chain matches
//! on [`Filter`] exhaustively.

use crate::processor::{MatchProcessor, ProcessorId};
use crate::sound::{SoundCue, SoundPlayer};
use core_match::{CompiledPattern, MatchSpan};
use core_style::{Color, Style, StyledText, walker};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A unit of the pipeline.
pub enum Filter {
    Replace(ReplaceFilter),
    Color(ColorFilter),
    Notify(NotifyFilter),
    Forward(ForwardFilter),
}

impl Filter {
    /// Child application inside a parent Replace match: replace children
    /// rewrite the parent's replacement result, notify children fire their
    /// cue against it. Color and forward children have no effect in this
    /// position.
    pub(crate) fn apply_to_text(&self, text: &StyledText) -> Option<StyledText> {
        match self {
            Filter::Replace(f) => f.apply(text),
            Filter::Notify(f) => {
                f.apply(text);
                None
            }
            Filter::Color(_) | Filter::Forward(_) => None,
        }
    }
}

/// Rewrites matched spans of the accumulator text.
pub struct ReplaceFilter {
    pattern: CompiledPattern,
    template: String,
    /// True for regex-mode filters: `$1`/`${name}` references expand.
    expand_captures: bool,
    style_override: Option<Color>,
    children: Vec<Filter>,
}

impl ReplaceFilter {
    pub fn new(
        pattern: CompiledPattern,
        template: impl Into<String>,
        expand_captures: bool,
        style_override: Option<Color>,
    ) -> Self {
        Self {
            pattern,
            template: template.into(),
            expand_captures,
            style_override,
            children: Vec::new(),
        }
    }

    /// Children run in declared order, each against the accumulated
    /// replacement result, and only when this filter matched.
    pub fn add_child(&mut self, child: Filter) {
        self.children.push(child);
    }

    /// `None` when the pattern does not match; the chain then leaves the
    /// accumulator untouched.
    pub fn apply(&self, text: &StyledText) -> Option<StyledText> {
        let haystack = text.unformatted();
        let replacements = self.collect_replacements(&haystack)?;

        let total = text.visible_len();
        let mut out = StyledText::new();
        let mut last = 0;
        for (span, replacement) in &replacements {
            out.append(&text.slice_visible(last, span.start));
            let base = text.style_at_visible(span.start).unwrap_or(Style::EMPTY);
            let style = match self.style_override {
                Some(color) => base.with_color(color),
                None => base,
            };
            // Templates may carry in-band codes; normalize against the
            // style of the text being replaced.
            let inserted = walker::normalize(&StyledText::styled(replacement.clone(), style));
            if !inserted.is_empty() {
                out.append(&inserted);
            }
            last = span.end;
        }
        out.append(&text.slice_visible(last, total));

        let mut result = out;
        for child in &self.children {
            if let Some(updated) = child.apply_to_text(&result) {
                result = updated;
            }
        }
        Some(result)
    }

    fn collect_replacements(&self, haystack: &str) -> Option<Vec<(MatchSpan, String)>> {
        if self.expand_captures
            && let Some(re) = self.pattern.as_regex()
        {
            let mut out = Vec::new();
            for caps in re.captures_iter(haystack) {
                let Some(m) = caps.get(0) else { continue };
                if m.is_empty() {
                    continue;
                }
                let mut expanded = String::new();
                caps.expand(&self.template, &mut expanded);
                out.push((
                    MatchSpan {
                        start: char_offset(haystack, m.start()),
                        end: char_offset(haystack, m.end()),
                        text: m.as_str().to_owned(),
                    },
                    expanded,
                ));
            }
            (!out.is_empty()).then_some(out)
        } else {
            let spans = self.pattern.find_matches(haystack);
            if spans.is_empty() {
                return None;
            }
            Some(
                spans
                    .into_iter()
                    .map(|span| (span, self.template.clone()))
                    .collect(),
            )
        }
    }
}

/// Annotates matching lines with a background highlight; never mutates
/// text.
pub struct ColorFilter {
    pattern: CompiledPattern,
    background: Color,
}

impl ColorFilter {
    pub fn new(pattern: CompiledPattern, background: Color) -> Self {
        Self {
            pattern,
            background,
        }
    }

    pub fn background_for(&self, text: &StyledText) -> Option<Color> {
        self.pattern
            .is_match(&text.unformatted())
            .then_some(self.background)
    }
}

/// Fires a sound cue at the playback collaborator on match.
pub struct NotifyFilter {
    pattern: CompiledPattern,
    cue: SoundCue,
    player: Arc<dyn SoundPlayer>,
}

impl NotifyFilter {
    pub fn new(pattern: CompiledPattern, cue: SoundCue, player: Arc<dyn SoundPlayer>) -> Self {
        Self {
            pattern,
            cue,
            player,
        }
    }

    pub fn apply(&self, text: &StyledText) {
        if self.pattern.is_match(&text.unformatted()) {
            debug!(target: "filter", sound = %self.cue.sound, "notify matched");
            self.player.play(&self.cue);
        }
    }
}

/// Result of a forward filter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardSignal {
    Continue,
    /// At least one processor consumed the message; suppress delivery.
    Terminate,
}

/// Hands matching lines to bound match processors; the only variant able
/// to terminate the pipeline.
pub struct ForwardFilter {
    pattern: CompiledPattern,
    processors: Vec<(ProcessorId, Arc<dyn MatchProcessor>)>,
}

impl ForwardFilter {
    pub fn new(
        pattern: CompiledPattern,
        processors: Vec<(ProcessorId, Arc<dyn MatchProcessor>)>,
    ) -> Self {
        Self {
            pattern,
            processors,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every bound processor not already in `fired`. The fired set is
    /// shared across all forward filters of one chain invocation, so a
    /// processor bound twice still runs at most once per line.
    pub fn apply(
        &self,
        text: &StyledText,
        unfiltered: &StyledText,
        fired: &mut HashSet<ProcessorId>,
    ) -> ForwardSignal {
        let matches = {
            let found = self.pattern.find_matches(&text.unformatted());
            (!found.is_empty()).then_some(found)
        };
        let mut terminate = false;
        for (id, processor) in &self.processors {
            if fired.contains(id) {
                continue;
            }
            let result = match &matches {
                Some(found) => processor.process(text, unfiltered, Some(found)),
                None if !processor.matches_only() => processor.process(text, unfiltered, None),
                None => continue,
            };
            match result {
                Ok(true) => {
                    fired.insert(id.clone());
                    terminate = true;
                }
                Ok(false) => {}
                // A failing processor must not take down the pipeline;
                // treat it as "did not consume".
                Err(err) => {
                    warn!(target: "filter", processor = %id, error = %err, "match processor failed")
                }
            }
        }
        if terminate {
            ForwardSignal::Terminate
        } else {
            ForwardSignal::Continue
        }
    }
}

fn char_offset(haystack: &str, byte_offset: usize) -> usize {
    haystack[..byte_offset].chars().count()
}
