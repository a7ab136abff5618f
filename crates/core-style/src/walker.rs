//! Reconciliation of declared run styles with in-band legacy format codes.
//!
//! The walker visits a [`StyledText`] one visible character at a time,
//! tracking a current-style register. A control sequence (`§` + code)
//! overrides the style from that point on; the override is sticky until a
//! reset code or the next run boundary, either of which restores the
//! declared style. [`normalize`] uses the walk to rebuild an equivalent
//! text with no control sequences left.
//!
//! The walk operates on UTF-16 code units so that surrogate handling is
//! explicit: a surrogate pair is emitted as one character, an unpaired
//! surrogate is emitted as U+FFFD. The `&str` entry points encode each run
//! on the fly; [`StyleWalker::walk_units`] is the unit-level entry point.

use crate::{CONTROL_UNIT, FormatCode, Style, StyledText, TextRun};

const HIGH_SURROGATE: std::ops::RangeInclusive<u16> = 0xD800..=0xDBFF;
const LOW_SURROGATE: std::ops::RangeInclusive<u16> = 0xDC00..=0xDFFF;

/// One visible character together with its position and styling.
///
/// `raw_index` counts UTF-16 code units including consumed control
/// sequences; `visible_index` advances by exactly one per emitted
/// character, so `raw_index >= visible_index` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveChar {
    pub ch: char,
    pub raw_index: usize,
    pub visible_index: usize,
    /// The style the enclosing run declares.
    pub declared: Style,
    /// Declared style combined with any active format codes.
    pub effective: Style,
}

/// Whether a walk ran to completion or was stopped by the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Completed,
    Terminated,
}

/// Character-level state machine over styled runs.
#[derive(Debug)]
pub struct StyleWalker {
    raw_index: usize,
    visible_index: usize,
    current: Style,
}

impl Default for StyleWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleWalker {
    pub fn new() -> Self {
        Self {
            raw_index: 0,
            visible_index: 0,
            current: Style::EMPTY,
        }
    }

    /// Walk every visible character of `text`. The visitor returns `false`
    /// to stop the walk early.
    pub fn walk<F>(text: &StyledText, mut visitor: F) -> WalkOutcome
    where
        F: FnMut(EffectiveChar) -> bool,
    {
        let mut walker = Self::new();
        for run in text.runs() {
            let units: Vec<u16> = run.text.encode_utf16().collect();
            if walker.walk_units(&units, run.style, &mut visitor) == WalkOutcome::Terminated {
                return WalkOutcome::Terminated;
            }
        }
        WalkOutcome::Completed
    }

    /// Walk one run given as raw UTF-16 units. Index counters persist
    /// across calls on the same walker; the style register resets to
    /// `declared` at each call.
    pub fn walk_units<F>(&mut self, units: &[u16], declared: Style, visitor: &mut F) -> WalkOutcome
    where
        F: FnMut(EffectiveChar) -> bool,
    {
        // Every run boundary resets the register to the declared style;
        // without this, normalize would not preserve observed styles for
        // unstyled runs that follow styled ones.
        self.current = declared;
        let mut i = 0;
        while i < units.len() {
            let unit = units[i];
            if unit == CONTROL_UNIT {
                let Some(&code_unit) = units.get(i + 1) else {
                    // Bare trailing control char: consumed but ignored.
                    self.raw_index += 1;
                    break;
                };
                self.apply_code_unit(code_unit, declared);
                self.raw_index += 2;
                i += 2;
            } else if HIGH_SURROGATE.contains(&unit) {
                if let Some(low) = units.get(i + 1).copied().filter(|u| LOW_SURROGATE.contains(u)) {
                    let cp = 0x10000
                        + ((u32::from(unit) - 0xD800) << 10)
                        + (u32::from(low) - 0xDC00);
                    let ch = char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER);
                    if !self.emit(ch, declared, 2, visitor) {
                        return WalkOutcome::Terminated;
                    }
                    i += 2;
                } else {
                    if !self.emit(char::REPLACEMENT_CHARACTER, declared, 1, visitor) {
                        return WalkOutcome::Terminated;
                    }
                    i += 1;
                }
            } else if LOW_SURROGATE.contains(&unit) {
                if !self.emit(char::REPLACEMENT_CHARACTER, declared, 1, visitor) {
                    return WalkOutcome::Terminated;
                }
                i += 1;
            } else {
                let ch = char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER);
                if !self.emit(ch, declared, 1, visitor) {
                    return WalkOutcome::Terminated;
                }
                i += 1;
            }
        }
        WalkOutcome::Completed
    }

    fn apply_code_unit(&mut self, code_unit: u16, declared: Style) {
        let code = char::from_u32(u32::from(code_unit)).and_then(FormatCode::parse);
        match code {
            Some(FormatCode::Reset) | None => {
                // Unrecognized codes fall back to a reset.
                self.current = declared;
            }
            Some(code) => self.current = self.current.apply_code(code),
        }
    }

    fn emit<F>(&mut self, ch: char, declared: Style, raw_units: usize, visitor: &mut F) -> bool
    where
        F: FnMut(EffectiveChar) -> bool,
    {
        let keep_going = visitor(EffectiveChar {
            ch,
            raw_index: self.raw_index,
            visible_index: self.visible_index,
            declared,
            effective: self.current,
        });
        self.raw_index += raw_units;
        self.visible_index += 1;
        keep_going
    }
}

/// Rebuild `text` with every control sequence removed, the per-character
/// effective style re-expressed as plain runs. Visible text is unchanged.
pub fn normalize(text: &StyledText) -> StyledText {
    let mut out = StyledText::new();
    StyleWalker::walk(text, |ec| {
        out.push_char(ec.ch, ec.effective);
        true
    });
    if out.runs().is_empty() {
        out.push_run(TextRun::new("", Style::EMPTY));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    const RED: Color = Color::rgb(0xFF, 0x55, 0x55);

    fn collect(text: &StyledText) -> Vec<EffectiveChar> {
        let mut out = Vec::new();
        StyleWalker::walk(text, |ec| {
            out.push(ec);
            true
        });
        out
    }

    #[test]
    fn normalize_is_noop_without_codes() {
        let mut text = StyledText::new();
        text.push_run(TextRun::new("plain ", Style::EMPTY));
        text.push_run(TextRun::new("bold", Style {
            bold: true,
            ..Style::EMPTY
        }));
        let normalized = normalize(&text);
        assert_eq!(normalized.unformatted(), "plain bold");
        assert_eq!(normalized.runs(), text.runs());
    }

    #[test]
    fn color_code_sticky_until_reset() {
        let declared = Style {
            italic: true,
            ..Style::EMPTY
        };
        let text = StyledText::styled("ab\u{a7}ccd\u{a7}ref", declared);
        let chars = collect(&text);
        let s: String = chars.iter().map(|c| c.ch).collect();
        assert_eq!(s, "abcdef");
        assert_eq!(chars[0].effective, declared);
        assert_eq!(chars[1].effective, declared);
        // Color code clears the declared italic flag and sets red.
        assert_eq!(chars[2].effective, Style::colored(RED));
        assert_eq!(chars[3].effective, Style::colored(RED));
        // Reset restores the run's declared style.
        assert_eq!(chars[4].effective, declared);
        assert_eq!(chars[5].effective, declared);
    }

    #[test]
    fn attribute_codes_are_additive() {
        let text = StyledText::plain("\u{a7}c\u{a7}lx");
        let chars = collect(&text);
        assert_eq!(chars.len(), 1);
        assert_eq!(chars[0].effective, Style {
            bold: true,
            ..Style::colored(RED)
        });
    }

    #[test]
    fn unrecognized_code_resets() {
        let declared = Style {
            bold: true,
            ..Style::EMPTY
        };
        let text = StyledText::styled("\u{a7}ca\u{a7}zb", declared);
        let chars = collect(&text);
        assert_eq!(chars[0].effective, Style::colored(RED));
        assert_eq!(chars[1].effective, declared);
    }

    #[test]
    fn run_boundary_resets_code_overrides() {
        let mut text = StyledText::new();
        text.push_run(TextRun::new("\u{a7}ca", Style::EMPTY));
        let declared = Style {
            bold: true,
            ..Style::EMPTY
        };
        text.push_run(TextRun::new("b", declared));
        let chars = collect(&text);
        assert_eq!(chars[0].effective, Style::colored(RED));
        assert_eq!(chars[1].effective, declared);
    }

    #[test]
    fn trailing_control_char_is_skipped() {
        let text = StyledText::plain("ab\u{a7}");
        let chars = collect(&text);
        let s: String = chars.iter().map(|c| c.ch).collect();
        assert_eq!(s, "ab");
    }

    #[test]
    fn indices_account_for_codes_and_pairs() {
        let text = StyledText::plain("\u{a7}ca𝄞b");
        let chars = collect(&text);
        // 'a' sits after the 2-unit control sequence.
        assert_eq!((chars[0].raw_index, chars[0].visible_index), (2, 0));
        // U+1D11E is a surrogate pair: raw advances by 2, visible by 1.
        assert_eq!((chars[1].raw_index, chars[1].visible_index), (3, 1));
        assert_eq!((chars[2].raw_index, chars[2].visible_index), (5, 2));
        for c in &chars {
            assert!(c.raw_index >= c.visible_index);
        }
    }

    #[test]
    fn unpaired_surrogates_emit_replacement() {
        let mut walker = StyleWalker::new();
        let mut out = Vec::new();
        // High surrogate followed by a normal char, then a bare low one.
        let units = [0xD834, 0x0061, 0xDD1E];
        let outcome = walker.walk_units(&units, Style::EMPTY, &mut |ec: EffectiveChar| {
            out.push(ec.ch);
            true
        });
        assert_eq!(outcome, WalkOutcome::Completed);
        assert_eq!(out, vec!['\u{FFFD}', 'a', '\u{FFFD}']);
    }

    #[test]
    fn high_surrogate_at_end_emits_replacement() {
        let mut walker = StyleWalker::new();
        let mut out = Vec::new();
        let outcome = walker.walk_units(&[0x0061, 0xD834], Style::EMPTY, &mut |ec: EffectiveChar| {
            out.push(ec.ch);
            true
        });
        assert_eq!(outcome, WalkOutcome::Completed);
        assert_eq!(out, vec!['a', '\u{FFFD}']);
    }

    #[test]
    fn visitor_can_terminate_early() {
        let text = StyledText::plain("abcdef");
        let mut seen = 0;
        let outcome = StyleWalker::walk(&text, |_| {
            seen += 1;
            seen < 3
        });
        assert_eq!(outcome, WalkOutcome::Terminated);
        assert_eq!(seen, 3);
    }

    #[test]
    fn normalize_strips_codes_and_preserves_style() {
        let text = StyledText::plain("say \u{a7}chello\u{a7}r world");
        let normalized = normalize(&text);
        assert_eq!(normalized.unformatted(), "say hello world");
        assert_eq!(normalized.raw(), "say hello world");
        assert_eq!(normalized.runs().len(), 3);
        assert_eq!(normalized.runs()[1].style, Style::colored(RED));
        // Idempotent on its own output.
        assert_eq!(normalize(&normalized), normalized);
    }

    #[test]
    fn normalize_empty_yields_single_empty_run() {
        let normalized = normalize(&StyledText::new());
        assert_eq!(normalized.runs().len(), 1);
        assert_eq!(normalized.runs()[0].text, "");
    }
}
