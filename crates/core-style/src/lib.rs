//! Styled-text data model: colors, style attributes, legacy format codes,
//! and the run-based [`StyledText`] value the filter pipeline operates on.
//!
//! A chat line arrives as an ordered list of text runs, each carrying a
//! declared [`Style`]. The run contents may additionally embed legacy
//! two-character control sequences (`§` + code) that override the style
//! mid-run. The [`walker`] module reconciles both styling sources.

pub mod walker;

pub use walker::{EffectiveChar, StyleWalker, WalkOutcome, normalize};

/// In-band control character introducing a legacy format code.
pub const CONTROL_CHAR: char = '\u{00A7}'; // '§'

/// UTF-16 unit of [`CONTROL_CHAR`]; the walker operates on code units.
pub(crate) const CONTROL_UNIT: u16 = 0x00A7;

/// An RGBA color. Alpha defaults to opaque for the legacy palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

/// Style attributes carried by a text run or produced by the walker.
///
/// `color == None` means "inherit whatever the renderer's default is";
/// the pipeline never resolves defaults itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Style {
    pub color: Option<Color>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub obfuscated: bool,
}

impl Style {
    pub const EMPTY: Style = Style {
        color: None,
        bold: false,
        italic: false,
        underline: false,
        strikethrough: false,
        obfuscated: false,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub const fn colored(color: Color) -> Self {
        Style {
            color: Some(color),
            ..Self::EMPTY
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Apply a legacy format code on top of this style. Color codes are
    /// exclusive (they clear every flag and set the color); attribute
    /// codes are additive. `Reset` is handled by the walker, which needs
    /// the run's declared style to restore.
    pub fn apply_code(self, code: FormatCode) -> Self {
        match code {
            FormatCode::Color(c) => Style::colored(c),
            FormatCode::Bold => Style { bold: true, ..self },
            FormatCode::Italic => Style {
                italic: true,
                ..self
            },
            FormatCode::Underline => Style {
                underline: true,
                ..self
            },
            FormatCode::Strikethrough => Style {
                strikethrough: true,
                ..self
            },
            FormatCode::Obfuscated => Style {
                obfuscated: true,
                ..self
            },
            FormatCode::Reset => self,
        }
    }
}

/// Legacy one-character format codes following the control character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCode {
    Color(Color),
    Obfuscated,
    Bold,
    Strikethrough,
    Underline,
    Italic,
    Reset,
}

impl FormatCode {
    /// Look up a code character (case-insensitive). Returns `None` for
    /// unrecognized codes; the walker treats those as a reset.
    pub fn parse(code: char) -> Option<Self> {
        let c = code.to_ascii_lowercase();
        let color = |r, g, b| Some(FormatCode::Color(Color::rgb(r, g, b)));
        match c {
            '0' => color(0x00, 0x00, 0x00),
            '1' => color(0x00, 0x00, 0xAA),
            '2' => color(0x00, 0xAA, 0x00),
            '3' => color(0x00, 0xAA, 0xAA),
            '4' => color(0xAA, 0x00, 0x00),
            '5' => color(0xAA, 0x00, 0xAA),
            '6' => color(0xFF, 0xAA, 0x00),
            '7' => color(0xAA, 0xAA, 0xAA),
            '8' => color(0x55, 0x55, 0x55),
            '9' => color(0x55, 0x55, 0xFF),
            'a' => color(0x55, 0xFF, 0x55),
            'b' => color(0x55, 0xFF, 0xFF),
            'c' => color(0xFF, 0x55, 0x55),
            'd' => color(0xFF, 0x55, 0xFF),
            'e' => color(0xFF, 0xFF, 0x55),
            'f' => color(0xFF, 0xFF, 0xFF),
            'k' => Some(FormatCode::Obfuscated),
            'l' => Some(FormatCode::Bold),
            'm' => Some(FormatCode::Strikethrough),
            'n' => Some(FormatCode::Underline),
            'o' => Some(FormatCode::Italic),
            'r' => Some(FormatCode::Reset),
            _ => None,
        }
    }

    fn is_code_char(c: char) -> bool {
        Self::parse(c).is_some()
    }
}

/// Convert user-friendly `&x` shorthand into in-band control sequences.
///
/// Only an `&` directly followed by a recognized code character is
/// converted, so ordinary ampersands in chat text survive.
pub fn convert_alternate_codes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&'
            && let Some(&next) = chars.peek()
            && FormatCode::is_code_char(next)
        {
            out.push(CONTROL_CHAR);
        } else {
            out.push(c);
        }
    }
    out
}

/// One styled run: literal content plus its declared style.
///
/// The content may still contain in-band control sequences until the text
/// has been through [`walker::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub style: Style,
}

impl TextRun {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// An ordered list of styled runs. Concatenating the run contents in
/// order yields the raw text of the line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledText {
    runs: Vec<TextRun>,
}

impl StyledText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_run(run: TextRun) -> Self {
        Self { runs: vec![run] }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::from_run(TextRun::new(text, Style::EMPTY))
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self::from_run(TextRun::new(text, style))
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.is_empty())
    }

    /// Push a run, merging with the tail when the style matches.
    pub fn push_run(&mut self, run: TextRun) {
        if run.text.is_empty() && !self.runs.is_empty() {
            return;
        }
        if let Some(last) = self.runs.last_mut()
            && last.style == run.style
        {
            last.text.push_str(&run.text);
            return;
        }
        self.runs.push(run);
    }

    /// Push a single character with the given style, merging runs.
    pub fn push_char(&mut self, ch: char, style: Style) {
        if let Some(last) = self.runs.last_mut()
            && last.style == style
        {
            last.text.push(ch);
            return;
        }
        self.runs.push(TextRun::new(ch.to_string(), style));
    }

    pub fn append(&mut self, other: &StyledText) {
        for run in &other.runs {
            self.push_run(run.clone());
        }
    }

    /// Raw concatenated content, control sequences included.
    pub fn raw(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Visible plain text with control sequences stripped. This is the
    /// string filters match against and histories deduplicate on.
    pub fn unformatted(&self) -> String {
        let mut out = String::new();
        walker::StyleWalker::walk(self, |ec| {
            out.push(ec.ch);
            true
        });
        out
    }

    /// Number of visible characters.
    pub fn visible_len(&self) -> usize {
        let mut n = 0usize;
        walker::StyleWalker::walk(self, |_| {
            n += 1;
            true
        });
        n
    }

    /// Effective style of the visible character at `idx`, or `None` when
    /// the index is out of range.
    pub fn style_at_visible(&self, idx: usize) -> Option<Style> {
        let mut found = None;
        walker::StyleWalker::walk(self, |ec| {
            if ec.visible_index == idx {
                found = Some(ec.effective);
                false
            } else {
                true
            }
        });
        found
    }

    /// Sub-text covering visible characters `[start, end)`. Indices are
    /// clamped to the visible length; styles are the effective styles.
    pub fn slice_visible(&self, start: usize, end: usize) -> StyledText {
        let mut out = StyledText::new();
        walker::StyleWalker::walk(self, |ec| {
            if ec.visible_index >= end {
                return false;
            }
            if ec.visible_index >= start {
                out.push_char(ec.ch, ec.effective);
            }
            true
        });
        out
    }
}

impl std::fmt::Display for StyledText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.unformatted())
    }
}
