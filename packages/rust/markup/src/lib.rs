//! Terminal renderer for tldr page markup.
//!
//! Pages use a small, line-oriented subset of Markdown:
//!
//! ```text
//! # tar
//!
//! > Archiving utility.
//!
//! - Create an archive from files:
//!
//! `tar cf {{target.tar}} {{file1 file2}}`
//! ```
//!
//! Rendering is a two-level tokenizer rather than a Markdown parser. The first
//! character of a line picks its role, backticks split the rest into normal
//! and verbatim runs, and inside verbatim runs `{{...}}` marks placeholders.
//! Backtick and brace balance is assumed; pages come from a curated corpus.

mod scanner;

use std::io::{self, Write};

use crossterm::style::{Attribute, Color, ContentStyle};
use tracing::warn;

use crate::scanner::{Span, scan};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Semantic role of a rendered run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Text of an unmarked line.
    Plain,
    /// Page title (`#`).
    Heading,
    /// Summary and links (`>`).
    Note,
    /// Example description (`-`).
    Description,
    /// Literal command text between backticks.
    Verbatim,
    /// `{{placeholder}}` inside verbatim text.
    Example,
}

impl Style {
    /// Terminal styling for this role.
    pub fn content_style(self) -> ContentStyle {
        let mut style = ContentStyle::new();
        match self {
            Self::Heading => style.attributes.set(Attribute::Bold),
            Self::Verbatim => style.foreground_color = Some(Color::Red),
            Self::Example => style.attributes.set(Attribute::Italic),
            Self::Plain | Self::Note | Self::Description => {}
        }
        style
    }
}

/// A run of text with one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: Style,
}

impl Segment {
    fn new(text: &str, style: Style) -> Self {
        Self {
            text: text.to_string(),
            style,
        }
    }
}

/// Role of a line, selected by its first non-whitespace character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading,
    Note,
    Description,
    Plain,
}

impl LineKind {
    /// Dispatch on the marker character. Returns the kind and the text after the marker.
    fn classify(line: &str) -> (Self, &str) {
        match line.as_bytes().first() {
            Some(b'#') => (Self::Heading, &line[1..]),
            Some(b'>') => (Self::Note, &line[1..]),
            Some(b'-') => (Self::Description, &line[1..]),
            _ => (Self::Plain, line),
        }
    }

    /// Style of the line's non-verbatim text.
    pub fn style(self) -> Style {
        match self {
            Self::Heading => Style::Heading,
            Self::Note => Style::Note,
            Self::Description => Style::Description,
            Self::Plain => Style::Plain,
        }
    }

    /// Unstyled layout written before the line's segments.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Description => "\n- ",
            Self::Heading | Self::Note | Self::Plain => "  ",
        }
    }
}

/// One non-blank page line, tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub segments: Vec<Segment>,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Tokenize a single line. Blank lines yield `None`.
pub fn parse_line(raw: &str) -> Option<Line> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }

    let (kind, rest) = LineKind::classify(line);

    // An empty backtick pair would toggle state around nothing.
    let text = rest.trim().replace("``", "");

    let outer = scan(&text, &["`"]);
    if cfg!(debug_assertions) && !outer.balanced {
        warn!(line, "unbalanced backticks");
    }

    let mut segments = Vec::new();
    for (span, run) in outer.runs {
        match span {
            Span::Outer => segments.push(Segment::new(run, kind.style())),
            Span::Inner => parse_verbatim(run, &mut segments),
        }
    }

    Some(Line { kind, segments })
}

/// Split a verbatim run into literal and placeholder segments.
fn parse_verbatim(run: &str, segments: &mut Vec<Segment>) {
    // `{{}}` and `}}{{` are no-ops that would otherwise flip state for nothing.
    let text = run.replace("{{}}", "").replace("}}{{", "");

    let inner = scan(&text, &["{{", "}}"]);
    if cfg!(debug_assertions) && !inner.balanced {
        warn!(run, "unbalanced placeholder braces");
    }

    for (span, part) in inner.runs {
        let style = match span {
            Span::Outer => Style::Verbatim,
            Span::Inner => Style::Example,
        };
        segments.push(Segment::new(part, style));
    }
}

/// Tokenize every non-blank line of a page.
pub fn parse_page(page: &str) -> Vec<Line> {
    page.lines().filter_map(parse_line).collect()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Receiver of rendered output.
pub trait SegmentSink {
    /// Unstyled layout text (indentation, bullets, newlines).
    fn layout(&mut self, text: &str) -> io::Result<()>;

    /// A styled run of page text.
    fn segment(&mut self, segment: &Segment) -> io::Result<()>;
}

/// Writes segments as ANSI-styled text.
pub struct AnsiSink<W: Write> {
    out: W,
}

impl<W: Write> AnsiSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SegmentSink for AnsiSink<W> {
    fn layout(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())
    }

    fn segment(&mut self, segment: &Segment) -> io::Result<()> {
        write!(
            self.out,
            "{}",
            segment.style.content_style().apply(segment.text.as_str())
        )
    }
}

/// Lay out a page into `sink`: a blank line, one output line per page line, a blank line.
pub fn render_page<S: SegmentSink + ?Sized>(page: &str, sink: &mut S) -> io::Result<()> {
    sink.layout("\n")?;

    for line in parse_page(page) {
        sink.layout(line.kind.prefix())?;
        for segment in &line.segments {
            sink.segment(segment)?;
        }
        sink.layout("\n")?;
    }

    sink.layout("\n")
}

/// Render `page` to `out`.
///
/// With `styled == false` (output is not a terminal) the page text is
/// written unmodified.
pub fn render<W: Write>(page: &str, styled: bool, mut out: W) -> io::Result<()> {
    if !styled {
        out.write_all(page.as_bytes())?;
        return out.flush();
    }

    let mut sink = AnsiSink::new(out);
    render_page(page, &mut sink)?;
    sink.into_inner().flush()
}
