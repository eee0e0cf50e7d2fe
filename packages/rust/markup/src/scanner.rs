//! Two-state delimiter scanner shared by both tokenizer levels.
//!
//! Text alternates between an outer and an inner span; every delimiter
//! occurrence flips the state. Delimiter balance is a precondition of the
//! page corpus: the scanner reports it but never repairs it.

/// Which side of a delimiter pair a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Span {
    Outer,
    Inner,
}

impl Span {
    fn toggle(self) -> Self {
        match self {
            Self::Outer => Self::Inner,
            Self::Inner => Self::Outer,
        }
    }
}

/// Result of scanning one piece of text.
#[derive(Debug)]
pub(crate) struct Scan<'a> {
    /// Non-empty runs in order.
    pub runs: Vec<(Span, &'a str)>,
    /// Whether the text ended back in the outer span.
    pub balanced: bool,
}

/// Split `text` at every occurrence of any of `delimiters`.
///
/// A text starting with a delimiter therefore starts its first run inside.
/// Empty runs are dropped without affecting the state.
pub(crate) fn scan<'a>(text: &'a str, delimiters: &[&str]) -> Scan<'a> {
    let mut runs = Vec::new();
    let mut state = Span::Outer;
    let mut rest = text;

    loop {
        let next = delimiters
            .iter()
            .filter_map(|delim| rest.find(delim).map(|at| (at, delim.len())))
            .min_by_key(|(at, _)| *at);

        let Some((at, len)) = next else {
            push_run(&mut runs, state, rest);
            break;
        };

        push_run(&mut runs, state, &rest[..at]);
        state = state.toggle();
        rest = &rest[at + len..];
    }

    Scan {
        runs,
        balanced: state == Span::Outer,
    }
}

fn push_run<'a>(runs: &mut Vec<(Span, &'a str)>, state: Span, run: &'a str) {
    if !run.is_empty() {
        runs.push((state, run));
    }
}
