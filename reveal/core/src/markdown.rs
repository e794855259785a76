//! Markdown Stability Splitting
//!
//! A reply revealed one character at a time will, at most points, end in the
//! middle of an inline markup span. Rendering such a prefix produces visible
//! garbage (a lone `**` styling the rest of the line, an unclosed backtick
//! swallowing everything after it). This module decides where a growing
//! prefix stops being safe to render.
//!
//! # Design Philosophy
//!
//! The splitter is a heuristic, not a parser. It counts the three inline
//! delimiters that matter in practice and withholds the tail of the text
//! from the earliest point where an unterminated span could begin. When in
//! doubt it fails *open*: a briefly odd-looking render is tolerable, text
//! withheld forever is not.

/// A prefix of rich text divided into a renderable head and a withheld tail.
///
/// Invariant: `stable` followed by `unstable` is exactly the input text.
/// Both halves borrow from the input and split on a char boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StableSplit<'a> {
    /// Prefix safe to hand to a markdown renderer.
    pub stable: &'a str,
    /// Trailing remainder that may open an unterminated span; withheld from
    /// formatted rendering until more text confirms its markup is closed.
    pub unstable: &'a str,
}

impl<'a> StableSplit<'a> {
    /// A split that treats the entire text as stable.
    #[must_use]
    pub fn all_stable(text: &'a str) -> Self {
        Self {
            stable: text,
            unstable: "",
        }
    }
}

/// Per-delimiter tallies gathered in a single pass over the text.
#[derive(Clone, Copy, Debug, Default)]
struct DelimiterScan {
    /// Total backtick occurrences.
    backticks: usize,
    /// Non-overlapping `**` occurrences.
    bolds: usize,
    /// Total `*` occurrences, including those consumed by bold markers.
    asterisks: usize,
    /// Byte offset of the last backtick, if any.
    last_backtick: Option<usize>,
    /// Byte offset of the last `**` occurrence, if any.
    last_bold: Option<usize>,
    /// Byte offset of the last `*`, if any.
    last_asterisk: Option<usize>,
}

impl DelimiterScan {
    fn run(text: &str) -> Self {
        let mut scan = Self::default();
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'`' => {
                    scan.backticks += 1;
                    scan.last_backtick = Some(i);
                    i += 1;
                }
                b'*' => {
                    scan.asterisks += 1;
                    scan.last_asterisk = Some(i);
                    if bytes.get(i + 1) == Some(&b'*') {
                        // Consume the pair as one bold marker.
                        scan.bolds += 1;
                        scan.last_bold = Some(i);
                        scan.asterisks += 1;
                        scan.last_asterisk = Some(i + 1);
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }
        scan
    }

    /// Italic tally: single asterisks, excluding those consumed by bolds.
    fn italics(&self) -> usize {
        self.asterisks - self.bolds * 2
    }

    fn balanced(&self) -> bool {
        self.backticks % 2 == 0 && self.bolds % 2 == 0 && self.italics() % 2 == 0
    }

    /// Earliest of the last-occurrence offsets of the delimiters present.
    fn cutoff(&self) -> Option<usize> {
        [self.last_backtick, self.last_bold, self.last_asterisk]
            .into_iter()
            .flatten()
            .min()
    }
}

/// Split `text` into a stable prefix and an unstable suffix.
///
/// The unstable suffix is non-empty only when at least one tracked delimiter
/// kind (backtick, `**`, bold-excluded `*`) occurs an odd number of times in
/// the whole text. The cutoff is the minimum of the last-occurrence offsets
/// of the delimiter substrings present in the text, the earliest point from
/// which an unterminated span could begin. The minimum over independent
/// delimiter kinds is a heuristic and is knowingly imprecise for nested
/// markup (a backtick inside an unterminated bold span); in every degenerate
/// case the whole text is treated as stable.
///
/// Cost is O(len) in a single pass. Callers re-split a growing prefix on
/// every reveal tick; the total quadratic cost is accepted because per-call
/// cost is linear and tick counts are bounded by the reply length.
#[must_use]
pub fn split_stable(text: &str) -> StableSplit<'_> {
    let scan = DelimiterScan::run(text);
    if scan.balanced() {
        return StableSplit::all_stable(text);
    }

    match scan.cutoff() {
        Some(cutoff) if cutoff < text.len() => {
            let (stable, unstable) = text.split_at(cutoff);
            StableSplit { stable, unstable }
        }
        // No candidate offset, or a cutoff out of range: fail open.
        _ => StableSplit::all_stable(text),
    }
}
