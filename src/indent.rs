//! Indentation guessing: inspect the leading whitespace of a document's
//! lines and pick the most plausible `(insert_spaces, tab_size)` pair.

use crate::model::buffer::TextBuffer;

/// Narrow read interface the guesser works against, so it can run over any
/// line-addressable text, not just a [`TextBuffer`].
pub trait LineSource {
    fn line_count(&self) -> usize;
    fn line_content(&self, line_number: usize) -> String;
}

impl LineSource for TextBuffer {
    fn line_count(&self) -> usize {
        TextBuffer::line_count(self)
    }

    fn line_content(&self, line_number: usize) -> String {
        TextBuffer::line_content(self, line_number).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndentationGuess {
    pub insert_spaces: bool,
    pub tab_size: usize,
}

/// Only this many lines are inspected; beyond that the sample is
/// representative anyway.
const MAX_LINES_TO_INSPECT: usize = 10_000;

/// Indentation deltas above this are treated as alignment noise.
const MAX_SPACES_DIFF: usize = 8;

const ALLOWED_TAB_SIZE_GUESSES: [usize; 4] = [2, 4, 6, 8];

/// Guess the indentation convention of `source`.
///
/// Each non-blank line's leading whitespace is compared with the previous
/// non-blank line; the per-pair space difference votes into a bucket. Lines
/// indented with spaces vs tabs decide `insert_spaces` (falling back to the
/// default on a tie), and the strongest bucket above the threshold decides
/// the tab size.
pub fn guess_indentation(
    source: &dyn LineSource,
    default_tab_size: usize,
    default_insert_spaces: bool,
) -> IndentationGuess {
    let line_count = source.line_count().min(MAX_LINES_TO_INSPECT);

    let mut lines_indented_with_tabs = 0usize;
    let mut lines_indented_with_spaces = 0usize;
    let mut previous_line_text = String::new();
    let mut previous_line_indentation = 0usize;
    let mut spaces_diff_count = [0usize; MAX_SPACES_DIFF + 1];

    for line_number in 1..=line_count {
        let line_text = source.line_content(line_number);
        let bytes = line_text.as_bytes();

        let mut current_line_has_content = false;
        let mut current_line_indentation = 0usize;
        let mut space_count = 0usize;
        let mut tab_count = 0usize;
        for &byte in bytes {
            match byte {
                b' ' => space_count += 1,
                b'\t' => tab_count += 1,
                _ => {
                    current_line_has_content = true;
                    break;
                }
            }
            current_line_indentation += 1;
        }

        // Blank and whitespace-only lines carry no signal.
        if !current_line_has_content {
            continue;
        }

        if tab_count > 0 {
            lines_indented_with_tabs += 1;
        } else if space_count > 1 {
            lines_indented_with_spaces += 1;
        }

        let current_spaces_diff = spaces_diff(
            previous_line_text.as_bytes(),
            previous_line_indentation,
            bytes,
            current_line_indentation,
        );
        if current_spaces_diff > 0 && current_spaces_diff <= MAX_SPACES_DIFF {
            spaces_diff_count[current_spaces_diff] += 1;
        }

        previous_line_text = line_text;
        previous_line_indentation = current_line_indentation;
    }

    let insert_spaces = if lines_indented_with_spaces != lines_indented_with_tabs {
        lines_indented_with_spaces > lines_indented_with_tabs
    } else {
        default_insert_spaces
    };

    let mut tab_size = default_tab_size;
    // Overriding the default needs real evidence when tabs are in play.
    let mut tab_size_score = if insert_spaces {
        0.0
    } else {
        0.1 * line_count as f64
    };
    for &candidate in &ALLOWED_TAB_SIZE_GUESSES {
        let score = spaces_diff_count[candidate] as f64;
        if score > tab_size_score {
            tab_size_score = score;
            tab_size = candidate;
        }
    }

    IndentationGuess {
        insert_spaces,
        tab_size,
    }
}

/// The indentation delta between two lines, in "units": the remaining
/// leading whitespace after the common prefix, expressed as spaces when the
/// lines use spaces and as spaces-per-tab when they differ by tabs. Mixed
/// space/tab remainders carry no signal and yield 0.
fn spaces_diff(a: &[u8], a_length: usize, b: &[u8], b_length: usize) -> usize {
    let mut i = 0;
    while i < a_length && i < b_length && a[i] == b[i] {
        i += 1;
    }

    let mut a_spaces = 0usize;
    let mut a_tabs = 0usize;
    for &byte in &a[i..a_length] {
        if byte == b' ' {
            a_spaces += 1;
        } else {
            a_tabs += 1;
        }
    }
    let mut b_spaces = 0usize;
    let mut b_tabs = 0usize;
    for &byte in &b[i..b_length] {
        if byte == b' ' {
            b_spaces += 1;
        } else {
            b_tabs += 1;
        }
    }

    if a_spaces > 0 && a_tabs > 0 {
        return 0;
    }
    if b_spaces > 0 && b_tabs > 0 {
        return 0;
    }

    let tabs_diff = a_tabs.abs_diff(b_tabs);
    let spaces_diff = a_spaces.abs_diff(b_spaces);
    if tabs_diff == 0 {
        return spaces_diff;
    }
    if spaces_diff % tabs_diff == 0 {
        return spaces_diff / tabs_diff;
    }
    0
}
