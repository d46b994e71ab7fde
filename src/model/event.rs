use serde::{Deserialize, Serialize};

use crate::model::buffer::TextBuffer;

/// A position in the document. Lines and columns are 1-based; column 1 sits
/// before the first byte of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line_number: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line_number: usize, column: usize) -> Self {
        Position {
            line_number,
            column,
        }
    }

    pub fn is_before(&self, other: Position) -> bool {
        *self < other
    }
}

/// A (possibly empty) span between two positions, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start_line_number: usize,
    pub start_column: usize,
    pub end_line_number: usize,
    pub end_column: usize,
}

impl Range {
    pub fn new(
        start_line_number: usize,
        start_column: usize,
        end_line_number: usize,
        end_column: usize,
    ) -> Self {
        Range {
            start_line_number,
            start_column,
            end_line_number,
            end_column,
        }
    }

    pub fn from_positions(start: Position, end: Position) -> Self {
        Range {
            start_line_number: start.line_number,
            start_column: start.column,
            end_line_number: end.line_number,
            end_column: end.column,
        }
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line_number, self.start_column)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line_number, self.end_column)
    }

    pub fn is_empty(&self) -> bool {
        self.start_line_number == self.end_line_number && self.start_column == self.end_column
    }
}

/// A single ranged replacement handed to `TextBuffer::apply_edits`.
///
/// `text: None` (or an empty string) deletes the range; an empty range with
/// text inserts. `identifier` is opaque and travels to the matching reverse
/// edit untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditOperation {
    pub identifier: Option<String>,
    pub range: Range,
    pub text: Option<String>,
    /// Markers sitting at the range edges move with the inserted text.
    pub force_move_markers: bool,
    /// The edit is auto-inserted indentation, eligible for trimming on the
    /// next edit when the line stays whitespace-only.
    pub is_auto_whitespace_edit: bool,
}

impl Default for Range {
    fn default() -> Self {
        Range::new(1, 1, 1, 1)
    }
}

/// The inverse of one applied operation; applying the reverse batch restores
/// the pre-edit document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseEdit {
    pub identifier: Option<String>,
    pub range: Range,
    pub text: Option<String>,
    pub force_move_markers: bool,
}

/// How lines changed after an edit, delivered to observers. Line numbers
/// refer to the buffer state at the moment the event was synthesised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentChange {
    /// A line's content was replaced in place.
    LineChanged {
        line_number: usize,
        content: String,
    },
    /// Lines `from_line_number..=to_line_number` were removed.
    LinesDeleted {
        from_line_number: usize,
        to_line_number: usize,
    },
    /// New lines appeared; `content` joins them with `\n`.
    LinesInserted {
        from_line_number: usize,
        to_line_number: usize,
        content: String,
    },
}

/// Everything a caller needs after a batch edit: the inverse operations (for
/// an undo stack), the synthesised change events, and the lines still
/// eligible for auto-whitespace trimming.
#[derive(Debug, Clone)]
pub struct ApplyEditsResult {
    pub reverse_edits: Vec<ReverseEdit>,
    pub changes: Vec<ContentChange>,
    pub trim_auto_whitespace_line_numbers: Option<Vec<usize>>,
}

/// Observer of committed edits. The buffer is already in its post-edit state
/// when the callback runs; implementations may read it but must not mutate.
pub trait ContentChangeListener {
    fn on_content_changed(&mut self, buffer: &TextBuffer, changes: &[ContentChange]);
}
