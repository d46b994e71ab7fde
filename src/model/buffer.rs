use regex::bytes::Regex;

use crate::model::event::{ContentChange, ContentChangeListener, Position, Range};
use crate::model::piece_tree::{PieceTree, TreeStats};
use crate::model::source::{contains_rtl, is_basic_ascii, LineEnding, TextSource};

/// Errors surfaced at the buffer boundary.
///
/// Boundary misuse (line 0, column 0, positions outside the document) is a
/// contract violation and fails; nothing is silently clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Two edits in one batch intersect.
    OverlappingRanges,
    /// A position or range does not exist in the document.
    InvalidRange { range: Range },
    /// A byte offset lies past the end of the document.
    InvalidOffset { offset: usize, length: usize },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::OverlappingRanges => {
                write!(f, "Overlapping ranges are not allowed")
            }
            BufferError::InvalidRange { range } => {
                write!(
                    f,
                    "Invalid range: ({},{}) -> ({},{})",
                    range.start_line_number,
                    range.start_column,
                    range.end_line_number,
                    range.end_column
                )
            }
            BufferError::InvalidOffset { offset, length } => {
                write!(f, "Invalid offset {} in document of length {}", offset, length)
            }
        }
    }
}

impl std::error::Error for BufferError {}

/// A text buffer that manages document content as a piece table indexed by
/// a red-black tree with line tracking.
///
/// The buffer is single-threaded and non-reentrant; every call completes
/// synchronously. Observers receiving change events may read the buffer from
/// the callback but must not mutate it.
pub struct TextBuffer {
    pub(crate) tree: PieceTree,

    /// Byte-order mark stripped from the source, kept for embedders that
    /// persist the document.
    bom: &'static str,
    eol: LineEnding,

    /// Sticky hints: once true they stay true, and a scan is only paid while
    /// they are still false.
    pub(crate) might_contain_rtl: bool,
    pub(crate) might_contain_non_basic_ascii: bool,

    version: u64,

    listener: Option<Box<dyn ContentChangeListener>>,
}

impl TextBuffer {
    pub fn from_source(source: TextSource) -> Self {
        TextBuffer {
            bom: source.bom,
            eol: source.eol,
            might_contain_rtl: source.contains_rtl,
            might_contain_non_basic_ascii: !source.is_basic_ascii,
            tree: PieceTree::new(source.text),
            version: 0,
            listener: None,
        }
    }

    pub fn from_str(text: &str) -> Self {
        Self::from_source(TextSource::from_str(text))
    }

    pub fn empty() -> Self {
        Self::from_source(TextSource::empty())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Total byte length of the document.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.tree.line_count()
    }

    /// Monotonically increasing counter, bumped by every successful
    /// mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn bom(&self) -> &'static str {
        self.bom
    }

    pub fn eol(&self) -> LineEnding {
        self.eol
    }

    pub fn might_contain_rtl(&self) -> bool {
        self.might_contain_rtl
    }

    pub fn might_contain_non_basic_ascii(&self) -> bool {
        self.might_contain_non_basic_ascii
    }

    /// The whole document as a string.
    pub fn text(&self) -> String {
        self.tree.text()
    }

    pub fn stats(&self) -> TreeStats {
        self.tree.stats()
    }

    /// Assert every internal invariant of the underlying tree. Debug aid;
    /// panics on metadata drift or red-black violations.
    pub fn validate(&self) {
        self.tree.validate();
    }

    // ------------------------------------------------------------------
    // Single-operation mutations
    // ------------------------------------------------------------------

    /// Insert `text` at a byte offset.
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<(), BufferError> {
        if offset > self.len() {
            return Err(BufferError::InvalidOffset {
                offset,
                length: self.len(),
            });
        }
        if text.is_empty() {
            return Ok(());
        }
        self.scan_inserted_text(text);
        self.tree.insert(offset, text);
        self.mark_content_modified();
        Ok(())
    }

    /// Delete `count` bytes starting at a byte offset.
    pub fn delete(&mut self, offset: usize, count: usize) -> Result<(), BufferError> {
        let end = offset.checked_add(count);
        if end.map_or(true, |end| end > self.len()) {
            return Err(BufferError::InvalidOffset {
                offset: end.unwrap_or(usize::MAX),
                length: self.len(),
            });
        }
        if count == 0 {
            return Ok(());
        }
        self.tree.delete(offset, count);
        self.mark_content_modified();
        Ok(())
    }

    pub(crate) fn mark_content_modified(&mut self) {
        self.version += 1;
    }

    /// Keep the character-class hints current for freshly inserted text; the
    /// scan is skipped once a hint has latched.
    pub(crate) fn scan_inserted_text(&mut self, text: &str) {
        if !self.might_contain_non_basic_ascii && !is_basic_ascii(text) {
            self.might_contain_non_basic_ascii = true;
        }
        if !self.might_contain_rtl && contains_rtl(text) {
            self.might_contain_rtl = true;
        }
    }

    // ------------------------------------------------------------------
    // Position mapping
    // ------------------------------------------------------------------

    /// Byte offset of a validated position.
    pub fn offset_at(&self, position: Position) -> Result<usize, BufferError> {
        self.validate_position(position)?;
        Ok(self.tree.offset_at(position.line_number, position.column))
    }

    /// Position of a byte offset; `offset == len()` maps to the position
    /// past the last byte.
    pub fn position_at(&self, offset: usize) -> Result<Position, BufferError> {
        if offset > self.len() {
            return Err(BufferError::InvalidOffset {
                offset,
                length: self.len(),
            });
        }
        let (line_number, column) = self.tree.position_at(offset);
        Ok(Position::new(line_number, column))
    }

    /// The range covering `length` bytes starting at `offset`.
    pub fn range_at(&self, offset: usize, length: usize) -> Result<Range, BufferError> {
        let start = self.position_at(offset)?;
        let end = self.position_at(offset + length)?;
        Ok(Range::from_positions(start, end))
    }

    /// Text between the bounds of a validated range.
    pub fn text_in_range(&self, range: Range) -> Result<String, BufferError> {
        self.validate_range(range)?;
        let bytes = self.tree.bytes_in_position_range(
            range.start_line_number,
            range.start_column,
            range.end_line_number,
            range.end_column,
        );
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub(crate) fn validate_position(&self, position: Position) -> Result<(), BufferError> {
        let invalid = BufferError::InvalidRange {
            range: Range::from_positions(position, position),
        };
        if position.line_number < 1 || position.line_number > self.line_count() {
            return Err(invalid);
        }
        if position.column < 1 {
            return Err(invalid);
        }
        if position.column > self.line_length_unchecked(position.line_number) + 1 {
            return Err(invalid);
        }
        Ok(())
    }

    pub(crate) fn validate_range(&self, range: Range) -> Result<(), BufferError> {
        self.validate_position(range.start())
            .and(self.validate_position(range.end()))
            .map_err(|_| BufferError::InvalidRange { range })?;
        if range.end() < range.start() {
            return Err(BufferError::InvalidRange { range });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Line reads
    // ------------------------------------------------------------------

    /// Content of a 1-based line, without its line terminator.
    pub fn line_content(&self, line_number: usize) -> Result<String, BufferError> {
        if line_number < 1 || line_number > self.line_count() {
            return Err(BufferError::InvalidRange {
                range: Range::new(line_number, 1, line_number, 1),
            });
        }
        let mut bytes = self.tree.line_bytes(line_number);
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Byte length of a line, excluding its terminator.
    pub fn line_length(&self, line_number: usize) -> Result<usize, BufferError> {
        self.line_content(line_number).map(|c| c.len())
    }

    fn line_length_unchecked(&self, line_number: usize) -> usize {
        let mut bytes = self.tree.line_bytes(line_number);
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        bytes.len()
    }

    pub fn line_min_column(&self, _line_number: usize) -> usize {
        1
    }

    pub fn line_max_column(&self, line_number: usize) -> Result<usize, BufferError> {
        Ok(self.line_length(line_number)? + 1)
    }

    /// Column of the first non-whitespace character, or 0 when the line is
    /// blank or whitespace-only.
    pub fn line_first_non_whitespace_column(
        &self,
        line_number: usize,
    ) -> Result<usize, BufferError> {
        let content = self.line_content(line_number)?;
        Ok(match content.bytes().position(|b| b != b' ' && b != b'\t') {
            Some(index) => index + 1,
            None => 0,
        })
    }

    /// Column just past the last non-whitespace character, or 0 when the
    /// line is blank or whitespace-only.
    pub fn line_last_non_whitespace_column(
        &self,
        line_number: usize,
    ) -> Result<usize, BufferError> {
        let content = self.line_content(line_number)?;
        Ok(match content.bytes().rposition(|b| b != b' ' && b != b'\t') {
            Some(index) => index + 2,
            None => 0,
        })
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Find the next literal occurrence of `pattern`, wrapping around the
    /// end of the document.
    pub fn find_next(&self, pattern: &str, start_offset: usize) -> Option<usize> {
        if pattern.is_empty() {
            return None;
        }
        let pattern = pattern.as_bytes();
        let len = self.len();
        if start_offset < len {
            if let Some(offset) = self.find_pattern(start_offset, len, pattern) {
                return Some(offset);
            }
        }
        if start_offset > 0 {
            if let Some(offset) = self.find_pattern(0, start_offset, pattern) {
                return Some(offset);
            }
        }
        None
    }

    /// Find the next regex match, wrapping around the end of the document.
    pub fn find_next_regex(&self, regex: &Regex, start_offset: usize) -> Option<usize> {
        let len = self.len();
        if start_offset < len {
            let haystack = self.tree.bytes_in_range(start_offset, len);
            if let Some(m) = regex.find(&haystack) {
                return Some(start_offset + m.start());
            }
        }
        if start_offset > 0 {
            let haystack = self.tree.bytes_in_range(0, start_offset);
            if let Some(m) = regex.find(&haystack) {
                return Some(m.start());
            }
        }
        None
    }

    /// Scan `[start, end)` in overlapping chunks so matches spanning chunk
    /// boundaries are still found, without materialising the whole span.
    fn find_pattern(&self, start: usize, end: usize, pattern: &[u8]) -> Option<usize> {
        const CHUNK_SIZE: usize = 64 * 1024;
        if start >= end {
            return None;
        }
        let overlap = pattern.len().saturating_sub(1);
        let mut pos = start;
        loop {
            let window_end = (pos + CHUNK_SIZE + overlap).min(end);
            let haystack = self.tree.bytes_in_range(pos, window_end);
            if let Some(i) = find_in_bytes(&haystack, pattern) {
                return Some(pos + i);
            }
            if window_end == end {
                return None;
            }
            pos = window_end - overlap;
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn set_content_change_listener(&mut self, listener: Box<dyn ContentChangeListener>) {
        self.listener = Some(listener);
    }

    pub fn clear_content_change_listener(&mut self) {
        self.listener = None;
    }

    /// Deliver events after commit. The listener is moved out for the call
    /// so it can read the buffer through `&self`.
    pub(crate) fn notify_content_changed(&mut self, changes: &[ContentChange]) {
        if changes.is_empty() {
            return;
        }
        if let Some(mut listener) = self.listener.take() {
            listener.on_content_changed(self, changes);
            self.listener = Some(listener);
        }
    }
}

impl std::fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBuffer")
            .field("len", &self.len())
            .field("line_count", &self.line_count())
            .field("version", &self.version)
            .field("eol", &self.eol)
            .finish()
    }
}

/// Naive byte pattern search; chunk sizes keep the haystacks small.
fn find_in_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
