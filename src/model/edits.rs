//! Batch edit application: validation, ordering, inverse computation and
//! event synthesis on top of the piece tree's low-level mutations.

use std::cmp::Ordering;

use crate::model::buffer::{BufferError, TextBuffer};
use crate::model::event::{
    ApplyEditsResult, ContentChange, EditOperation, Range, ReverseEdit,
};
use crate::model::source::{contains_rtl, is_basic_ascii};

/// One operation after validation: its byte geometry is resolved and its
/// replacement text is split into lines.
#[derive(Debug, Clone)]
struct ValidatedEdit {
    sort_index: usize,
    identifier: Option<String>,
    range: Range,
    range_offset: usize,
    range_length: usize,
    /// Replacement split at `\r\n`, `\r` or `\n`; `None` for a pure delete.
    lines: Option<Vec<String>>,
    force_move_markers: bool,
    is_auto_whitespace_edit: bool,
}

impl TextBuffer {
    /// Validate and execute a batch of ranged replacements.
    ///
    /// The whole batch is checked before anything is mutated: an invalid or
    /// overlapping range leaves the buffer untouched. Application then runs
    /// from the highest range to the lowest so recorded byte offsets stay
    /// valid throughout. The result carries the inverse operations, the
    /// synthesised change events (also delivered to the registered
    /// listener), and the auto-whitespace trim candidates when requested.
    pub fn apply_edits(
        &mut self,
        operations: &[EditOperation],
        record_trim_auto_whitespace: bool,
    ) -> Result<ApplyEditsResult, BufferError> {
        let mut might_contain_rtl = self.might_contain_rtl;
        let mut might_contain_non_basic_ascii = self.might_contain_non_basic_ascii;

        let mut edits: Vec<ValidatedEdit> = Vec::with_capacity(operations.len());
        for (sort_index, op) in operations.iter().enumerate() {
            self.validate_range(op.range)?;
            if let Some(text) = op.text.as_deref() {
                if !text.is_empty() {
                    if !might_contain_rtl {
                        might_contain_rtl = contains_rtl(text);
                    }
                    if !might_contain_non_basic_ascii {
                        might_contain_non_basic_ascii = !is_basic_ascii(text);
                    }
                }
            }
            let range_offset = self
                .tree
                .offset_at(op.range.start_line_number, op.range.start_column);
            let range_end = self
                .tree
                .offset_at(op.range.end_line_number, op.range.end_column);
            edits.push(ValidatedEdit {
                sort_index,
                identifier: op.identifier.clone(),
                range: op.range,
                range_offset,
                range_length: range_end - range_offset,
                lines: op
                    .text
                    .as_deref()
                    .filter(|text| !text.is_empty())
                    .map(split_lines),
                force_move_markers: op.force_move_markers,
                is_auto_whitespace_edit: op.is_auto_whitespace_edit,
            });
        }

        edits.sort_by(sort_ops_ascending);
        for pair in edits.windows(2) {
            if pair[1].range.start().is_before(pair[0].range.end()) {
                tracing::warn!("Rejected edit batch: overlapping ranges");
                return Err(BufferError::OverlappingRanges);
            }
        }

        tracing::debug!(
            "Applying {} edit operations at version {}",
            edits.len(),
            self.version()
        );

        let reverse_ranges = compute_inverse_ranges(&edits);

        // Lines that might be auto-whitespace removal candidates on the next
        // edit, captured with their pre-edit content.
        let mut trim_candidates: Vec<(usize, String)> = Vec::new();
        if record_trim_auto_whitespace {
            for (edit, reverse_range) in edits.iter().zip(&reverse_ranges) {
                if !(edit.is_auto_whitespace_edit && edit.range.is_empty()) {
                    continue;
                }
                for line_number in
                    reverse_range.start_line_number..=reverse_range.end_line_number
                {
                    let mut current = String::new();
                    if line_number == reverse_range.start_line_number {
                        current = self
                            .line_content(edit.range.start_line_number)
                            .unwrap_or_default();
                        if first_non_whitespace_index(&current).is_some() {
                            continue;
                        }
                    }
                    trim_candidates.push((line_number, current));
                }
            }
        }

        let mut indexed_reverse: Vec<(usize, ReverseEdit)> = Vec::with_capacity(edits.len());
        for (edit, reverse_range) in edits.iter().zip(&reverse_ranges) {
            let deleted = self.text_in_range(edit.range).unwrap_or_default();
            indexed_reverse.push((
                edit.sort_index,
                ReverseEdit {
                    identifier: edit.identifier.clone(),
                    range: *reverse_range,
                    text: if deleted.is_empty() {
                        None
                    } else {
                        Some(deleted)
                    },
                    force_move_markers: edit.force_move_markers,
                },
            ));
        }
        indexed_reverse.sort_by_key(|(sort_index, _)| *sort_index);
        let reverse_edits = indexed_reverse
            .into_iter()
            .map(|(_, reverse)| reverse)
            .collect();

        self.might_contain_rtl = might_contain_rtl;
        self.might_contain_non_basic_ascii = might_contain_non_basic_ascii;

        let changes = self.do_apply_edits(&mut edits);

        let trim_auto_whitespace_line_numbers =
            if record_trim_auto_whitespace && !trim_candidates.is_empty() {
                trim_candidates.sort_by(|a, b| b.0.cmp(&a.0));
                let mut kept = Vec::new();
                for i in 0..trim_candidates.len() {
                    let (line_number, old_content) = &trim_candidates[i];
                    if i > 0 && trim_candidates[i - 1].0 == *line_number {
                        continue;
                    }
                    let line_content = self.line_content(*line_number).unwrap_or_default();
                    if line_content.is_empty()
                        || line_content == *old_content
                        || first_non_whitespace_index(&line_content).is_some()
                    {
                        continue;
                    }
                    kept.push(*line_number);
                }
                Some(kept)
            } else {
                None
            };

        let result = ApplyEditsResult {
            reverse_edits,
            changes,
            trim_auto_whitespace_line_numbers,
        };
        self.notify_content_changed(&result.changes);
        Ok(result)
    }

    /// Apply the validated batch from the highest range downwards and
    /// synthesise per-operation change events against the in-progress
    /// buffer state.
    fn do_apply_edits(&mut self, edits: &mut Vec<ValidatedEdit>) -> Vec<ContentChange> {
        edits.sort_by(sort_ops_descending);

        let mut changes = Vec::new();
        let mut applied_any = false;
        let eol = self.eol().as_str();

        for edit in edits.iter() {
            let start_line_number = edit.range.start_line_number;
            let end_line_number = edit.range.end_line_number;

            // An empty range with no replacement is a no-op and produces no
            // events.
            if edit.range.is_empty() && edit.lines.is_none() {
                continue;
            }
            applied_any = true;

            let deleting_lines_cnt = end_line_number - start_line_number;
            let inserting_lines_cnt = edit.lines.as_ref().map_or(0, |lines| lines.len() - 1);
            let editing_lines_cnt = deleting_lines_cnt.min(inserting_lines_cnt);

            if edit.range_length > 0 {
                self.tree.delete(edit.range_offset, edit.range_length);
            }
            if let Some(lines) = &edit.lines {
                // Inserted text adopts the buffer's line ending.
                let text = lines.join(eol);
                self.tree.insert(edit.range_offset, &text);
            }

            for line_number in start_line_number..=start_line_number + editing_lines_cnt {
                changes.push(ContentChange::LineChanged {
                    line_number,
                    content: self.line_content(line_number).unwrap_or_default(),
                });
            }
            if deleting_lines_cnt > editing_lines_cnt {
                changes.push(ContentChange::LinesDeleted {
                    from_line_number: start_line_number + editing_lines_cnt + 1,
                    to_line_number: end_line_number,
                });
            }
            if inserting_lines_cnt > editing_lines_cnt {
                if let Some(lines) = &edit.lines {
                    changes.push(ContentChange::LinesInserted {
                        from_line_number: start_line_number + editing_lines_cnt + 1,
                        to_line_number: start_line_number + inserting_lines_cnt,
                        content: lines[editing_lines_cnt + 1..].join("\n"),
                    });
                }
            }
        }

        if applied_any {
            self.mark_content_modified();
        }
        changes
    }
}

fn sort_ops_ascending(a: &ValidatedEdit, b: &ValidatedEdit) -> Ordering {
    (a.range.end(), a.sort_index).cmp(&(b.range.end(), b.sort_index))
}

fn sort_ops_descending(a: &ValidatedEdit, b: &ValidatedEdit) -> Ordering {
    sort_ops_ascending(b, a)
}

/// Where each edit's replacement will sit after the whole batch applies.
///
/// Edits arrive sorted ascending. Each result start is the edit's start
/// shifted by the accumulated delta of the previous edit: a column shift
/// when both sit on the same line, a line shift otherwise. The end follows
/// from the inserted content's width.
fn compute_inverse_ranges(edits: &[ValidatedEdit]) -> Vec<Range> {
    let mut result = Vec::with_capacity(edits.len());
    let mut prev: Option<(&ValidatedEdit, usize, usize)> = None;

    for edit in edits {
        let (start_line_number, start_column) = match prev {
            Some((prev_op, prev_end_line, prev_end_column)) => {
                if prev_op.range.end_line_number == edit.range.start_line_number {
                    (
                        prev_end_line,
                        prev_end_column + (edit.range.start_column - prev_op.range.end_column),
                    )
                } else {
                    (
                        prev_end_line
                            + (edit.range.start_line_number - prev_op.range.end_line_number),
                        edit.range.start_column,
                    )
                }
            }
            None => (edit.range.start_line_number, edit.range.start_column),
        };

        let range = match &edit.lines {
            Some(lines) => {
                let line_count = lines.len();
                let first_line_length = lines[0].len();
                let last_line_length = lines[line_count - 1].len();
                if line_count == 1 {
                    Range::new(
                        start_line_number,
                        start_column,
                        start_line_number,
                        start_column + first_line_length,
                    )
                } else {
                    Range::new(
                        start_line_number,
                        start_column,
                        start_line_number + line_count - 1,
                        last_line_length + 1,
                    )
                }
            }
            None => Range::new(
                start_line_number,
                start_column,
                start_line_number,
                start_column,
            ),
        };

        prev = Some((edit, range.end_line_number, range.end_column));
        result.push(range);
    }
    result
}

/// Split replacement text at any of `\r\n`, `\r` or `\n`.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => lines.push(std::mem::take(&mut current)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    lines.push(current);
    lines
}

/// Byte index of the first character that is neither space nor tab.
fn first_non_whitespace_index(text: &str) -> Option<usize> {
    text.bytes().position(|b| b != b' ' && b != b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::Position;

    fn replace(range: Range, text: &str) -> EditOperation {
        EditOperation {
            range,
            text: Some(text.to_string()),
            ..EditOperation::default()
        }
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a"), vec!["a"]);
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\nb\rc"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("a\n"), vec!["a", ""]);
    }

    #[test]
    fn test_single_replace() {
        let mut buffer = TextBuffer::from_str("hello world");
        let result = buffer
            .apply_edits(&[replace(Range::new(1, 7, 1, 12), "there")], false)
            .unwrap();
        assert_eq!(buffer.text(), "hello there");
        assert_eq!(result.reverse_edits.len(), 1);
        assert_eq!(result.reverse_edits[0].range, Range::new(1, 7, 1, 12));
        assert_eq!(result.reverse_edits[0].text.as_deref(), Some("world"));
        assert_eq!(
            result.changes,
            vec![ContentChange::LineChanged {
                line_number: 1,
                content: "hello there".to_string(),
            }]
        );
    }

    #[test]
    fn test_batch_with_reverse_roundtrip() {
        let mut buffer = TextBuffer::from_str("a\nb");
        let result = buffer
            .apply_edits(
                &[
                    replace(Range::new(1, 1, 1, 2), "HELLO"),
                    replace(Range::new(2, 1, 2, 2), "WORLD"),
                ],
                false,
            )
            .unwrap();
        assert_eq!(buffer.text(), "HELLO\nWORLD");

        let reverse: Vec<EditOperation> = result
            .reverse_edits
            .iter()
            .map(|r| EditOperation {
                identifier: r.identifier.clone(),
                range: r.range,
                text: r.text.clone(),
                force_move_markers: r.force_move_markers,
                is_auto_whitespace_edit: false,
            })
            .collect();
        buffer.apply_edits(&reverse, false).unwrap();
        assert_eq!(buffer.text(), "a\nb");
        assert_eq!(buffer.line_count(), 2);
    }

    #[test]
    fn test_overlapping_ranges_rejected_before_mutation() {
        let mut buffer = TextBuffer::from_str("abcdefgh");
        let version = buffer.version();
        let err = buffer
            .apply_edits(
                &[
                    replace(Range::new(1, 1, 1, 5), "x"),
                    replace(Range::new(1, 3, 1, 7), "y"),
                ],
                false,
            )
            .unwrap_err();
        assert_eq!(err, BufferError::OverlappingRanges);
        assert_eq!(buffer.text(), "abcdefgh");
        assert_eq!(buffer.version(), version);
    }

    #[test]
    fn test_touching_ranges_allowed() {
        let mut buffer = TextBuffer::from_str("abcd");
        buffer
            .apply_edits(
                &[
                    replace(Range::new(1, 1, 1, 3), "X"),
                    replace(Range::new(1, 3, 1, 5), "Y"),
                ],
                false,
            )
            .unwrap();
        assert_eq!(buffer.text(), "XY");
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut buffer = TextBuffer::from_str("ab");
        let err = buffer
            .apply_edits(&[replace(Range::new(1, 1, 2, 1), "x")], false)
            .unwrap_err();
        assert!(matches!(err, BufferError::InvalidRange { .. }));
        assert_eq!(buffer.text(), "ab");
    }

    #[test]
    fn test_noop_edit_changes_nothing() {
        let mut buffer = TextBuffer::from_str("abc");
        let version = buffer.version();
        let result = buffer
            .apply_edits(&[replace(Range::new(1, 2, 1, 2), "")], false)
            .unwrap();
        assert!(result.changes.is_empty());
        assert_eq!(buffer.text(), "abc");
        assert_eq!(buffer.version(), version);
    }

    #[test]
    fn test_multi_line_insert_events() {
        let mut buffer = TextBuffer::from_str("one\ntwo");
        let result = buffer
            .apply_edits(&[replace(Range::new(1, 4, 1, 4), "\nalpha\nbeta")], false)
            .unwrap();
        assert_eq!(buffer.text(), "one\nalpha\nbeta\ntwo");
        assert_eq!(
            result.changes,
            vec![
                ContentChange::LineChanged {
                    line_number: 1,
                    content: "one".to_string(),
                },
                ContentChange::LinesInserted {
                    from_line_number: 2,
                    to_line_number: 3,
                    content: "alpha\nbeta".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_multi_line_delete_events() {
        let mut buffer = TextBuffer::from_str("one\ntwo\nthree");
        let result = buffer
            .apply_edits(&[replace(Range::new(1, 2, 3, 3), "")], false)
            .unwrap();
        assert_eq!(buffer.text(), "oree");
        assert_eq!(
            result.changes,
            vec![
                ContentChange::LineChanged {
                    line_number: 1,
                    content: "oree".to_string(),
                },
                ContentChange::LinesDeleted {
                    from_line_number: 2,
                    to_line_number: 3,
                },
            ]
        );
    }

    #[test]
    fn test_inverse_ranges_single_and_multi_line() {
        let mut buffer = TextBuffer::from_str("abcdef\nxyz");
        let result = buffer
            .apply_edits(
                &[
                    replace(Range::new(1, 1, 1, 3), "12"),
                    replace(Range::new(1, 5, 1, 5), "A\nBB"),
                ],
                false,
            )
            .unwrap();
        assert_eq!(buffer.text(), "12cdA\nBBef\nxyz");
        assert_eq!(result.reverse_edits[0].range, Range::new(1, 1, 1, 3));
        assert_eq!(result.reverse_edits[1].range, Range::new(1, 5, 2, 3));
    }

    #[test]
    fn test_trim_auto_whitespace_candidates() {
        // Pressing enter at the end of "fn x() {" auto-indents the new line;
        // the indentation-only line is reported as a trim candidate.
        let mut buffer = TextBuffer::from_str("fn x() {\n}");
        let op = EditOperation {
            range: Range::new(1, 9, 1, 9),
            text: Some("\n    ".to_string()),
            is_auto_whitespace_edit: true,
            ..EditOperation::default()
        };
        let result = buffer.apply_edits(&[op], true).unwrap();
        assert_eq!(buffer.text(), "fn x() {\n    \n}");
        assert_eq!(result.trim_auto_whitespace_line_numbers, Some(vec![2]));
    }

    #[test]
    fn test_trim_skips_lines_with_content() {
        let mut buffer = TextBuffer::from_str("abc");
        let op = EditOperation {
            range: Range::new(1, 4, 1, 4),
            text: Some("\nreal content".to_string()),
            is_auto_whitespace_edit: true,
            ..EditOperation::default()
        };
        let result = buffer.apply_edits(&[op], true).unwrap();
        let trimmed = result.trim_auto_whitespace_line_numbers.unwrap();
        assert!(trimmed.is_empty());
    }

    #[test]
    fn test_listener_sees_post_commit_state() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Recorder {
            seen: Rc<RefCell<Vec<(String, usize)>>>,
        }
        impl crate::model::event::ContentChangeListener for Recorder {
            fn on_content_changed(
                &mut self,
                buffer: &TextBuffer,
                changes: &[ContentChange],
            ) {
                self.seen
                    .borrow_mut()
                    .push((buffer.text(), changes.len()));
            }
        }

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut buffer = TextBuffer::from_str("ab");
        buffer.set_content_change_listener(Box::new(Recorder { seen: Rc::clone(&seen) }));
        buffer
            .apply_edits(&[replace(Range::new(1, 1, 1, 2), "X")], false)
            .unwrap();
        assert_eq!(seen.borrow().as_slice(), &[("Xb".to_string(), 1)]);
    }

    #[test]
    fn test_positions_used_by_sorting() {
        // Ties on the end position keep the caller's order.
        let mut buffer = TextBuffer::from_str("abc");
        let result = buffer
            .apply_edits(
                &[
                    replace(Range::new(1, 2, 1, 2), "1"),
                    replace(Range::new(1, 2, 1, 2), "2"),
                ],
                false,
            )
            .unwrap();
        assert_eq!(buffer.text(), "a12bc");
        assert_eq!(result.reverse_edits[0].range.start(), Position::new(1, 2));
    }
}
