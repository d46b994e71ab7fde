//! A text buffer built on a piece table indexed by an order-statistic
//! red-black tree.
//!
//! The original document text stays immutable; typed text lands in an
//! append-only change buffer, and the tree's nodes describe the document as
//! an ordered sequence of pieces into the two buffers. Per-node subtree byte
//! and line-feed summaries give O(log N) lookups by byte offset or by
//! (line, column), and O(log N + k) range reads.
//!
//! On top of the tree, [`TextBuffer::apply_edits`] validates, orders and
//! executes batches of ranged replacements, handing back inverse operations
//! for undo together with line-level change events for observers.

pub mod indent;
pub mod model;

pub use indent::{guess_indentation, IndentationGuess, LineSource};
pub use model::buffer::{BufferError, TextBuffer};
pub use model::event::{
    ApplyEditsResult, ContentChange, ContentChangeListener, EditOperation, Position, Range,
    ReverseEdit,
};
pub use model::piece_tree::{BufferKind, PieceTree, TreeStats};
pub use model::source::{LineEnding, TextSource};
