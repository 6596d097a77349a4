//! Error types.
//!
//! Mirrors the shape of the original engine's `grrRetValue` return codes
//! (`BAD_ARGS`, `NOT_FOUND`, `OUT_OF_MEMORY`, `BAD_DATA`) but as a proper
//! `std::error::Error` enum instead of an integer, following the
//! `thiserror`-derived error style used throughout `jsinger67-scnr`.

use thiserror::Error;

/// Everything that can go wrong compiling or running a pattern.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-level contract was violated (empty pattern, pattern
    /// containing a byte outside printable ASCII/tab, lookahead operand not
    /// anchored at the end of the pattern, etc).
    #[error("bad argument: {0}")]
    BadArgs(String),

    /// The pattern text itself couldn't be parsed as a regular expression.
    /// `column` is the 0-based byte offset into the pattern where the
    /// problem was detected.
    #[error("malformed pattern at column {column}: {message}")]
    BadData { column: usize, message: String },

    /// A match or search operation found nothing.
    #[error("no match found")]
    NotFound,

    /// The compiled automaton would need more states than fit in the
    /// motion-delta representation (`i32`).
    #[error("pattern too long to compile")]
    TooLong,

    /// A requested allocation could not be satisfied.
    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, Error>;
