//! A small regular-expression engine built around a dense, motion-delta
//! NFA representation: pattern text compiles once into an [`Nfa`], which can
//! then be checked for an exact match, searched for the longest matching
//! span, or raced against sibling patterns via [`first_match`].
//!
//! Supported syntax: grouping `(...)`, alternation `|`, concatenation,
//! the `?`/`+`/`*`/`{n}` quantifiers, character classes `[...]`/`[^...]`
//! with ranges, the `.` wildcard, the `^`/`$` anchors, and a trailing
//! lookahead assertion `/X`. The accepted alphabet is printable ASCII plus
//! tab; there is no Unicode support, no capture groups beyond the whole
//! match, and no DFA-class worst-case guarantees — ported from a small C
//! engine, not from a general-purpose regex library.

mod compiler;
mod error;
mod nfa;
mod runtime;
mod symbol;

pub use compiler::compile;
pub use error::{Error, Result};
pub use nfa::Nfa;
pub use runtime::{first_match, FirstMatch, Search};
