//! Pattern parsing: turns pattern text into a [`Nfa`] by walking it once,
//! left to right, keeping a stack of pending fragments for unclosed groups
//! and alternatives. Ported from the original engine's `grrCompile` and its
//! static helpers in `nfaCompiler.c`.

use crate::error::{Error, Result};
use crate::nfa::{self, Nfa, Node};
use crate::symbol::{self, SymbolSet};

/// Why a fragment was pushed onto the stack: an unclosed `(`, or a `|`
/// waiting for its next alternative.
enum Reason {
    Group,
    Bar,
}

struct Frame {
    saved: Vec<Node>,
    column: usize,
    reason: Reason,
}

/// What a bare character (after escape/class resolution) should become.
enum Atom {
    Literal(u8),
    Whitespace,
    Digit,
    Wildcard,
    StartAnchor,
    EndAnchor,
}

fn atom_symbols(atom: &Atom) -> SymbolSet {
    match atom {
        Atom::Literal(c) => SymbolSet::literal(*c),
        Atom::Whitespace => SymbolSet::whitespace(),
        Atom::Digit => SymbolSet::digit(),
        Atom::Wildcard => SymbolSet::wildcard(),
        Atom::StartAnchor => SymbolSet::start_anchor(),
        Atom::EndAnchor => SymbolSet::end_anchor(),
    }
}

fn single_atom_nfa(atom: Atom) -> Vec<Node> {
    vec![Node::single(atom_symbols(&atom), 1)]
}

fn bad_data(pattern: &[u8], column: usize, message: &str) -> Error {
    log::warn!(
        "malformed pattern at column {column}: {message} ({})",
        String::from_utf8_lossy(pattern)
    );
    Error::BadData {
        column,
        message: message.to_string(),
    }
}

/// Compiles pattern text into a runnable automaton.
///
/// `pattern` must be non-empty and contain only printable ASCII (`0x20..=0x7e`)
/// or tab; anything else is rejected up front with [`Error::BadArgs`].
pub fn compile(pattern: &[u8]) -> Result<Nfa> {
    if pattern.is_empty() {
        return Err(Error::BadArgs("pattern is empty".to_string()));
    }
    for &b in pattern {
        if !symbol::is_printable(b) && b != b'\t' {
            return Err(Error::BadArgs(format!(
                "pattern contains a non-printable byte: 0x{b:02x}"
            )));
        }
    }

    let len = pattern.len();
    let mut stack: Vec<Frame> = Vec::new();
    let mut current: Vec<Node> = Vec::new();
    let mut idx = 0usize;

    while idx < len {
        let character = pattern[idx];
        match character {
            b'(' | b'|' => {
                let reason = if character == b'(' { Reason::Group } else { Reason::Bar };
                stack.push(Frame {
                    saved: std::mem::take(&mut current),
                    column: idx,
                    reason,
                });
            }

            b')' => {
                let group_start = find_group(&stack).ok_or_else(|| {
                    bad_data(pattern, idx, "closing parenthesis has no matching '('")
                })?;

                if group_start == stack.len() - 1 {
                    // Nothing happened between '(' and ')': `current` is already the
                    // (possibly empty) group body.
                } else {
                    let mut alternatives: Vec<Vec<Node>> = stack
                        .split_off(group_start + 1)
                        .into_iter()
                        .map(|f| f.saved)
                        .collect();
                    alternatives.push(std::mem::take(&mut current));

                    let mut folded = alternatives.remove(0);
                    for alt in alternatives {
                        folded = nfa::disjoin(folded, alt);
                    }
                    current = folded;
                }

                let new_idx = check_for_quantifier(&mut current, pattern, idx)?;
                idx = new_idx;

                let outer = stack.pop().expect("group frame still on stack");
                current = nfa::concat(outer.saved, std::mem::take(&mut current));
            }

            b'[' => {
                let (class_nfa, new_idx) = resolve_character_class(pattern, idx)?;
                current = nfa::concat(current, class_nfa);
                idx = new_idx;
            }

            b']' => return Err(bad_data(pattern, idx, "unmatched ']'")),

            b'*' | b'+' | b'?' => return Err(bad_data(pattern, idx, "quantifier with nothing to quantify")),

            b'{' => return Err(bad_data(pattern, idx, "'{' with nothing to quantify")),
            b'}' => return Err(bad_data(pattern, idx, "unmatched '}'")),

            b'\\' => {
                idx += 1;
                if idx == len {
                    return Err(bad_data(pattern, idx - 1, "expected a character after '\\'"));
                }
                let atom = resolve_escape(pattern[idx]).ok_or_else(|| {
                    bad_data(pattern, idx, "invalid character escape")
                })?;
                let mut atom_nfa = single_atom_nfa(atom);
                let new_idx = check_for_quantifier(&mut atom_nfa, pattern, idx)?;
                idx = new_idx;
                current = nfa::concat(current, atom_nfa);
            }

            b'.' => {
                let mut atom_nfa = single_atom_nfa(Atom::Wildcard);
                let new_idx = check_for_quantifier(&mut atom_nfa, pattern, idx)?;
                idx = new_idx;
                current = nfa::concat(current, atom_nfa);
            }

            b'^' => {
                if !current.is_empty() {
                    return Err(bad_data(pattern, idx, "'^' can never match here"));
                }
                let mut atom_nfa = single_atom_nfa(Atom::StartAnchor);
                let new_idx = check_for_quantifier(&mut atom_nfa, pattern, idx)?;
                idx = new_idx;
                current = nfa::concat(current, atom_nfa);
            }

            b'$' => {
                let mut atom_nfa = single_atom_nfa(Atom::EndAnchor);
                let new_idx = check_for_quantifier(&mut atom_nfa, pattern, idx)?;
                idx = new_idx;
                current = nfa::concat(current, atom_nfa);
            }

            b'/' => {
                idx += 1;
                if idx == len {
                    return Err(bad_data(pattern, idx - 1, "expected a character after '/'"));
                }

                let (mut lookahead_nfa, new_idx) = if pattern[idx] == b'[' {
                    resolve_character_class(pattern, idx)?
                } else if pattern[idx] == b'\\' {
                    idx += 1;
                    if idx == len {
                        return Err(bad_data(pattern, idx - 1, "expected a character after '\\'"));
                    }
                    let atom = resolve_escape(pattern[idx])
                        .ok_or_else(|| bad_data(pattern, idx, "invalid character escape"))?;
                    (single_atom_nfa(atom), idx + 1)
                } else {
                    (single_atom_nfa(Atom::Literal(pattern[idx])), idx + 1)
                };

                let lookahead_symbols = &mut lookahead_nfa[0].transitions[0].symbols;
                lookahead_symbols.set(symbol::LOOKAHEAD);
                lookahead_symbols.clear(symbol::EPSILON);

                if new_idx != len {
                    return Err(bad_data(pattern, new_idx, "unexpected text following lookahead"));
                }

                current = nfa::concat(current, lookahead_nfa);
                idx = new_idx - 1;
            }

            c => {
                let mut atom_nfa = single_atom_nfa(Atom::Literal(c));
                let new_idx = check_for_quantifier(&mut atom_nfa, pattern, idx)?;
                idx = new_idx;
                current = nfa::concat(current, atom_nfa);
            }
        }

        idx += 1;
    }

    if !stack.is_empty() {
        let mut alternatives = Vec::with_capacity(stack.len() + 1);
        for frame in stack.drain(..) {
            match frame.reason {
                Reason::Group => {
                    return Err(bad_data(pattern, frame.column, "unclosed '('"));
                }
                Reason::Bar => alternatives.push(frame.saved),
            }
        }
        alternatives.push(current);

        let mut folded = alternatives.remove(0);
        for alt in alternatives {
            folded = nfa::disjoin(folded, alt);
        }
        current = folded;
    }

    Ok(Nfa::new(current, String::from_utf8_lossy(pattern).into_owned()))
}

/// Nearest unmatched `(` frame, scanning from the top of the stack down.
fn find_group(stack: &[Frame]) -> Option<usize> {
    stack.iter().rposition(|f| matches!(f.reason, Reason::Group))
}

fn resolve_escape(c: u8) -> Option<Atom> {
    match c {
        b't' => Some(Atom::Literal(b'\t')),
        b'\\' | b'/' | b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'.' | b'*' | b'+' | b'?' | b'^'
        | b'$' | b'|' => Some(Atom::Literal(c)),
        b's' => Some(Atom::Whitespace),
        b'd' => Some(Atom::Digit),
        _ => None,
    }
}

/// Looks at the character following an atom/group ending at `idx` and, if it
/// is `?`, `+`, `*`, or `{`, rewrites `nodes` in place and returns the index
/// of the last character consumed by the quantifier. If there is no
/// quantifier, returns `idx` unchanged.
fn check_for_quantifier(nodes: &mut Vec<Node>, pattern: &[u8], idx: usize) -> Result<usize> {
    if idx + 1 == pattern.len() {
        return Ok(idx);
    }

    match pattern[idx + 1] {
        b'?' => {
            *nodes = nfa::quantify_question(std::mem::take(nodes));
            Ok(idx + 1)
        }
        b'+' => {
            *nodes = nfa::quantify_plus(std::mem::take(nodes));
            Ok(idx + 1)
        }
        b'*' => {
            *nodes = nfa::quantify_star(std::mem::take(nodes));
            Ok(idx + 1)
        }
        b'{' => resolve_braces(nodes, pattern, idx + 1),
        _ => Ok(idx),
    }
}

/// Parses `{n}` starting at the `{` at `pattern[idx]` and replicates `nodes`
/// `n` times in place. Returns the index of the closing `}`.
fn resolve_braces(nodes: &mut Vec<Node>, pattern: &[u8], idx: usize) -> Result<usize> {
    let len = pattern.len();
    let mut end = idx + 1;
    while end < len && pattern[end] != b'}' {
        if !pattern[end].is_ascii_digit() {
            return Err(bad_data(pattern, end, "expected a digit inside '{}'"));
        }
        end += 1;
    }

    if end == len {
        return Err(bad_data(pattern, idx, "unclosed '{'"));
    }
    if end == idx + 1 {
        return Err(bad_data(pattern, idx, "empty '{}'"));
    }

    let digits = std::str::from_utf8(&pattern[idx + 1..end]).expect("already validated ASCII digits");
    let value: u32 = digits
        .parse()
        .map_err(|_| bad_data(pattern, idx + 1, "quantifier inside '{}' is not a valid count"))?;

    if value == 0 {
        return Err(bad_data(pattern, idx + 1, "'{0}' is not allowed"));
    }
    if value == 1 {
        return Ok(end);
    }

    *nodes = nfa::repeat(nodes, value)?;
    Ok(end)
}

/// Parses a `[...]` character class starting at the `[` at `pattern[idx]`.
/// Returns the single-node NFA for the class (after any trailing quantifier
/// has already been folded in) and the index of the last character consumed.
fn resolve_character_class(pattern: &[u8], idx: usize) -> Result<(Vec<Node>, usize)> {
    let len = pattern.len();
    if idx == len - 1 {
        return Err(bad_data(pattern, idx, "unclosed character class"));
    }

    let mut symbols = SymbolSet::empty();
    let mut negation = false;
    let mut cursor = idx + 1;

    if pattern[cursor] == b'^' {
        negation = true;
        cursor += 1;
    }

    if cursor < len && pattern[cursor] == b'-' {
        symbols.set(symbol::symbol_of_ascii(b'-'));
        cursor += 1;
    }

    while cursor < len - 1 && pattern[cursor] != b']' {
        let character = pattern[cursor];

        if cursor + 1 < len && pattern[cursor + 1] == b'-' {
            if cursor == len - 2 {
                return Err(bad_data(pattern, cursor, "unclosed range in character class"));
            }

            let range_end = match character {
                b'A'..=b'Y' => b'Z',
                b'a'..=b'y' => b'z',
                b'0'..=b'8' => b'9',
                _ => return Err(bad_data(pattern, cursor, "invalid character class range")),
            };

            let character2 = pattern[cursor + 2];
            if !(character2 > character && character2 <= range_end) {
                return Err(bad_data(pattern, cursor, "invalid character class range"));
            }

            for c in character..=character2 {
                symbols.set(symbol::symbol_of_ascii(c));
            }

            cursor += 3;
            continue;
        }

        if character == b'\\' {
            let escaped = pattern[cursor + 1];
            match escaped {
                b'[' | b']' => symbols.set(symbol::symbol_of_ascii(escaped)),
                b't' => symbols.set(symbol::TAB),
                _ => return Err(bad_data(pattern, cursor, "invalid character escape")),
            }
            cursor += 2;
            continue;
        }

        if character == b'\t' {
            symbols.set(symbol::TAB);
        } else {
            symbols.set(symbol::symbol_of_ascii(character));
        }
        cursor += 1;
    }

    if cursor >= len || pattern[cursor] != b']' {
        return Err(bad_data(pattern, idx, "unclosed character class"));
    }

    if negation {
        symbols.negate_ascii();
    }

    let mut class_nfa = vec![Node::single(symbols, 1)];
    let new_idx = check_for_quantifier(&mut class_nfa, pattern, cursor)?;
    Ok((class_nfa, new_idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err_message(pattern: &[u8]) -> String {
        match compile(pattern) {
            Err(e) => e.to_string(),
            Ok(_) => panic!("expected compile({pattern:?}) to fail"),
        }
    }

    #[test]
    fn empty_pattern_is_bad_args() {
        assert!(matches!(compile(b""), Err(Error::BadArgs(_))));
    }

    #[test]
    fn unprintable_byte_in_pattern_is_bad_args() {
        assert!(matches!(compile(b"a\x01b"), Err(Error::BadArgs(_))));
    }

    #[test]
    fn unclosed_group_is_bad_data() {
        assert!(matches!(compile(b"(abc"), Err(Error::BadData { .. })));
    }

    #[test]
    fn unmatched_close_paren_is_bad_data() {
        assert!(matches!(compile(b"abc)"), Err(Error::BadData { .. })));
    }

    #[test]
    fn leading_quantifier_is_bad_data() {
        assert!(matches!(compile(b"*a"), Err(Error::BadData { .. })));
    }

    #[test]
    fn quantifier_after_quantifier_is_bad_data() {
        assert!(matches!(compile(b"a+*"), Err(Error::BadData { .. })));
    }

    #[test]
    fn quantifier_right_after_group_open_is_bad_data() {
        assert!(matches!(compile(b"(*a)"), Err(Error::BadData { .. })));
    }

    #[test]
    fn quantifier_right_after_bar_is_bad_data() {
        assert!(matches!(compile(b"a|*b"), Err(Error::BadData { .. })));
    }

    #[test]
    fn caret_mid_pattern_is_bad_data() {
        let message = err_message(b"a^b");
        assert!(message.contains("never match"));
    }

    #[test]
    fn caret_at_start_of_group_is_allowed() {
        assert!(compile(b"(^a)").is_ok());
    }

    #[test]
    fn brace_zero_is_rejected() {
        assert!(matches!(compile(b"a{0}"), Err(Error::BadData { .. })));
    }

    #[test]
    fn brace_missing_close_is_bad_data() {
        assert!(matches!(compile(b"a{3"), Err(Error::BadData { .. })));
    }

    #[test]
    fn brace_non_numeric_is_bad_data() {
        assert!(matches!(compile(b"a{x}"), Err(Error::BadData { .. })));
    }

    #[test]
    fn unclosed_character_class_is_bad_data() {
        assert!(matches!(compile(b"[abc"), Err(Error::BadData { .. })));
    }

    #[test]
    fn cross_block_range_is_bad_data() {
        assert!(matches!(compile(b"[A-z]"), Err(Error::BadData { .. })));
    }

    #[test]
    fn descending_range_is_bad_data() {
        assert!(matches!(compile(b"[z-a]"), Err(Error::BadData { .. })));
    }

    #[test]
    fn leading_dash_in_class_is_literal() {
        let nfa = compile(b"[-a]").unwrap();
        assert!(nfa.is_match(b"-").unwrap());
        assert!(nfa.is_match(b"a").unwrap());
        assert!(!nfa.is_match(b"b").unwrap());
    }

    #[test]
    fn lookahead_followed_by_more_pattern_is_bad_data() {
        assert!(matches!(compile(b"do/gx"), Err(Error::BadData { .. })));
    }

    #[test]
    fn lookahead_inside_group_is_bad_data() {
        assert!(matches!(compile(b"(do/g)"), Err(Error::BadData { .. })));
    }

    #[test]
    fn escape_at_end_of_pattern_is_bad_data() {
        assert!(matches!(compile(b"a\\"), Err(Error::BadData { .. })));
    }

    #[test]
    fn invalid_escape_is_bad_data() {
        assert!(matches!(compile(b"\\q"), Err(Error::BadData { .. })));
    }

    #[test]
    fn invariant_every_motion_stays_in_bounds() {
        for pattern in [
            &b"a+b*c?(d|e){2}"[..],
            &b"[A-Z][a-z]+"[..],
            &b"^foo$"[..],
            &b"(a|b|c)+"[..],
            &b"do/g"[..],
        ] {
            let nfa = compile(pattern).unwrap();
            let accept = nfa.len() as i64;
            for (host, node) in nfa.nodes.iter().enumerate() {
                for t in node.live_transitions() {
                    let dest = host as i64 + t.motion as i64;
                    assert!(dest >= 0 && dest <= accept, "motion out of bounds in {pattern:?}");
                }
            }
        }
    }

    #[test]
    fn concatenation_is_associative() {
        let left = compile(b"(ab)c").unwrap();
        let right = compile(b"a(bc)").unwrap();
        for input in [&b"abc"[..], &b""[..], &b"ab"[..]] {
            assert_eq!(
                left.is_match(input).unwrap(),
                right.is_match(input).unwrap()
            );
        }
    }

    #[test]
    fn quantified_empty_group_does_not_panic() {
        let nfa = compile(b"()?").unwrap();
        assert!(nfa.is_match(b"").unwrap());
    }

    #[test]
    fn raw_tab_byte_in_pattern_is_a_tab_literal() {
        let nfa = compile(b"a\tb").unwrap();
        assert!(nfa.is_match(b"a\tb").unwrap());
        assert!(!nfa.is_match(b"a b").unwrap());
    }

    #[test]
    fn raw_tab_byte_inside_character_class_matches_tab() {
        let nfa = compile(b"[a\t]").unwrap();
        assert!(nfa.is_match(b"\t").unwrap());
        assert!(nfa.is_match(b"a").unwrap());
        assert!(!nfa.is_match(b" ").unwrap());
    }

    #[test]
    fn brace_count_that_would_overflow_motion_encoding_is_too_long() {
        assert!(matches!(
            compile(format!("a{{{}}}", u32::MAX).as_bytes()),
            Err(Error::TooLong)
        ));
    }

    #[test]
    fn description_round_trips_pattern_bytes() {
        let nfa = compile(b"[A-Z]+/x").unwrap();
        assert_eq!(nfa.description(), "[A-Z]+/x");
    }
}
