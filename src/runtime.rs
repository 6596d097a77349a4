//! Matching and searching against a compiled [`Nfa`]. Ported from the
//! original engine's `grrMatch`/`grrSearch`/`grrFirstMatch` and their
//! recursive epsilon-closure helpers in `nfaRuntime.c`.
//!
//! Exact matching and scored search use two different state-set
//! representations on purpose: `is_match` only needs to know which states
//! are live (a bitset), while `search` needs to track, per live state, where
//! the best candidate match starting there began and how much of the input
//! it has consumed so far (an array of records). They're never mixed within
//! one call.

use crate::error::{Error, Result};
use crate::nfa::Nfa;
use crate::symbol;

/// Result of a successful [`Nfa::search`]: the matched span, plus the
/// cursor position search stopped at (equal to the input length unless a
/// hard line break was hit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Search {
    pub start: usize,
    pub end: usize,
    pub cursor: usize,
}

/// Result of a successful [`first_match`]: which pattern won, its score,
/// and how much of the input was processed before the race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstMatch {
    pub index: usize,
    pub score: usize,
    pub processed: usize,
}

#[derive(Clone, Copy)]
struct StateRecord {
    start_idx: usize,
    end_idx: usize,
    score: usize,
    state: usize,
}

impl Nfa {
    /// Does the whole of `text` match this pattern, start to end?
    ///
    /// `Ok(false)` means the match failed; it is not an error. An `Err` is
    /// only returned for a byte in `text` outside printable ASCII/tab.
    pub fn is_match(&self, text: &[u8]) -> Result<bool> {
        let accept = self.len();
        let mut current = vec![false; accept + 1];
        current[0] = true;

        for (idx, &byte) in text.iter().enumerate() {
            let character = symbol::adjust_character(byte).ok_or_else(|| Error::BadData {
                column: idx,
                message: format!("unprintable byte in input: 0x{byte:02x}"),
            })?;

            let mut next = vec![false; accept + 1];
            let mut still_alive = false;
            for state in 0..accept {
                if current[state] && step(self, state, character, &mut next, 0) {
                    still_alive = true;
                }
            }
            if !still_alive {
                return Ok(false);
            }
            current = next;
        }

        for state in 0..=accept {
            if current[state] {
                let mut visited = vec![false; accept + 1];
                if can_reach_accept(self, state, &mut visited) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Finds the longest match anywhere in `text`.
    ///
    /// In `tolerant` mode, a run of bytes outside printable ASCII/tab is
    /// treated as a line break: any record that has already reached the
    /// accepting state survives across the break (so a match already found
    /// isn't thrown away), every other in-flight candidate is dropped, and
    /// scanning resumes past the break as if from a fresh start-of-line. In
    /// non-tolerant mode the same bytes are a hard error. A bare `\r` or
    /// `\n` always stops the scan, tolerant or not.
    pub fn search(&self, text: &[u8], tolerant: bool) -> Result<Search> {
        let accept = self.len();
        let len = text.len();
        let mut cursor = len;
        let mut current: Vec<StateRecord> = Vec::new();
        let mut idx = 0usize;

        while idx < len {
            let mut byte = text[idx];

            if byte == b'\r' || byte == b'\n' {
                cursor = idx;
                break;
            }

            let mut at_start = false;

            if !symbol::is_printable(byte) && byte != b'\t' {
                if !tolerant {
                    cursor = idx;
                    return Err(Error::BadData {
                        column: idx,
                        message: format!("unprintable byte in input: 0x{byte:02x}"),
                    });
                }

                match current.iter().position(|r| r.state == accept) {
                    Some(pos) => {
                        current.swap(0, pos);
                        current.truncate(1);
                    }
                    None => current.clear(),
                }

                idx += 1;
                while idx < len && !symbol::is_printable(text[idx]) && text[idx] != b'\t' {
                    idx += 1;
                }
                if idx == len {
                    break;
                }

                byte = text[idx];
                at_start = true;
            } else if idx == 0 {
                at_start = true;
            }

            let at_end = idx == len - 1 || !symbol::is_printable(text[idx + 1]);
            let character = symbol::adjust_character(byte).expect("byte was checked printable or tab");

            let mut next: Vec<StateRecord> = Vec::new();
            for record in &current {
                step_record(self, record.state, record, character, at_start, at_end, &mut next, 0);
            }

            let spawn = StateRecord {
                state: 0,
                start_idx: idx,
                end_idx: idx,
                score: 0,
            };
            step_record(self, 0, &spawn, character, at_start, at_end, &mut next, 0);

            current = next;
            idx += 1;
        }

        let mut champion_score = 0;
        let mut result = None;
        for record in &current {
            if record.score > champion_score {
                let mut visited = vec![false; accept + 1];
                if can_reach_accept(self, record.state, &mut visited) {
                    champion_score = record.score;
                    result = Some(Search {
                        start: record.start_idx,
                        end: record.end_idx,
                        cursor,
                    });
                }
            }
        }

        result.ok_or(Error::NotFound)
    }
}

/// Races several patterns against the same input one character at a time
/// and reports whichever first reaches its accepting state with the
/// highest score, stopping as soon as every candidate has either died or
/// already accepted. Ported from `grrFirstMatch`.
pub fn first_match(nfas: &[&Nfa], text: &[u8]) -> Option<FirstMatch> {
    if nfas.is_empty() || text.is_empty() {
        return None;
    }

    let mut current: Vec<Vec<StateRecord>> = vec![Vec::new(); nfas.len()];
    let mut processed = 0usize;

    while processed < text.len() {
        let byte = text[processed];
        if !symbol::is_printable(byte) && byte != b'\t' {
            break;
        }
        let character = symbol::adjust_character(byte).expect("byte was checked printable or tab");

        let mut next: Vec<Vec<StateRecord>> = vec![Vec::new(); nfas.len()];

        if processed == 0 {
            for (k, nfa) in nfas.iter().enumerate() {
                let spawn = StateRecord { state: 0, start_idx: 0, end_idx: 0, score: 0 };
                step_record(nfa, 0, &spawn, character, true, true, &mut next[k], 0);
            }
        } else {
            for (k, nfa) in nfas.iter().enumerate() {
                if current[k].is_empty() {
                    continue;
                }
                for record in &current[k] {
                    step_record(nfa, record.state, record, character, true, true, &mut next[k], 0);
                }
            }
        }

        let mut still_alive = false;
        for (k, nfa) in nfas.iter().enumerate() {
            if !next[k].is_empty() {
                let live = next[k].len() > 1 || next[k][0].state != nfa.len();
                if live {
                    still_alive = true;
                }
            }
        }
        current = next;
        processed += 1;

        if !still_alive {
            break;
        }
    }

    let mut score = 0;
    let mut champion = None;
    for (k, nfa) in nfas.iter().enumerate() {
        for record in &current[k] {
            if record.state == nfa.len() && record.score > score {
                score = record.score;
                champion = Some(k);
            }
        }
    }

    champion.map(|index| FirstMatch { index, score, processed })
}

/// Exact-match epsilon closure: advances `state` on `character`, marking
/// every state it can land on (directly or via epsilon) in `next`. A
/// lookahead transition can never fire during exact matching (there is
/// always more string ahead of it, or we wouldn't still be stepping), so
/// reaching one kills this branch outright.
fn step(nfa: &Nfa, state: usize, character: usize, next: &mut [bool], depth: usize) -> bool {
    if state == nfa.len() {
        return false;
    }
    debug_assert!(depth < nfa.len(), "epsilon closure did not terminate");

    let mut still_alive = false;
    for t in nfa.nodes[state].live_transitions() {
        let new_state = (state as i64 + t.motion as i64) as usize;

        if t.symbols.test(character) {
            next[new_state] = true;
            still_alive = true;
        } else if t.symbols.test(symbol::EPSILON) {
            if step(nfa, new_state, character, next, depth + 1) {
                still_alive = true;
            }
        } else if t.symbols.test(symbol::LOOKAHEAD) {
            return false;
        }
    }
    still_alive
}

/// Can `state` reach the accepting state without consuming any more input?
/// Follows epsilon and lookahead transitions only, since those are the only
/// zero-width moves. Visited-set guards against epsilon cycles.
fn can_reach_accept(nfa: &Nfa, state: usize, visited: &mut [bool]) -> bool {
    if state == nfa.len() {
        return true;
    }
    if visited[state] {
        return false;
    }
    visited[state] = true;

    for t in nfa.nodes[state].live_transitions() {
        if t.symbols.test(symbol::EPSILON) || t.symbols.test(symbol::LOOKAHEAD) {
            let new_state = (state as i64 + t.motion as i64) as usize;
            if can_reach_accept(nfa, new_state, visited) {
                return true;
            }
        }
    }
    false
}

/// Scored-search epsilon closure. `at_start`/`at_end` gate `^`/`$` anchors;
/// a lookahead transition fires zero-width (no score bump) iff `character`
/// is in its set, a literal/class/wildcard transition always bumps the
/// score by one and advances `end_idx`, and a plain epsilon only continues
/// past anchors it's actually allowed to cross.
fn step_record(
    nfa: &Nfa,
    state: usize,
    record: &StateRecord,
    character: usize,
    at_start: bool,
    at_end: bool,
    set: &mut Vec<StateRecord>,
    depth: usize,
) {
    if state == nfa.len() {
        // Reaching accept here always happened via a zero-width hop (epsilon
        // or lookahead) from `record`'s own state, not by consuming a
        // character — so the record's score/end_idx carry over unchanged.
        // A transition that genuinely consumes a character is scored where
        // it's matched below, never here.
        maybe_place_record(record, state, set, false);
        return;
    }
    debug_assert!(depth < nfa.len(), "epsilon closure did not terminate");

    for t in nfa.nodes[state].live_transitions() {
        let new_state = (state as i64 + t.motion as i64) as usize;

        if t.symbols.test(symbol::LOOKAHEAD) {
            if t.symbols.test(character) {
                maybe_place_record(record, new_state, set, false);
            }
        } else if t.symbols.test(character) {
            maybe_place_record(record, new_state, set, true);
        } else if t.symbols.test(symbol::EPSILON) {
            if t.symbols.test(symbol::START) && !at_start {
                continue;
            }
            if t.symbols.test(symbol::END) && !at_end {
                continue;
            }
            step_record(nfa, new_state, record, character, at_start, at_end, set, depth + 1);
        }
    }
}

/// Merges a candidate record into `set`, keyed by `state`. A state already
/// present in `set` keeps its existing record unless the candidate's score
/// is strictly greater — ties favor whichever record got there first.
fn maybe_place_record(record: &StateRecord, state: usize, set: &mut Vec<StateRecord>, update_score: bool) {
    let new_score = record.score + usize::from(update_score);
    let new_end = if update_score { record.end_idx + 1 } else { record.end_idx };

    if let Some(existing) = set.iter_mut().find(|r| r.state == state) {
        if new_score > existing.score {
            existing.start_idx = record.start_idx;
            existing.end_idx = new_end;
            existing.score = new_score;
        }
    } else {
        set.push(StateRecord {
            start_idx: record.start_idx,
            end_idx: new_end,
            score: new_score,
            state,
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::compile;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn plus_quantifier_search_finds_longest_run() {
        init();
        let nfa = compile(b"a+").unwrap();
        let result = nfa.search(b"aaab", false).unwrap();
        assert_eq!((result.start, result.end), (0, 3));
    }

    #[test]
    fn tolerant_search_resumes_after_break_and_keeps_best_run() {
        init();
        let nfa = compile(b"^a+").unwrap();
        let result = nfa.search(b"aa\x00aaad", true).unwrap();
        assert_eq!((result.start, result.end), (3, 6));
    }

    #[test]
    fn alternation_prefers_longest_branch() {
        init();
        let nfa = compile(b"(foo|foobar)").unwrap();
        let result = nfa.search(b"foobar", false).unwrap();
        assert_eq!((result.start, result.end), (0, 6));
    }

    #[test]
    fn brace_quantifier_matches_exact_count() {
        init();
        let nfa = compile(b"a{3}").unwrap();
        let result = nfa.search(b"aaaa", false).unwrap();
        assert_eq!((result.start, result.end), (0, 3));
    }

    #[test]
    fn character_class_sequence_matches_whole_string() {
        init();
        let nfa = compile(b"[A-Z][a-z]+").unwrap();
        assert!(nfa.is_match(b"Hello").unwrap());
    }

    #[test]
    fn trailing_lookahead_does_not_consume_its_operand() {
        init();
        let nfa = compile(b"do/g").unwrap();
        let result = nfa.search(b"dog", false).unwrap();
        assert_eq!((result.start, result.end), (0, 2));
    }

    #[test]
    fn negated_tab_class_rejects_tab() {
        init();
        let nfa = compile(b"[^\\t]").unwrap();
        assert!(!nfa.is_match(b"\t").unwrap());
    }

    #[test]
    fn empty_group_matches_empty_string() {
        init();
        let nfa = compile(b"()").unwrap();
        assert!(nfa.is_match(b"").unwrap());
    }

    #[test]
    fn repeated_group_still_matches_plain_text() {
        init();
        let nfa = compile(b"(abc)").unwrap();
        assert!(nfa.is_match(b"abc").unwrap());
    }

    #[test]
    fn braces_idempotence_matches_bare_atom() {
        init();
        let braced = compile(b"a{1}").unwrap();
        let bare = compile(b"a").unwrap();
        assert_eq!(braced.is_match(b"a").unwrap(), bare.is_match(b"a").unwrap());
        assert!(braced.is_match(b"a").unwrap());
    }

    #[test]
    fn star_accepts_empty_and_plus_language() {
        init();
        let nfa = compile(b"a*").unwrap();
        assert!(nfa.is_match(b"").unwrap());
        assert!(nfa.is_match(b"aaa").unwrap());
    }

    #[test]
    fn alternation_is_commutative() {
        init();
        let ab = compile(b"a|b").unwrap();
        let ba = compile(b"b|a").unwrap();
        for input in [&b"a"[..], &b"b"[..], &b"c"[..]] {
            assert_eq!(ab.is_match(input).unwrap(), ba.is_match(input).unwrap());
        }
    }

    #[test]
    fn first_match_picks_the_longer_scoring_pattern() {
        init();
        let short = compile(b"ab").unwrap();
        let long = compile(b"abc").unwrap();
        let winner = super::first_match(&[&short, &long], b"abc").unwrap();
        assert_eq!(winner.index, 1);
    }

    #[test]
    fn description_returns_original_pattern_text() {
        init();
        let nfa = compile(b"a+b").unwrap();
        assert_eq!(nfa.description(), "a+b");
    }
}
