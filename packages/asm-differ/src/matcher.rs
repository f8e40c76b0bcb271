// Copyright (c) 2026 Asm-Differ Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Instruction stream alignment.
//!
//! The aligner is a greedy two-cursor walk over both streams. When a pair
//! of instructions disagrees it searches a bounded lookahead window for
//! the nearest pair that matches again and emits the skipped positions as
//! paired or one-sided mismatch records. Compiler-induced displacements
//! (an added prologue push, a removed dead store) are small, so a small
//! window is enough to resynchronize; anything further apart stays a
//! position-by-position mismatch.

use crate::compare_types::{
    ComparisonRecord, ComparisonResult, InstructionPair, LabelPair, MismatchInfo,
    MISMATCH_OVERFLOW_BIT, MISMATCH_REASON_INVALID, MISMATCH_REASON_JUMP_LEN,
    MISMATCH_REASON_MISSING,
};
use crate::instr::{token_has_pseudo_symbol, Instruction, StreamItem};

/// Token positions representable in the 16 bit position maps.
const MAX_TOKEN_POSITIONS: usize = 16;

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

/// Compares one instruction position. Either side may be absent, but not
/// both. Invalid instructions carry no trustworthy text, so they produce
/// the `Invalid` reason with no position bits.
pub fn compare_instructions(a: Option<&Instruction>, b: Option<&Instruction>) -> MismatchInfo {
    debug_assert!(a.is_some() || b.is_some());

    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return MismatchInfo {
                mismatch_reasons: MISMATCH_REASON_MISSING,
                ..Default::default()
            }
        }
    };

    if a.is_invalid || b.is_invalid {
        return MismatchInfo {
            mismatch_reasons: MISMATCH_REASON_INVALID,
            ..Default::default()
        };
    }

    let mut info = MismatchInfo::default();

    let tokens_a: Vec<&str> = tokenize(&a.text).collect();
    let tokens_b: Vec<&str> = tokenize(&b.text).collect();
    let position_count = tokens_a.len().max(tokens_b.len());

    for pos in 0..position_count.min(MAX_TOKEN_POSITIONS) {
        let ta = tokens_a.get(pos).copied();
        let tb = tokens_b.get(pos).copied();
        if ta == tb {
            continue;
        }
        // A difference that involves a placeholder name on either side may
        // still be the same operand; it stays undecided.
        let unknown = ta.is_some_and(token_has_pseudo_symbol) || tb.is_some_and(token_has_pseudo_symbol);
        let bit = 1u16 << pos;
        if unknown {
            info.maybe_mismatch_bits |= bit;
        } else {
            info.mismatch_bits |= bit;
        }
    }
    if position_count > MAX_TOKEN_POSITIONS {
        info.mismatch_bits |= MISMATCH_OVERFLOW_BIT;
    }

    if a.is_jump && b.is_jump && a.jump_len.unsigned_abs() != b.jump_len.unsigned_abs() {
        info.mismatch_reasons |= MISMATCH_REASON_JUMP_LEN;
    }

    info
}

/// Bounded lookahead alignment of two instruction streams.
pub struct Aligner<'a> {
    streams: [&'a [StreamItem]; 2],
    lookahead_limit: usize,
}

struct AlignState {
    cursors: [usize; 2],
    result: ComparisonResult,
}

impl<'a> Aligner<'a> {
    pub fn new(left: &'a [StreamItem], right: &'a [StreamItem], lookahead_limit: u32) -> Self {
        Self {
            streams: [left, right],
            lookahead_limit: lookahead_limit as usize,
        }
    }

    pub fn run(&self) -> ComparisonResult {
        let mut state = AlignState {
            cursors: [0, 0],
            result: ComparisonResult::default(),
        };

        loop {
            let a = self.streams[0].get(state.cursors[0]);
            let b = self.streams[1].get(state.cursors[1]);

            match (a, b) {
                (None, None) => break,
                // Null is a render-side padding element; tolerate it by
                // stepping over without a record.
                (Some(StreamItem::Null), _) => state.cursors[0] += 1,
                (_, Some(StreamItem::Null)) => state.cursors[1] += 1,
                (Some(StreamItem::Label(_)), _) | (_, Some(StreamItem::Label(_))) => {
                    self.emit_labels(&mut state);
                }
                (Some(StreamItem::Instr(_)), None) => {
                    self.emit_one_sided(&mut state, 0);
                }
                (None, Some(StreamItem::Instr(_))) => {
                    self.emit_one_sided(&mut state, 1);
                }
                (Some(StreamItem::Instr(ia)), Some(StreamItem::Instr(ib))) => {
                    let info = compare_instructions(Some(ia), Some(ib));
                    if !info.is_mismatch() {
                        self.emit_pair(&mut state, info);
                    } else if info.mismatch_reasons & MISMATCH_REASON_INVALID != 0 {
                        // Undecodable bytes cannot anchor a resync; keep
                        // the positions paired.
                        self.emit_pair(&mut state, info);
                    } else {
                        self.resync(&mut state, info);
                    }
                }
            }
        }

        debug_assert!(self.verify_counts(&state.result));
        state.result
    }

    /// Emits label records while either cursor rests on a label. Both
    /// sides pair up when they carry labels simultaneously.
    fn emit_labels(&self, state: &mut AlignState) {
        loop {
            let a_label = self.streams[0]
                .get(state.cursors[0])
                .is_some_and(StreamItem::is_label);
            let b_label = self.streams[1]
                .get(state.cursors[1])
                .is_some_and(StreamItem::is_label);

            let indices = match (a_label, b_label) {
                (true, true) => {
                    let rec = [Some(state.cursors[0] as u32), Some(state.cursors[1] as u32)];
                    state.cursors[0] += 1;
                    state.cursors[1] += 1;
                    rec
                }
                (true, false) => {
                    let rec = [Some(state.cursors[0] as u32), None];
                    state.cursors[0] += 1;
                    rec
                }
                (false, true) => {
                    let rec = [None, Some(state.cursors[1] as u32)];
                    state.cursors[1] += 1;
                    rec
                }
                (false, false) => break,
            };
            state.result.records.push(ComparisonRecord::Labels(LabelPair { indices }));
            state.result.label_count += 1;
        }
    }

    /// Emits a `Missing` record for the instruction under `side`'s cursor.
    fn emit_one_sided(&self, state: &mut AlignState, side: usize) {
        let mut indices = [None, None];
        indices[side] = Some(state.cursors[side] as u32);
        state.result.records.push(ComparisonRecord::Instructions(InstructionPair {
            indices,
            mismatch_info: MismatchInfo {
                mismatch_reasons: MISMATCH_REASON_MISSING,
                ..Default::default()
            },
        }));
        state.result.mismatch_count += 1;
        state.cursors[side] += 1;
    }

    /// Emits the instruction pair under both cursors and advances them.
    fn emit_pair(&self, state: &mut AlignState, info: MismatchInfo) {
        state.result.records.push(ComparisonRecord::Instructions(InstructionPair {
            indices: [Some(state.cursors[0] as u32), Some(state.cursors[1] as u32)],
            mismatch_info: info,
        }));
        if info.is_match() {
            state.result.match_count += 1;
        } else if info.is_maybe_match() {
            state.result.maybe_match_count += 1;
        } else {
            state.result.mismatch_count += 1;
        }
        state.cursors[0] += 1;
        state.cursors[1] += 1;
    }

    /// Index of the `n`th instruction at or after `start`, label positions
    /// skipped. `n == 0` is the instruction under `start` itself.
    fn nth_instruction(&self, side: usize, start: usize, n: usize) -> Option<usize> {
        let stream = self.streams[side];
        let mut remaining = n;
        let mut idx = start;
        while idx < stream.len() {
            if stream[idx].is_instruction() {
                if remaining == 0 {
                    return Some(idx);
                }
                remaining -= 1;
            }
            idx += 1;
        }
        None
    }

    fn is_resync_anchor(&self, state: &AlignState, da: usize, db: usize) -> bool {
        let Some(ia) = self.nth_instruction(0, state.cursors[0], da) else {
            return false;
        };
        let Some(ib) = self.nth_instruction(1, state.cursors[1], db) else {
            return false;
        };
        let a = self.streams[0][ia].as_instruction();
        let b = self.streams[1][ib].as_instruction();
        compare_instructions(a, b).is_match()
    }

    /// Searches for the nearest matching pair within the lookahead window.
    /// Ordered by total shift, preferring equal shifts, then the smaller
    /// left shift. The equal-shift preference keeps both sides balanced
    /// when either one-sided shift would also resynchronize.
    fn find_resync(&self, state: &AlignState) -> Option<(usize, usize)> {
        let limit = self.lookahead_limit;
        for total in 1..=(2 * limit) {
            if total % 2 == 0 {
                let half = total / 2;
                if half <= limit && self.is_resync_anchor(state, half, half) {
                    return Some((half, half));
                }
            }
            for da in 0..=total.min(limit) {
                let db = total - da;
                if db > limit {
                    continue;
                }
                if total % 2 == 0 && da == total / 2 {
                    continue; // tried first
                }
                if self.is_resync_anchor(state, da, db) {
                    return Some((da, db));
                }
            }
        }
        None
    }

    /// Handles a genuine mismatch: either skips ahead to a found anchor,
    /// emitting records for everything passed over, or pairs the two
    /// mismatching instructions in place.
    fn resync(&self, state: &mut AlignState, current_info: MismatchInfo) {
        let Some((da, db)) = self.find_resync(state) else {
            self.emit_pair(state, current_info);
            return;
        };

        // Equal parts of the shift stay paired position by position; the
        // overhang of the longer shift has no counterpart and is missing.
        let paired = da.min(db);
        for _ in 0..paired {
            self.emit_labels(state);
            let a = self.streams[0][state.cursors[0]].as_instruction();
            let b = self.streams[1][state.cursors[1]].as_instruction();
            let info = compare_instructions(a, b);
            self.emit_pair(state, info);
        }
        for _ in paired..da {
            self.emit_labels(state);
            self.emit_one_sided(state, 0);
        }
        for _ in paired..db {
            self.emit_labels(state);
            self.emit_one_sided(state, 1);
        }
        // The anchor pair itself is classified by the next loop iteration.
    }

    fn verify_counts(&self, result: &ComparisonResult) -> bool {
        let mut labels = 0u32;
        let mut instructions = 0u32;
        for record in &result.records {
            match record {
                ComparisonRecord::Labels(_) => labels += 1,
                ComparisonRecord::Instructions(_) => instructions += 1,
            }
        }
        labels == result.label_count && instructions == result.get_instruction_count()
    }
}

/// Convenience entry point for one function pair.
pub fn run_comparison(
    left: &[StreamItem],
    right: &[StreamItem],
    lookahead_limit: u32,
) -> ComparisonResult {
    Aligner::new(left, right, lookahead_limit).run()
}
