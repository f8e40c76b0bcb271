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

//! Types produced and consumed by the instruction comparison.

/// How undecided positions (unknown symbol on either side) count towards
/// matches and mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrictness {
    /// Unknown to known/unknown symbol pairs are treated as match.
    Lenient,
    /// Unknown to known/unknown symbol pairs are undecided.
    #[default]
    Undecided,
    /// Unknown to known/unknown symbol pairs are treated as mismatch.
    Strict,
}

/// Parses case-insensitively; unknown strings warn and fall back to
/// `Undecided`.
pub fn to_match_strictness(s: &str) -> MatchStrictness {
    if s.eq_ignore_ascii_case("lenient") {
        MatchStrictness::Lenient
    } else if s.eq_ignore_ascii_case("undecided") {
        MatchStrictness::Undecided
    } else if s.eq_ignore_ascii_case("strict") {
        MatchStrictness::Strict
    } else {
        eprintln!("Unrecognized match strictness '{}'. Defaulting to 'Undecided'", s);
        MatchStrictness::Undecided
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchValue {
    IsMatch,
    IsMaybeMatch,
    IsMismatch,
}

pub const MISMATCH_REASON_MISSING: u16 = 1 << 0; // Instruction is missing on one side.
pub const MISMATCH_REASON_INVALID: u16 = 1 << 1; // Instruction is invalid on one side.
pub const MISMATCH_REASON_JUMP_LEN: u16 = 1 << 2; // Jump length is different.

/// Bit position used to flag token positions beyond the 16 representable
/// ones. Nothing past it is recorded.
pub const MISMATCH_OVERFLOW_BIT: u16 = 1 << 15;

/// Per-position comparison outcome, bit packed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MismatchInfo {
    /// Bits representing token positions where instructions are mismatching.
    pub mismatch_bits: u16,
    /// Bits representing token positions where instructions are maybe mismatching.
    pub maybe_mismatch_bits: u16,
    pub mismatch_reasons: u16,
}

// The record is kept deliberately small; it exists once per instruction
// position of every compared function pair.
const _: () = assert!(std::mem::size_of::<MismatchInfo>() <= 8);

impl MismatchInfo {
    pub fn is_match(&self) -> bool {
        self.mismatch_bits == 0 && self.maybe_mismatch_bits == 0 && self.mismatch_reasons == 0
    }

    pub fn is_maybe_match(&self) -> bool {
        self.mismatch_bits == 0 && self.maybe_mismatch_bits != 0 && self.mismatch_reasons == 0
    }

    pub fn is_mismatch(&self) -> bool {
        self.mismatch_bits != 0 || self.mismatch_reasons != 0
    }

    pub fn get_match_value(&self, strictness: MatchStrictness) -> MatchValue {
        match strictness {
            MatchStrictness::Lenient => {
                if self.mismatch_bits == 0 && self.mismatch_reasons == 0 {
                    MatchValue::IsMatch
                } else {
                    MatchValue::IsMismatch
                }
            }
            MatchStrictness::Undecided => {
                if self.is_match() {
                    MatchValue::IsMatch
                } else if self.is_maybe_match() {
                    MatchValue::IsMaybeMatch
                } else {
                    MatchValue::IsMismatch
                }
            }
            MatchStrictness::Strict => {
                if self.is_match() {
                    MatchValue::IsMatch
                } else {
                    MatchValue::IsMismatch
                }
            }
        }
    }
}

/// Paired label positions. Either side can be absent. Values are indices
/// into the respective side's instruction stream; they are resolved
/// against the owning function bodies when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelPair {
    pub indices: [Option<u32>; 2],
}

/// Paired instruction positions with their comparison outcome. Exactly one
/// side may be absent, which corresponds to the `Missing` reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionPair {
    pub indices: [Option<u32>; 2],
    pub mismatch_info: MismatchInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonRecord {
    Labels(LabelPair),
    Instructions(InstructionPair),
}

/// Ordered alignment records for one function pair plus aggregate counts.
#[derive(Debug, Clone, Default)]
pub struct ComparisonResult {
    pub records: Vec<ComparisonRecord>,
    pub label_count: u32,
    pub match_count: u32,
    /// Could be a match or mismatch depending on strictness.
    pub maybe_match_count: u32,
    pub mismatch_count: u32,
}

impl ComparisonResult {
    pub fn get_instruction_count(&self) -> u32 {
        self.match_count + self.maybe_match_count + self.mismatch_count
    }

    pub fn get_match_count(&self, strictness: MatchStrictness) -> u32 {
        match strictness {
            MatchStrictness::Lenient => self.match_count + self.maybe_match_count,
            MatchStrictness::Undecided | MatchStrictness::Strict => self.match_count,
        }
    }

    pub fn get_max_match_count(&self, strictness: MatchStrictness) -> u32 {
        match strictness {
            MatchStrictness::Lenient | MatchStrictness::Undecided => {
                self.match_count + self.maybe_match_count
            }
            MatchStrictness::Strict => self.match_count,
        }
    }

    pub fn get_mismatch_count(&self, strictness: MatchStrictness) -> u32 {
        match strictness {
            MatchStrictness::Lenient | MatchStrictness::Undecided => self.mismatch_count,
            MatchStrictness::Strict => self.mismatch_count + self.maybe_match_count,
        }
    }

    pub fn get_max_mismatch_count(&self, strictness: MatchStrictness) -> u32 {
        match strictness {
            MatchStrictness::Lenient => self.mismatch_count,
            MatchStrictness::Undecided | MatchStrictness::Strict => {
                self.mismatch_count + self.maybe_match_count
            }
        }
    }

    /// Ratio of matching positions, 0..1. Two empty functions compare equal.
    pub fn get_similarity(&self, strictness: MatchStrictness) -> f32 {
        let total = self.get_instruction_count();
        if total == 0 {
            return 1.0;
        }
        self.get_match_count(strictness) as f32 / total as f32
    }

    /// Upper similarity bound if every undecided position turned out equal.
    pub fn get_max_similarity(&self, strictness: MatchStrictness) -> f32 {
        let total = self.get_instruction_count();
        if total == 0 {
            return 1.0;
        }
        self.get_max_match_count(strictness) as f32 / total as f32
    }
}

/// Assembly text flavor requested from the disassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsmFormat {
    /// Intel syntax, gas style.
    Igas,
    /// AT&T syntax, gas style.
    Agas,
    Masm,
    #[default]
    Default,
}

pub fn to_asm_format(s: &str) -> AsmFormat {
    if s.eq_ignore_ascii_case("igas") {
        AsmFormat::Igas
    } else if s.eq_ignore_ascii_case("agas") {
        AsmFormat::Agas
    } else if s.eq_ignore_ascii_case("masm") {
        AsmFormat::Masm
    } else if s.eq_ignore_ascii_case("default") {
        AsmFormat::Default
    } else {
        eprintln!("Unrecognized asm format '{}'. Defaulting to 'Default'", s);
        AsmFormat::Default
    }
}

/// How matched functions are grouped for aggregated reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchBundleType {
    /// Functions are bundled by the compilands they belong to.
    Compiland,
    /// Functions are bundled by the source files they belong to.
    SourceFile,
    /// Functions are bundled into one.
    #[default]
    None,
}

impl MatchBundleType {
    /// Number of bundle policies; sizes per-policy storage.
    pub const COUNT: usize = 3;

    pub const fn as_index(self) -> usize {
        match self {
            MatchBundleType::Compiland => 0,
            MatchBundleType::SourceFile => 1,
            MatchBundleType::None => 2,
        }
    }
}

pub fn to_match_bundle_type(s: &str) -> MatchBundleType {
    const _: () = assert!(MatchBundleType::None.as_index() + 1 == MatchBundleType::COUNT);

    if s.eq_ignore_ascii_case("compiland") {
        MatchBundleType::Compiland
    } else if s.eq_ignore_ascii_case("sourcefile") {
        MatchBundleType::SourceFile
    } else if s.eq_ignore_ascii_case("none") {
        MatchBundleType::None
    } else {
        eprintln!("Unrecognized match bundle type '{}'. Defaulting to 'None'", s);
        MatchBundleType::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictness_parse_is_case_insensitive() {
        assert_eq!(to_match_strictness("LENIENT"), MatchStrictness::Lenient);
        assert_eq!(to_match_strictness("Strict"), MatchStrictness::Strict);
        assert_eq!(to_match_strictness("bogus"), MatchStrictness::Undecided);
    }

    #[test]
    fn bundle_type_parse() {
        assert_eq!(to_match_bundle_type("Compiland"), MatchBundleType::Compiland);
        assert_eq!(to_match_bundle_type("sourcefile"), MatchBundleType::SourceFile);
        assert_eq!(to_match_bundle_type("wrong"), MatchBundleType::None);
    }

    #[test]
    fn match_value_projection() {
        let maybe = MismatchInfo {
            maybe_mismatch_bits: 0b10,
            ..Default::default()
        };
        assert!(maybe.is_maybe_match());
        assert_eq!(maybe.get_match_value(MatchStrictness::Lenient), MatchValue::IsMatch);
        assert_eq!(
            maybe.get_match_value(MatchStrictness::Undecided),
            MatchValue::IsMaybeMatch
        );
        assert_eq!(maybe.get_match_value(MatchStrictness::Strict), MatchValue::IsMismatch);
    }

    #[test]
    fn rollups_follow_strictness() {
        let result = ComparisonResult {
            match_count: 6,
            maybe_match_count: 2,
            mismatch_count: 2,
            ..Default::default()
        };
        assert_eq!(result.get_instruction_count(), 10);
        assert_eq!(result.get_match_count(MatchStrictness::Lenient), 8);
        assert_eq!(result.get_match_count(MatchStrictness::Undecided), 6);
        assert_eq!(result.get_match_count(MatchStrictness::Strict), 6);
        assert_eq!(result.get_max_match_count(MatchStrictness::Undecided), 8);
        assert_eq!(result.get_mismatch_count(MatchStrictness::Undecided), 2);
        assert_eq!(result.get_mismatch_count(MatchStrictness::Strict), 4);
        assert_eq!(result.get_similarity(MatchStrictness::Lenient), 0.8);
        assert_eq!(result.get_similarity(MatchStrictness::Strict), 0.6);
    }

    #[test]
    fn empty_result_is_fully_similar() {
        let result = ComparisonResult::default();
        assert_eq!(result.get_instruction_count(), 0);
        for strictness in [
            MatchStrictness::Lenient,
            MatchStrictness::Undecided,
            MatchStrictness::Strict,
        ] {
            assert_eq!(result.get_similarity(strictness), 1.0);
            assert_eq!(result.get_max_similarity(strictness), 1.0);
        }
    }
}
