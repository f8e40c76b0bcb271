//! End to end checks of the stream alignment against small literal
//! instruction sequences.

use asm_differ::compare_types::{
    ComparisonRecord, MatchStrictness, MISMATCH_REASON_INVALID, MISMATCH_REASON_JUMP_LEN,
    MISMATCH_REASON_MISSING,
};
use asm_differ::instr::{Instruction, Label, StreamItem};
use asm_differ::run_comparison;

fn instr(text: &str) -> StreamItem {
    StreamItem::Instr(Instruction {
        text: text.to_string(),
        ..Default::default()
    })
}

fn jump(text: &str, jump_len: i16) -> StreamItem {
    StreamItem::Instr(Instruction {
        text: text.to_string(),
        is_jump: true,
        jump_len,
        ..Default::default()
    })
}

fn invalid() -> StreamItem {
    StreamItem::Instr(Instruction {
        text: "(bad)".to_string(),
        is_invalid: true,
        ..Default::default()
    })
}

fn label(name: &str) -> StreamItem {
    StreamItem::Label(Label {
        label: name.to_string(),
    })
}

fn stream(texts: &[&str]) -> Vec<StreamItem> {
    texts.iter().map(|t| instr(t)).collect()
}

const ALL_STRICTNESS: [MatchStrictness; 3] = [
    MatchStrictness::Lenient,
    MatchStrictness::Undecided,
    MatchStrictness::Strict,
];

#[test]
fn identical_streams_match_completely() {
    let a = stream(&["mov eax,1", "ret"]);
    let b = stream(&["mov eax,1", "ret"]);
    let result = run_comparison(&a, &b, 20);
    assert_eq!(result.match_count, 2);
    assert_eq!(result.maybe_match_count, 0);
    assert_eq!(result.mismatch_count, 0);
    assert_eq!(result.get_similarity(MatchStrictness::Undecided), 1.0);
}

#[test]
fn single_operand_difference_is_one_mismatch() {
    let a = stream(&["mov eax,1", "ret"]);
    let b = stream(&["mov eax,2", "ret"]);
    let result = run_comparison(&a, &b, 20);
    assert_eq!(result.match_count, 1);
    assert_eq!(result.maybe_match_count, 0);
    assert_eq!(result.mismatch_count, 1);
    assert_eq!(result.get_similarity(MatchStrictness::Undecided), 0.5);
}

#[test]
fn unknown_symbol_stays_undecided() {
    let a = stream(&["mov eax,unk_400", "ret"]);
    let b = stream(&["mov eax,SymbolX", "ret"]);
    let result = run_comparison(&a, &b, 20);
    assert_eq!(result.match_count, 1);
    assert_eq!(result.maybe_match_count, 1);
    assert_eq!(result.mismatch_count, 0);
    assert_eq!(result.get_similarity(MatchStrictness::Lenient), 1.0);
    assert_eq!(result.get_similarity(MatchStrictness::Strict), 0.5);
}

#[test]
fn removed_prologue_resynchronizes_with_missing_record() {
    let a = stream(&["push ebp", "mov ebp,esp", "ret"]);
    let b = stream(&["mov ebp,esp", "ret"]);
    let result = run_comparison(&a, &b, 2);
    assert_eq!(result.match_count, 2);
    assert_eq!(result.mismatch_count, 1);

    assert_eq!(result.records.len(), 3);
    match &result.records[0] {
        ComparisonRecord::Instructions(pair) => {
            assert_eq!(pair.indices, [Some(0), None]);
            assert_eq!(pair.mismatch_info.mismatch_reasons, MISMATCH_REASON_MISSING);
        }
        other => panic!("expected missing instruction record, got {:?}", other),
    }
    for record in &result.records[1..] {
        match record {
            ComparisonRecord::Instructions(pair) => assert!(pair.mismatch_info.is_match()),
            other => panic!("expected matching instruction record, got {:?}", other),
        }
    }
}

#[test]
fn jump_length_difference_is_flagged() {
    let a = vec![jump("jmp loc_1", 8), instr("ret")];
    let b = vec![jump("jmp loc_1", 16), instr("ret")];
    let result = run_comparison(&a, &b, 20);
    assert_eq!(result.match_count, 1);
    assert_eq!(result.mismatch_count, 1);

    let flagged = result.records.iter().any(|record| match record {
        ComparisonRecord::Instructions(pair) => {
            pair.mismatch_info.mismatch_reasons & MISMATCH_REASON_JUMP_LEN != 0
        }
        _ => false,
    });
    assert!(flagged, "jump length reason missing from records");
}

#[test]
fn invalid_instruction_stays_paired() {
    let a = vec![instr("mov eax,1"), invalid(), instr("ret")];
    let b = vec![instr("mov eax,1"), instr("nop"), instr("ret")];
    let result = run_comparison(&a, &b, 20);
    assert_eq!(result.match_count, 2);
    assert_eq!(result.mismatch_count, 1);
    assert_eq!(result.records.len(), 3);
    match &result.records[1] {
        ComparisonRecord::Instructions(pair) => {
            assert_eq!(pair.indices, [Some(1), Some(1)]);
            assert_eq!(pair.mismatch_info.mismatch_reasons, MISMATCH_REASON_INVALID);
        }
        other => panic!("expected paired invalid record, got {:?}", other),
    }
}

#[test]
fn counts_are_conserved() {
    let a = vec![
        label("loc_1"),
        instr("push ebp"),
        instr("mov eax,unk_400"),
        instr("call helper"),
        instr("ret"),
    ];
    let b = vec![
        label("loc_1"),
        instr("mov eax,SymbolX"),
        instr("call helper"),
        instr("xor eax,eax"),
        instr("ret"),
    ];
    let result = run_comparison(&a, &b, 4);

    let mut label_records = 0u32;
    let mut instruction_records = 0u32;
    for record in &result.records {
        match record {
            ComparisonRecord::Labels(_) => label_records += 1,
            ComparisonRecord::Instructions(_) => instruction_records += 1,
        }
    }
    assert_eq!(label_records, result.label_count);
    assert_eq!(instruction_records, result.get_instruction_count());
    assert_eq!(
        result.match_count + result.maybe_match_count + result.mismatch_count,
        result.get_instruction_count()
    );
}

#[test]
fn reflexivity() {
    let a = vec![
        instr("push ebp"),
        label("loc_8"),
        instr("mov eax,unk_400"),
        jump("jne loc_8", -4),
        instr("ret"),
    ];
    let result = run_comparison(&a, &a, 20);
    assert_eq!(result.mismatch_count, 0);
    assert_eq!(result.maybe_match_count, 0);
    for strictness in ALL_STRICTNESS {
        assert_eq!(result.get_similarity(strictness), 1.0);
    }
}

#[test]
fn strictness_is_monotonic() {
    let a = stream(&["mov eax,unk_400", "mov ebx,2", "ret"]);
    let b = stream(&["mov eax,SymbolX", "mov ebx,3", "ret"]);
    let result = run_comparison(&a, &b, 20);

    let lenient = result.get_match_count(MatchStrictness::Lenient);
    let undecided = result.get_match_count(MatchStrictness::Undecided);
    let strict = result.get_match_count(MatchStrictness::Strict);
    assert!(strict <= undecided && undecided <= lenient);

    let lenient_mis = result.get_mismatch_count(MatchStrictness::Lenient);
    let undecided_mis = result.get_mismatch_count(MatchStrictness::Undecided);
    let strict_mis = result.get_mismatch_count(MatchStrictness::Strict);
    assert!(lenient_mis <= undecided_mis && undecided_mis <= strict_mis);
}

#[test]
fn empty_streams_are_fully_similar() {
    let result = run_comparison(&[], &[], 20);
    assert!(result.records.is_empty());
    assert_eq!(result.get_instruction_count(), 0);
    for strictness in ALL_STRICTNESS {
        assert_eq!(result.get_similarity(strictness), 1.0);
    }
}

#[test]
fn lookahead_limit_bounds_resynchronization() {
    // Two extra instructions on the left; a window of one cannot bridge
    // them, a window of two can.
    let a = stream(&["push ebp", "push esi", "mov eax,1", "ret"]);
    let b = stream(&["mov eax,1", "ret"]);

    let narrow = run_comparison(&a, &b, 1);
    assert_eq!(narrow.match_count, 0);
    assert_eq!(narrow.mismatch_count, 4);

    let wide = run_comparison(&a, &b, 2);
    assert_eq!(wide.match_count, 2);
    assert_eq!(wide.mismatch_count, 2);
}

#[test]
fn zero_lookahead_forces_positional_mismatches() {
    let a = stream(&["push ebp", "mov eax,1", "ret"]);
    let b = stream(&["mov eax,1", "ret"]);
    let result = run_comparison(&a, &b, 0);
    assert_eq!(result.match_count, 0);
    assert_eq!(result.get_instruction_count(), 3);
    // Every both-sided record must be a plain positional mismatch.
    let paired = result
        .records
        .iter()
        .filter(|r| {
            matches!(
                r,
                ComparisonRecord::Instructions(p) if p.indices[0].is_some() && p.indices[1].is_some()
            )
        })
        .count();
    assert_eq!(paired, 2);
}
