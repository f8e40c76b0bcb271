use asm_differ::compare_types::MatchStrictness;
use asm_differ::function::Function;
use asm_differ::instr::{Instruction, StreamItem};
use asm_differ::printer::{append_comparison_report, PrintConfig};
use asm_differ::run_comparison;

fn body(texts: &[&str]) -> Function {
    let mut func = Function::new();
    func.set_instructions(
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                StreamItem::Instr(Instruction {
                    address: 0x1000 + i as u64 * 2,
                    text: t.to_string(),
                    ..Default::default()
                })
            })
            .collect(),
    );
    func
}

fn main() {
    let left = body(&["push ebp", "mov ebp,esp", "mov eax,unk_400", "ret"]);
    let right = body(&["mov ebp,esp", "mov eax,counter", "ret"]);

    let result = run_comparison(left.get_instructions(), right.get_instructions(), 4);

    let mut text = String::new();
    let names = ["old.exe".to_string(), "new.exe".to_string()];
    let config = PrintConfig {
        asm_len: 48,
        byte_count: 0,
        sourcecode_len: 0,
        ..Default::default()
    };
    append_comparison_report(
        &mut text,
        "demo_function",
        &result,
        [&left, &right],
        &names,
        [None, None],
        MatchStrictness::Undecided,
        &config,
    );
    eprintln!("{}", text);
}
