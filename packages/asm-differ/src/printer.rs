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

//! Renders instruction streams and comparison results to text.

use crate::compare_types::{
    ComparisonRecord, ComparisonResult, MatchStrictness, MatchValue, MismatchInfo,
};
use crate::file_content::TextFileContent;
use crate::function::Function;
use crate::instr::{Instruction, StreamItem};

/// Column widths for rendered reports.
#[derive(Debug, Clone, Copy)]
pub struct PrintConfig {
    pub indent_len: u32,
    pub asm_len: u32,
    /// Number of encoding bytes shown per instruction; 0 hides the column.
    pub byte_count: u32,
    /// Width of the interleaved source code column; 0 disables it.
    pub sourcecode_len: u32,
    pub sourceline_len: u32,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            indent_len: 4,
            asm_len: 80,
            byte_count: 11,
            sourcecode_len: 80,
            sourceline_len: 5,
        }
    }
}

/// Appends a plain listing of one stream, labels outdented.
pub fn append_asm_listing(text: &mut String, items: &[StreamItem], indent_len: u32) {
    let indent = " ".repeat(indent_len as usize);
    for item in items {
        match item {
            StreamItem::Label(label) => {
                text.push_str(&label.label);
                text.push_str(":\n");
            }
            StreamItem::Instr(instr) => {
                text.push_str(&indent);
                text.push_str(&format!("{:08x}  {}\n", instr.address, instr.text));
            }
            StreamItem::Null => {}
        }
    }
}

fn pad_to(cell: &mut String, width: usize) {
    let count = cell.chars().count();
    if count < width {
        cell.extend(std::iter::repeat(' ').take(width - count));
    } else if count > width {
        // Char-wise so multi-byte source text cannot split mid-character.
        *cell = cell.chars().take(width).collect();
    }
}

fn bytes_cell(instr: &Instruction, byte_count: usize) -> String {
    let mut cell = String::new();
    for (i, byte) in instr.bytes.as_slice().iter().take(byte_count).enumerate() {
        if i > 0 {
            cell.push(' ');
        }
        cell.push_str(&format!("{:02x}", byte));
    }
    pad_to(&mut cell, byte_count * 3);
    cell
}

fn source_cell(
    instr: Option<&Instruction>,
    content: Option<&TextFileContent>,
    config: &PrintConfig,
) -> String {
    let mut cell = String::new();
    if config.sourcecode_len == 0 {
        return cell;
    }
    if let (Some(instr), Some(content)) = (instr, content) {
        let line_index = instr.get_line_index();
        if line_index != u16::MAX {
            if let Some(line) = content.lines.get(line_index as usize) {
                cell = format!(
                    "{:>width$} {}",
                    instr.line_number,
                    line.trim_end(),
                    width = config.sourceline_len as usize
                );
            }
        }
    }
    pad_to(
        &mut cell,
        (config.sourceline_len + 1 + config.sourcecode_len) as usize,
    );
    cell
}

fn asm_cell(item: Option<&StreamItem>, config: &PrintConfig) -> String {
    let mut cell = match item {
        Some(StreamItem::Label(label)) => format!("{}:", label.label),
        Some(StreamItem::Instr(instr)) => {
            if config.byte_count > 0 {
                format!(
                    "{:08x}  {} {}",
                    instr.address,
                    bytes_cell(instr, config.byte_count as usize),
                    instr.text
                )
            } else {
                format!("{:08x}  {}", instr.address, instr.text)
            }
        }
        _ => String::new(),
    };
    pad_to(&mut cell, config.asm_len as usize);
    cell
}

fn match_char(info: &MismatchInfo, indices: [Option<u32>; 2], strictness: MatchStrictness) -> char {
    match (indices[0], indices[1]) {
        (Some(_), None) => '<',
        (None, Some(_)) => '>',
        _ => match info.get_match_value(strictness) {
            MatchValue::IsMatch => '=',
            MatchValue::IsMaybeMatch => '?',
            MatchValue::IsMismatch => '|',
        },
    }
}

fn resolve<'a>(bodies: [&'a Function; 2], side: usize, index: Option<u32>) -> Option<&'a StreamItem> {
    index.and_then(|idx| bodies[side].get_instructions().get(idx as usize))
}

/// Appends one function pair's comparison, one aligned record per line:
/// optional source columns, the left stream, a match marker, the right
/// stream.
#[allow(clippy::too_many_arguments)]
pub fn append_comparison_report(
    text: &mut String,
    name: &str,
    result: &ComparisonResult,
    bodies: [&Function; 2],
    exe_filenames: &[String; 2],
    source_contents: [Option<&TextFileContent>; 2],
    strictness: MatchStrictness,
    config: &PrintConfig,
) {
    let indent = " ".repeat(config.indent_len as usize);

    text.push_str(&format!(";; {}\n", name));
    text.push_str(&format!(
        ";; {} vs {}\n",
        exe_filenames[0], exe_filenames[1]
    ));
    text.push_str(&format!(
        ";; similarity: {:.3} (max {:.3}), {} instructions, {} mismatches\n",
        result.get_similarity(strictness),
        result.get_max_similarity(strictness),
        result.get_instruction_count(),
        result.get_mismatch_count(strictness),
    ));

    for record in &result.records {
        let (indices, info) = match record {
            ComparisonRecord::Labels(pair) => (pair.indices, None),
            ComparisonRecord::Instructions(pair) => (pair.indices, Some(pair.mismatch_info)),
        };
        let left_item = resolve(bodies, 0, indices[0]);
        let right_item = resolve(bodies, 1, indices[1]);

        let marker = match info {
            Some(info) => match_char(&info, indices, strictness),
            None => ' ',
        };

        let mut line = String::new();
        line.push_str(&indent);
        if config.sourcecode_len > 0 && source_contents[0].is_some() {
            line.push_str(&source_cell(
                left_item.and_then(StreamItem::as_instruction),
                source_contents[0],
                config,
            ));
            line.push(' ');
        }
        line.push_str(&asm_cell(left_item, config));
        line.push(' ');
        line.push(marker);
        line.push(' ');
        let right_asm = asm_cell(right_item, config);
        if config.sourcecode_len > 0 && source_contents[1].is_some() {
            line.push_str(&right_asm);
            line.push(' ');
            line.push_str(
                source_cell(
                    right_item.and_then(StreamItem::as_instruction),
                    source_contents[1],
                    config,
                )
                .trim_end(),
            );
        } else {
            line.push_str(right_asm.trim_end());
        }
        text.push_str(line.trim_end());
        text.push('\n');
    }
    text.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instruction;
    use crate::matcher::run_comparison;

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

    #[test]
    fn listing_renders_labels_and_instructions() {
        let func = body(&["mov eax, 1", "ret"]);
        let mut text = String::new();
        append_asm_listing(&mut text, func.get_instructions(), 4);
        assert!(text.contains("mov eax, 1"));
        assert!(text.contains("00001000"));
    }

    #[test]
    fn report_shows_match_markers() {
        let left = body(&["mov eax, 1", "ret"]);
        let right = body(&["mov eax, 2", "ret"]);
        let result = run_comparison(left.get_instructions(), right.get_instructions(), 4);

        let mut text = String::new();
        let names = ["a.exe".to_string(), "b.exe".to_string()];
        let config = PrintConfig {
            sourcecode_len: 0,
            ..Default::default()
        };
        append_comparison_report(
            &mut text,
            "demo",
            &result,
            [&left, &right],
            &names,
            [None, None],
            MatchStrictness::Undecided,
            &config,
        );
        assert!(text.contains(";; demo"));
        assert!(text.contains("a.exe vs b.exe"));
        assert!(text.contains(" | "));
        assert!(text.contains(" = "));
        assert!(text.contains("similarity: 0.500"));
    }
}
