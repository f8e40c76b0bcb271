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

//! Disassembler bridge. Decodes a byte range into an instruction stream
//! with jump-target labels interleaved and address operands replaced by
//! symbol names, so that two builds of the same code compare by name
//! rather than by shifted raw addresses.

use std::collections::BTreeSet;

use capstone::arch::x86::{ArchMode, ArchSyntax};
use capstone::prelude::*;
use regex::Regex;

use crate::compare_types::AsmFormat;
use crate::error::{DiffError, DiffResult};
use crate::executable::{Executable, SectionType};
use crate::instr::{Instruction, Label, StreamItem, PREFIX_LOC, PREFIX_SUB, PREFIX_UNK};

/// Per-run disassembler state: the configured capstone handle plus the
/// text flavor. Built once per work item; capstone handles are not
/// shareable across threads.
pub struct FunctionSetup {
    format: AsmFormat,
    cs: Capstone,
}

impl FunctionSetup {
    pub fn new(executable: &Executable, format: AsmFormat) -> DiffResult<Self> {
        let mode = if executable.is_64bit() {
            ArchMode::Mode64
        } else {
            ArchMode::Mode32
        };
        let syntax = match format {
            AsmFormat::Agas => ArchSyntax::Att,
            AsmFormat::Masm => ArchSyntax::Masm,
            AsmFormat::Igas | AsmFormat::Default => ArchSyntax::Intel,
        };
        let cs = Capstone::new()
            .x86()
            .mode(mode)
            .syntax(syntax)
            .detail(false)
            .build()?;
        Ok(Self { format, cs })
    }

    pub fn format(&self) -> AsmFormat {
        self.format
    }
}

struct RawInstruction {
    address: u64,
    bytes: Vec<u8>,
    mnemonic: String,
    op_str: String,
    invalid: bool,
}

fn is_jump_mnemonic(mnemonic: &str) -> bool {
    mnemonic.starts_with('j') || mnemonic.starts_with("loop")
}

fn is_call_mnemonic(mnemonic: &str) -> bool {
    mnemonic.starts_with("call")
}

/// Decodes every byte of the range. Undecodable bytes become one-byte
/// `invalid` entries and decoding resumes behind them.
fn decode_all(cs: &Capstone, code: &[u8], start: u64) -> DiffResult<Vec<RawInstruction>> {
    let mut raw = Vec::new();
    let mut offset = 0usize;
    while offset < code.len() {
        let insns = cs.disasm_all(&code[offset..], start + offset as u64)?;
        let mut consumed = 0usize;
        for insn in insns.iter() {
            raw.push(RawInstruction {
                address: insn.address(),
                bytes: insn.bytes().to_vec(),
                mnemonic: insn.mnemonic().unwrap_or("").to_string(),
                op_str: insn.op_str().unwrap_or("").to_string(),
                invalid: false,
            });
            consumed += insn.bytes().len();
        }
        offset += consumed;
        if offset < code.len() {
            raw.push(RawInstruction {
                address: start + offset as u64,
                bytes: vec![code[offset]],
                mnemonic: "(bad)".to_string(),
                op_str: String::new(),
                invalid: true,
            });
            offset += 1;
        }
    }
    Ok(raw)
}

/// Direct branch/call operands are a bare address literal.
fn parse_direct_target(op_str: &str) -> Option<u64> {
    let trimmed = op_str.trim().trim_start_matches('*');
    let hex = trimmed.strip_prefix("0x")?;
    u64::from_str_radix(hex, 16).ok()
}

fn resolve_address(
    address: u64,
    executable: &Executable,
    local_labels: &BTreeSet<u64>,
    is_branch: bool,
) -> Option<String> {
    if local_labels.contains(&address) {
        return Some(format!("{}{:x}", PREFIX_LOC, address));
    }
    if let Some(symbol) = executable.get_symbol_at(address) {
        if !symbol.demangled_name.is_empty() {
            return Some(symbol.demangled_name.clone());
        }
        return Some(symbol.name.clone());
    }
    let section = executable.find_section(address)?;
    if is_branch {
        return Some(format!("{}{:x}", PREFIX_LOC, address));
    }
    match section.section_type {
        SectionType::Code => Some(format!("{}{:x}", PREFIX_SUB, address)),
        SectionType::Data => Some(format!("{}{:x}", PREFIX_UNK, address)),
    }
}

/// Replaces every address literal in the operand text that points into the
/// image with a symbol or placeholder name. Literals outside the image
/// (plain immediates) are left alone.
fn substitute_operands(
    op_str: &str,
    address_re: &Regex,
    executable: &Executable,
    local_labels: &BTreeSet<u64>,
    is_branch: bool,
) -> String {
    let mut out = String::with_capacity(op_str.len());
    let mut last = 0usize;
    for m in address_re.find_iter(op_str) {
        out.push_str(&op_str[last..m.start()]);
        let parsed = u64::from_str_radix(&m.as_str()[2..], 16).ok();
        let name = parsed.and_then(|a| resolve_address(a, executable, local_labels, is_branch));
        match name {
            Some(name) => out.push_str(&name),
            None => out.push_str(m.as_str()),
        }
        last = m.end();
    }
    out.push_str(&op_str[last..]);
    out
}

/// Disassembles `[start, end)` of the executable into a stream of labels
/// and instructions. A range that lies outside every section yields an
/// empty stream; the caller treats the function as not disassembled.
pub fn disassemble_range(
    setup: &FunctionSetup,
    executable: &Executable,
    start: u64,
    end: u64,
) -> DiffResult<Vec<StreamItem>> {
    if start >= end {
        return Err(DiffError::InvalidAddressRange { start, end });
    }
    let Some(code) = executable.read_bytes(start, end) else {
        return Ok(Vec::new());
    };

    let raw = decode_all(&setup.cs, code, start)?;

    // First pass: collect branch targets inside the range. They become
    // named positions in the stream.
    let mut local_labels: BTreeSet<u64> = BTreeSet::new();
    for insn in &raw {
        if insn.invalid || !is_jump_mnemonic(&insn.mnemonic) {
            continue;
        }
        if let Some(target) = parse_direct_target(&insn.op_str) {
            if target >= start && target < end {
                local_labels.insert(target);
            }
        }
    }

    let address_re = Regex::new(r"0x[0-9a-fA-F]+").expect("static pattern");

    let mut items: Vec<StreamItem> = Vec::with_capacity(raw.len() + local_labels.len());
    for insn in &raw {
        if local_labels.contains(&insn.address) {
            items.push(StreamItem::Label(Label {
                label: format!("{}{:x}", PREFIX_LOC, insn.address),
            }));
        }

        let mut out = Instruction::new();
        out.address = insn.address;
        out.bytes.set(&insn.bytes);
        out.is_invalid = insn.invalid;
        if insn.invalid {
            out.text = insn.mnemonic.clone();
            items.push(StreamItem::Instr(out));
            continue;
        }

        out.is_jump = is_jump_mnemonic(&insn.mnemonic);
        let is_branch = out.is_jump;
        if is_branch || is_call_mnemonic(&insn.mnemonic) {
            if let Some(target) = parse_direct_target(&insn.op_str) {
                let displacement = target as i128 - insn.address as i128;
                out.jump_len = displacement.clamp(i16::MIN as i128, i16::MAX as i128) as i16;
            }
        }

        let ops = substitute_operands(&insn.op_str, &address_re, executable, &local_labels, is_branch);
        out.text = if ops.is_empty() {
            insn.mnemonic.clone()
        } else {
            format!("{} {}", insn.mnemonic, ops)
        };
        items.push(StreamItem::Instr(out));
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_target_parsing() {
        assert_eq!(parse_direct_target("0x401000"), Some(0x401000));
        assert_eq!(parse_direct_target(" *0x10 "), Some(0x10));
        assert_eq!(parse_direct_target("eax"), None);
        assert_eq!(parse_direct_target("dword ptr [0x10]"), None);
    }

    #[test]
    fn jump_mnemonics() {
        assert!(is_jump_mnemonic("jmp"));
        assert!(is_jump_mnemonic("jne"));
        assert!(is_jump_mnemonic("loopne"));
        assert!(!is_jump_mnemonic("call"));
        assert!(!is_jump_mnemonic("mov"));
        assert!(is_call_mnemonic("call"));
    }
}
