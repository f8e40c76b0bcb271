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

use std::collections::BTreeMap;

use crate::disasm::{disassemble_range, FunctionSetup};
use crate::error::DiffResult;
use crate::executable::Executable;
use crate::instr::StreamItem;

/// One function body: its address range in the executable, the decoded
/// instruction stream and, when linked, the source file it came from.
#[derive(Debug, Clone, Default)]
pub struct Function {
    begin_address: u64,
    end_address: u64,
    source_file_name: String,
    instructions: Vec<StreamItem>,
}

impl Function {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address_range(begin: u64, end: u64) -> Self {
        Self {
            begin_address: begin,
            end_address: end,
            ..Default::default()
        }
    }

    pub fn set_address_range(&mut self, begin: u64, end: u64) {
        self.begin_address = begin;
        self.end_address = end;
    }

    pub fn begin_address(&self) -> u64 {
        self.begin_address
    }

    pub fn end_address(&self) -> u64 {
        self.end_address
    }

    pub fn get_instructions(&self) -> &[StreamItem] {
        &self.instructions
    }

    pub fn set_instructions(&mut self, items: Vec<StreamItem>) {
        self.instructions = items;
    }

    /// Number of decoded instructions, labels excluded.
    pub fn get_instruction_count(&self) -> usize {
        self.instructions.iter().filter(|i| i.is_instruction()).count()
    }

    pub fn is_disassembled(&self) -> bool {
        self.get_instruction_count() != 0
    }

    pub fn get_source_file_name(&self) -> &str {
        &self.source_file_name
    }

    pub fn disassemble(&mut self, setup: &FunctionSetup, executable: &Executable) -> DiffResult<()> {
        self.instructions = disassemble_range(setup, executable, self.begin_address, self.end_address)?;
        Ok(())
    }

    /// Attaches the source file and stamps each instruction with the line
    /// of the nearest line-table row at or before its address.
    pub fn set_source_file(&mut self, file_name: &str, lines: &BTreeMap<u64, u32>) {
        self.source_file_name = file_name.to_string();
        for item in &mut self.instructions {
            if let StreamItem::Instr(instr) = item {
                if let Some((_, &line)) = lines.range(..=instr.address).next_back() {
                    instr.line_number = line.min(u16::MAX as u32) as u16;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instruction;

    #[test]
    fn source_lines_are_stamped_from_nearest_row() {
        let mut func = Function::with_address_range(0x1000, 0x1006);
        func.set_instructions(vec![
            StreamItem::Instr(Instruction {
                address: 0x1000,
                text: "push ebp".into(),
                ..Default::default()
            }),
            StreamItem::Instr(Instruction {
                address: 0x1003,
                text: "ret".into(),
                ..Default::default()
            }),
        ]);

        let mut lines = BTreeMap::new();
        lines.insert(0x1000u64, 10u32);
        lines.insert(0x1002u64, 12u32);
        func.set_source_file("src/demo.c", &lines);

        assert_eq!(func.get_source_file_name(), "src/demo.c");
        let instrs: Vec<_> = func
            .get_instructions()
            .iter()
            .filter_map(|i| i.as_instruction())
            .collect();
        assert_eq!(instrs[0].line_number, 10);
        assert_eq!(instrs[1].line_number, 12);
    }
}
