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

//! The executable being disassembled: sections, symbols and byte access.

use std::fs;

use object::{Object, ObjectSection, ObjectSymbol, SectionKind, SymbolKind};
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};
use crate::symbols::{demangle_name, ExeSymbol, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Code,
    Data,
}

pub struct SectionInfo {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub section_type: SectionType,
    data: Vec<u8>,
}

impl SectionInfo {
    pub fn contains(&self, address: u64) -> bool {
        address >= self.address && address < self.address + self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Symbol override sidecar. Lets users name functions the symbol table
/// does not cover, or correct sizes, without touching the binary.
#[derive(Debug, Serialize, Deserialize)]
struct ConfigSymbol {
    name: String,
    address: u64,
    size: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExeConfig {
    #[serde(default)]
    symbols: Vec<ConfigSymbol>,
}

pub struct Executable {
    filename: String,
    verbose: bool,
    is_64bit: bool,
    image_base: u64,
    sections: Vec<SectionInfo>,
    code_section_idx: Option<usize>,
    symbols: SymbolTable,
}

impl Executable {
    /// Parses the executable and indexes its sections and symbols. Section
    /// data is copied out so the result is self-contained and shareable
    /// across worker threads.
    pub fn read(path: &str, verbose: bool) -> DiffResult<Self> {
        if verbose {
            eprintln!("Parsing exe file '{}'...", path);
        }

        let file = fs::File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        if mmap.is_empty() {
            return Err(DiffError::EmptyInput(path.to_string()));
        }
        let obj_file = object::File::parse(&*mmap)?;

        let mut exe = Self {
            filename: path.to_string(),
            verbose,
            is_64bit: obj_file.is_64(),
            image_base: obj_file.relative_address_base(),
            sections: Vec::new(),
            code_section_idx: None,
            symbols: SymbolTable::new(),
        };

        let entrypoint = obj_file.entry();
        for section in obj_file.sections() {
            let name = section.name().unwrap_or("").to_string();
            if name.is_empty() || section.size() == 0 {
                continue;
            }
            let data = section.uncompressed_data().unwrap_or_default().into_owned();
            let section_type = if section.kind() == SectionKind::Text {
                SectionType::Code
            } else {
                SectionType::Data
            };
            let info = SectionInfo {
                name,
                address: section.address(),
                size: section.size(),
                section_type,
                data,
            };
            if exe.code_section_idx.is_none() && info.contains(entrypoint) {
                exe.code_section_idx = Some(exe.sections.len());
            }
            exe.sections.push(info);
        }
        // Entry point outside every section (e.g. a library): first text
        // section wins.
        if exe.code_section_idx.is_none() {
            exe.code_section_idx = exe
                .sections
                .iter()
                .position(|s| s.section_type == SectionType::Code);
        }

        if verbose {
            eprintln!("Indexing embedded symbols...");
        }
        for symbol in obj_file.symbols() {
            let Ok(name) = symbol.name() else { continue };
            if name.is_empty() {
                continue;
            }
            if symbol.kind() != SymbolKind::Text && symbol.kind() != SymbolKind::Data {
                continue;
            }
            exe.add_symbol(
                ExeSymbol {
                    name: name.to_string(),
                    demangled_name: demangle_name(name),
                    address: symbol.address(),
                    size: symbol.size(),
                },
                false,
            );
        }

        if verbose {
            eprintln!(
                "Loaded '{}': {} sections, {} symbols",
                path,
                exe.sections.len(),
                exe.symbols.len()
            );
        }

        Ok(exe)
    }

    pub fn get_filename(&self) -> &str {
        &self.filename
    }

    pub fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    pub fn get_sections(&self) -> &[SectionInfo] {
        &self.sections
    }

    pub fn get_code_section(&self) -> Option<&SectionInfo> {
        self.code_section_idx.map(|idx| &self.sections[idx])
    }

    pub fn find_section(&self, address: u64) -> Option<&SectionInfo> {
        self.sections.iter().find(|s| s.contains(address))
    }

    pub fn get_symbols(&self) -> &[ExeSymbol] {
        self.symbols.symbols()
    }

    pub fn get_symbol(&self, name: &str) -> Option<&ExeSymbol> {
        self.symbols.get_by_name(name)
    }

    /// Symbol containing the address, if any.
    pub fn get_symbol_at(&self, address: u64) -> Option<&ExeSymbol> {
        self.symbols.lookup(address)
    }

    pub fn is_symbol_in_code_section(&self, symbol: &ExeSymbol) -> bool {
        self.get_code_section()
            .is_some_and(|code| code.contains(symbol.address))
    }

    /// Raw bytes for `[start, end)`, when the range lies within one section.
    pub fn read_bytes(&self, start: u64, end: u64) -> Option<&[u8]> {
        let section = self.find_section(start)?;
        if end > section.address + section.size || start >= end {
            return None;
        }
        let offset = (start - section.address) as usize;
        let len = (end - start) as usize;
        section.data.get(offset..offset + len)
    }

    pub fn add_symbol(&mut self, symbol: ExeSymbol, overwrite: bool) {
        self.symbols.insert(symbol, overwrite);
    }

    /// Loads a JSON symbol sidecar; loaded symbols may overwrite the ones
    /// read from the binary.
    pub fn load_config(&mut self, file_name: &str, overwrite_symbols: bool) -> DiffResult<()> {
        let text = fs::read_to_string(file_name)?;
        let config: ExeConfig = serde_json::from_str(&text)?;
        if self.verbose {
            eprintln!("Loaded config '{}': {} symbols", file_name, config.symbols.len());
        }
        for symbol in config.symbols {
            let demangled_name = demangle_name(&symbol.name);
            self.add_symbol(
                ExeSymbol {
                    name: symbol.name,
                    demangled_name,
                    address: symbol.address,
                    size: symbol.size,
                },
                overwrite_symbols,
            );
        }
        Ok(())
    }

    pub fn save_config(&self, file_name: &str) -> DiffResult<()> {
        let config = ExeConfig {
            symbols: self
                .symbols
                .symbols()
                .iter()
                .map(|s| ConfigSymbol {
                    name: s.name.clone(),
                    address: s.address,
                    size: s.size,
                })
                .collect(),
        };
        let text = serde_json::to_string_pretty(&config)?;
        fs::write(file_name, text)?;
        Ok(())
    }
}
