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

//! Debug database: functions, compilands and source files extracted from
//! DWARF. This is the side channel that lets the comparison link
//! instructions back to source lines and group functions by translation
//! unit or file.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::rc::Rc;

use gimli::Reader as _;
use object::{Object, ObjectSection};

use crate::bundles::FunctionGroup;
use crate::error::DiffResult;
use crate::symbols::demangle_name;
use crate::utils::canonicalize_path;

type DwarfReader = gimli::EndianRcSlice<gimli::RunTimeEndian>;

/// Maps interned file ids to canonical paths.
#[derive(Debug, Default)]
pub struct FileTable {
    files_by_id: BTreeMap<u32, String>,
    id_by_file: BTreeMap<String, u32>,
    next_id: u32,
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            files_by_id: BTreeMap::new(),
            id_by_file: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn intern(&mut self, path: String) -> u32 {
        let canonical = canonicalize_path(&path);
        if let Some(&id) = self.id_by_file.get(&canonical) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.files_by_id.insert(id, canonical.clone());
        self.id_by_file.insert(canonical, id);
        id
    }

    pub fn get_by_id(&self, id: u32) -> Option<&String> {
        self.files_by_id.get(&id)
    }
}

/// One function as the debug info records it. `decorated_name` is the
/// exact linkage name and matches the executable's symbol table.
#[derive(Debug, Clone)]
pub struct DbFunction {
    pub decorated_name: String,
    pub demangled_name: String,
    pub address: u64,
    pub size: u64,
    pub source_file_id: Option<u32>,
    /// address -> source line rows within the function range.
    pub lines: BTreeMap<u64, u32>,
}

/// A translation unit and the functions compiled into it.
#[derive(Debug, Clone)]
pub struct DbCompiland {
    pub name: String,
    pub function_ids: Vec<u32>,
}

/// A source file (.h and .c alike) and the functions defined in it.
#[derive(Debug, Clone)]
pub struct DbSourceFile {
    pub name: String,
    pub function_ids: Vec<u32>,
}

pub struct DebugDb {
    functions: Vec<DbFunction>,
    compilands: Vec<DbCompiland>,
    source_files: Vec<DbSourceFile>,
    file_table: FileTable,
    name_to_function: HashMap<String, u32>,
}

fn dwarf_attr_to_string(
    dwarf: &gimli::Dwarf<DwarfReader>,
    unit: &gimli::Unit<DwarfReader>,
    attr: gimli::AttributeValue<DwarfReader>,
) -> Option<String> {
    dwarf
        .attr_string(unit, attr)
        .ok()
        .and_then(|s| s.to_string_lossy().ok().map(|cow| cow.to_string()))
}

impl DebugDb {
    /// Reads the DWARF sections of `path` and extracts the function,
    /// compiland and source file tables.
    pub fn read(path: &str, verbose: bool) -> DiffResult<Self> {
        if verbose {
            eprintln!("Parsing debug info '{}'...", path);
        }

        let file = fs::File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        let obj_file = object::File::parse(&*mmap)?;

        let load_section = |id: gimli::SectionId| -> Result<DwarfReader, gimli::Error> {
            let data = obj_file
                .section_by_name(id.name())
                .map(|s| s.uncompressed_data().unwrap_or_default())
                .unwrap_or_default();
            let data_rc: Rc<[u8]> = match data {
                Cow::Borrowed(b) => Rc::from(b),
                Cow::Owned(o) => Rc::from(o),
            };
            let endian = if obj_file.is_little_endian() {
                gimli::RunTimeEndian::Little
            } else {
                gimli::RunTimeEndian::Big
            };
            Ok(gimli::EndianRcSlice::new(data_rc, endian))
        };
        let dwarf = gimli::Dwarf::load(&load_section)?;

        let mut db = Self {
            functions: Vec::new(),
            compilands: Vec::new(),
            source_files: Vec::new(),
            file_table: FileTable::new(),
            name_to_function: HashMap::new(),
        };

        // All line rows across units; functions pick their slice by range.
        let mut line_rows: BTreeMap<u64, (u32, u32)> = BTreeMap::new();

        let mut units = dwarf.units();
        while let Some(header) = units.next()? {
            let unit = dwarf.unit(header)?;

            // Mapping from CU-local file index to interned file id.
            let mut file_map: HashMap<u64, u32> = HashMap::new();

            if let Some(program) = unit.line_program.clone() {
                let mut rows = program.rows();
                while let Some((header, row)) = rows.next_row()? {
                    if !row.is_stmt() {
                        continue;
                    }
                    let Some(line) = row.line() else { continue };
                    let local_file_idx = row.file_index();
                    let global_id = *file_map.entry(local_file_idx).or_insert_with(|| {
                        if let Some(fe) = header.file(local_file_idx) {
                            let mut p = String::new();
                            if let Some(dir_attr) = header.directory(fe.directory_index()) {
                                if let Some(dir) = dwarf_attr_to_string(&dwarf, &unit, dir_attr) {
                                    p.push_str(&dir);
                                    p.push('/');
                                }
                            }
                            if let Some(name) = dwarf_attr_to_string(&dwarf, &unit, fe.path_name()) {
                                p.push_str(&name);
                            }
                            db.file_table.intern(p)
                        } else {
                            0
                        }
                    });
                    line_rows
                        .entry(row.address())
                        .or_insert((global_id, line.get().min(u32::MAX as u64) as u32));
                }
            }

            let mut compiland = DbCompiland {
                name: String::new(),
                function_ids: Vec::new(),
            };

            let mut entries = unit.entries();
            while let Some((_, entry)) = entries.next_dfs()? {
                match entry.tag() {
                    gimli::DW_TAG_compile_unit => {
                        if let Some(attr) = entry.attr_value(gimli::DW_AT_name)? {
                            if let Some(name) = dwarf_attr_to_string(&dwarf, &unit, attr) {
                                compiland.name = name;
                            }
                        }
                    }
                    gimli::DW_TAG_subprogram => {
                        if let Some(function) = Self::read_subprogram(&dwarf, &unit, entry)? {
                            let function_id = db.functions.len() as u32;
                            db.name_to_function
                                .entry(function.decorated_name.clone())
                                .or_insert(function_id);
                            compiland.function_ids.push(function_id);
                            db.functions.push(function);
                        }
                    }
                    _ => {}
                }
            }

            if !compiland.function_ids.is_empty() {
                db.compilands.push(compiland);
            }
        }

        // Attach line rows and derive each function's source file from its
        // first row.
        for function in &mut db.functions {
            let end = function.address + function.size;
            for (&address, &(file_id, line)) in line_rows.range(function.address..end) {
                function.lines.insert(address, line);
                if function.source_file_id.is_none() && file_id != 0 {
                    function.source_file_id = Some(file_id);
                }
            }
        }

        // Invert into the per-file function lists.
        let mut file_to_functions: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (function_id, function) in db.functions.iter().enumerate() {
            if let Some(file_id) = function.source_file_id {
                file_to_functions
                    .entry(file_id)
                    .or_default()
                    .push(function_id as u32);
            }
        }
        for (file_id, function_ids) in file_to_functions {
            let Some(name) = db.file_table.get_by_id(file_id) else {
                continue;
            };
            db.source_files.push(DbSourceFile {
                name: name.clone(),
                function_ids,
            });
        }

        if verbose {
            eprintln!(
                "Loaded debug info '{}': {} functions, {} compilands, {} source files",
                path,
                db.functions.len(),
                db.compilands.len(),
                db.source_files.len()
            );
        }

        Ok(db)
    }

    fn read_subprogram(
        dwarf: &gimli::Dwarf<DwarfReader>,
        unit: &gimli::Unit<DwarfReader>,
        entry: &gimli::DebuggingInformationEntry<DwarfReader>,
    ) -> Result<Option<DbFunction>, gimli::Error> {
        // Linkage name first (mangled), plain name as fallback.
        let linkage_name_attr = entry
            .attr_value(gimli::DW_AT_linkage_name)?
            .or(entry.attr_value(gimli::DW_AT_MIPS_linkage_name)?);

        let mut raw_name_opt: Option<String> = None;
        if let Some(attr) = linkage_name_attr {
            raw_name_opt = dwarf_attr_to_string(dwarf, unit, attr);
        }
        if raw_name_opt.is_none() {
            if let Some(attr) = entry.attr_value(gimli::DW_AT_name)? {
                raw_name_opt = dwarf_attr_to_string(dwarf, unit, attr);
            }
        }
        let Some(decorated_name) = raw_name_opt else {
            return Ok(None);
        };

        let mut low_opt = None;
        if let Some(gimli::AttributeValue::Addr(addr)) = entry.attr_value(gimli::DW_AT_low_pc)? {
            low_opt = Some(addr);
        }
        let Some(low) = low_opt else { return Ok(None) };

        let mut high_opt = None;
        if let Some(high_attr) = entry.attr_value(gimli::DW_AT_high_pc)? {
            match high_attr {
                gimli::AttributeValue::Addr(addr) => high_opt = Some(addr),
                gimli::AttributeValue::Udata(size) => high_opt = Some(low + size),
                _ => {}
            }
        }
        let Some(high) = high_opt else { return Ok(None) };

        let size = high.saturating_sub(low);
        if size == 0 {
            return Ok(None);
        }

        let demangled_name = demangle_name(&decorated_name);
        Ok(Some(DbFunction {
            decorated_name,
            demangled_name,
            address: low,
            size,
            source_file_id: None,
            lines: BTreeMap::new(),
        }))
    }

    pub fn functions(&self) -> &[DbFunction] {
        &self.functions
    }

    pub fn compilands(&self) -> &[DbCompiland] {
        &self.compilands
    }

    pub fn source_files(&self) -> &[DbSourceFile] {
        &self.source_files
    }

    pub fn file_table(&self) -> &FileTable {
        &self.file_table
    }

    pub fn find_function(&self, decorated_name: &str) -> Option<&DbFunction> {
        self.name_to_function
            .get(decorated_name)
            .map(|&id| &self.functions[id as usize])
    }

    /// Canonical source file path for a function, if it links to one.
    pub fn source_file_name_for(&self, function: &DbFunction) -> Option<&String> {
        function
            .source_file_id
            .and_then(|id| self.file_table.get_by_id(id))
    }

    /// One grouping entry per compiland, members as decorated names.
    pub fn compiland_groups(&self) -> Vec<FunctionGroup> {
        self.compilands
            .iter()
            .map(|c| FunctionGroup {
                name: c.name.clone(),
                function_names: self.function_names_of(&c.function_ids),
            })
            .collect()
    }

    /// One grouping entry per source file, members as decorated names.
    pub fn source_file_groups(&self) -> Vec<FunctionGroup> {
        self.source_files
            .iter()
            .map(|s| FunctionGroup {
                name: s.name.clone(),
                function_names: self.function_names_of(&s.function_ids),
            })
            .collect()
    }

    fn function_names_of(&self, function_ids: &[u32]) -> Vec<String> {
        function_ids
            .iter()
            .map(|&id| self.functions[id as usize].decorated_name.clone())
            .collect()
    }
}
