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

//! Pipeline coordinator.
//!
//! Drives the phased build of a comparison: match functions by name, group
//! them into bundles, disassemble, link and load source files, compare.
//! The coordinator itself is single threaded; the per-function work of the
//! disassembly and comparison phases goes through the work queue, and the
//! outputs are applied back here. Phase order is strict, so the function
//! vectors have reached their final size before any work item references
//! them by index.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bundles::{
    build_bundle_family, BundleFamily, IndexT, MatchedFunction, NamedFunction, INVALID_INDEX,
};
use crate::compare_types::{AsmFormat, MatchBundleType};
use crate::debug_db::DebugDb;
use crate::disasm::{disassemble_range, FunctionSetup};
use crate::executable::Executable;
use crate::file_content::{FileContentStorage, LoadResult, TextFileContent};
use crate::function::Function;
use crate::matcher::run_comparison;
use crate::work_queue::{WorkOutput, WorkQueue, WorkQueueCommandId};

/// Why a work item was dispatched; kept per executable side so callers can
/// show what a file is currently busy with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkReason {
    Disassemble,
    BuildComparisonRecords,
}

/// Active work items of one side, in dispatch order.
#[derive(Debug, Default)]
pub struct AsyncWorkState {
    entries: Vec<(WorkQueueCommandId, WorkReason)>,
}

impl AsyncWorkState {
    pub fn add_hint(&mut self, command_id: WorkQueueCommandId, reason: WorkReason) {
        self.entries.push((command_id, reason));
    }

    pub fn remove_hint(&mut self, command_id: WorkQueueCommandId) {
        self.entries.retain(|(id, _)| *id != command_id);
    }

    pub fn has_work(&self) -> bool {
        !self.entries.is_empty()
    }

    /// The oldest still-active command id, if any.
    pub fn first_active_command_id(&self) -> Option<WorkQueueCommandId> {
        self.entries.first().map(|(id, _)| *id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub struct ComparisonPipeline {
    executables: [Option<Arc<Executable>>; 2],
    debug_dbs: [Option<Arc<DebugDb>>; 2],

    named_functions: [Vec<NamedFunction>; 2],
    name_to_named: [HashMap<String, IndexT>; 2],
    named_functions_built: bool,

    matched_functions: Vec<MatchedFunction>,
    matched_functions_built: bool,

    bundle_families: [Option<BundleFamily>; MatchBundleType::COUNT],

    file_cache: FileContentStorage,
    work_states: [AsyncWorkState; 2],

    /// Caller-selected matched function indices; survives rebuilds.
    selected_matched_indices: Vec<IndexT>,
}

impl Default for ComparisonPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonPipeline {
    pub fn new() -> Self {
        Self {
            executables: [None, None],
            debug_dbs: [None, None],
            named_functions: [Vec::new(), Vec::new()],
            name_to_named: [HashMap::new(), HashMap::new()],
            named_functions_built: false,
            matched_functions: Vec::new(),
            matched_functions_built: false,
            bundle_families: [None, None, None],
            file_cache: FileContentStorage::new(),
            work_states: [AsyncWorkState::default(), AsyncWorkState::default()],
            selected_matched_indices: Vec::new(),
        }
    }

    pub fn set_executable(&mut self, side: usize, executable: Arc<Executable>) {
        self.executables[side] = Some(executable);
    }

    pub fn set_debug_db(&mut self, side: usize, debug_db: Arc<DebugDb>) {
        self.debug_dbs[side] = Some(debug_db);
    }

    // ---- readiness gates ----

    pub fn executables_loaded(&self) -> bool {
        self.executables.iter().all(Option::is_some)
    }

    pub fn named_functions_built(&self) -> bool {
        self.named_functions_built
    }

    pub fn matched_functions_built(&self) -> bool {
        self.matched_functions_built
    }

    pub fn bundles_ready(&self, bundle_type: MatchBundleType) -> bool {
        self.bundle_families[bundle_type.as_index()].is_some()
    }

    pub fn has_async_work(&self) -> bool {
        self.work_states.iter().any(AsyncWorkState::has_work)
    }

    pub fn first_active_command_id(&self, side: usize) -> Option<WorkQueueCommandId> {
        self.work_states[side].first_active_command_id()
    }

    // ---- accessors ----

    pub fn executable(&self, side: usize) -> Option<&Arc<Executable>> {
        self.executables[side].as_ref()
    }

    pub fn named_functions(&self, side: usize) -> &[NamedFunction] {
        &self.named_functions[side]
    }

    pub fn named_function(&self, side: usize, index: IndexT) -> &NamedFunction {
        &self.named_functions[side][index as usize]
    }

    pub fn matched_functions(&self) -> &[MatchedFunction] {
        &self.matched_functions
    }

    pub fn matched_function(&self, index: IndexT) -> &MatchedFunction {
        &self.matched_functions[index as usize]
    }

    /// The function bodies behind a matched function, left and right.
    pub fn matched_function_bodies(&self, index: IndexT) -> [&Function; 2] {
        let matched = &self.matched_functions[index as usize];
        [
            &self.named_functions[0][matched.named_indices[0] as usize].function,
            &self.named_functions[1][matched.named_indices[1] as usize].function,
        ]
    }

    pub fn bundle_family(&self, bundle_type: MatchBundleType) -> Option<&BundleFamily> {
        self.bundle_families[bundle_type.as_index()].as_ref()
    }

    pub fn all_matched_indices(&self) -> Vec<IndexT> {
        (0..self.matched_functions.len() as IndexT).collect()
    }

    pub fn select_matched_functions(&mut self, indices: Vec<IndexT>) {
        self.selected_matched_indices = indices;
    }

    pub fn selected_matched_indices(&self) -> &[IndexT] {
        &self.selected_matched_indices
    }

    // ---- phases ----

    /// Phase 1: builds the per-side named function lists from code-section
    /// symbols and pairs them by exact decorated name.
    pub fn build_matched_functions(&mut self) {
        assert!(self.executables_loaded());

        for side in 0..2 {
            let executable = self.executables[side].as_ref().unwrap();
            let debug_db = self.debug_dbs[side].as_deref();
            let mut named = Vec::new();
            let mut name_map = HashMap::new();
            for symbol in executable.get_symbols() {
                if symbol.size == 0 || !executable.is_symbol_in_code_section(symbol) {
                    continue;
                }
                if name_map.contains_key(&symbol.name) {
                    continue;
                }
                let can_link = debug_db.is_some_and(|db| db.find_function(&symbol.name).is_some());
                name_map.insert(symbol.name.clone(), named.len() as IndexT);
                named.push(NamedFunction {
                    name: symbol.name.clone(),
                    demangled_name: symbol.demangled_name.clone(),
                    function: Function::with_address_range(
                        symbol.address,
                        symbol.address + symbol.size,
                    ),
                    can_link_to_source_file: can_link,
                    has_loaded_source_file: false,
                    matched_index: INVALID_INDEX,
                });
            }
            self.named_functions[side] = named;
            self.name_to_named[side] = name_map;
        }
        self.named_functions_built = true;

        // Walk the smaller symbol set and probe the other side's map.
        let less_side = usize::from(self.named_functions[0].len() >= self.named_functions[1].len());
        let more_side = 1 - less_side;
        for less_idx in 0..self.named_functions[less_side].len() {
            let name = self.named_functions[less_side][less_idx].name.clone();
            let Some(&more_idx) = self.name_to_named[more_side].get(&name) else {
                continue;
            };
            let matched_index = self.matched_functions.len() as IndexT;
            let mut named_indices = [0 as IndexT; 2];
            named_indices[less_side] = less_idx as IndexT;
            named_indices[more_side] = more_idx;
            self.matched_functions.push(MatchedFunction {
                name,
                named_indices,
                comparison: Default::default(),
            });
            self.named_functions[less_side][less_idx].matched_index = matched_index;
            self.named_functions[more_side][more_idx as usize].matched_index = matched_index;
        }
        self.matched_functions_built = true;
    }

    /// Phase 2: builds the bundle family for a policy, on demand. The
    /// grouping comes from whichever side has a debug database.
    pub fn build_bundles(&mut self, bundle_type: MatchBundleType) {
        assert!(self.matched_functions_built);
        let slot = bundle_type.as_index();
        if self.bundle_families[slot].is_some() {
            return;
        }

        let bundling_side = usize::from(self.debug_dbs[0].is_none());
        let groups = match (bundle_type, self.debug_dbs[bundling_side].as_deref()) {
            (MatchBundleType::Compiland, Some(db)) => db.compiland_groups(),
            (MatchBundleType::SourceFile, Some(db)) => db.source_file_groups(),
            _ => Vec::new(),
        };
        let family = build_bundle_family(
            bundle_type,
            &groups,
            &self.named_functions,
            &self.matched_functions,
            &self.name_to_named[bundling_side],
            bundling_side,
        );
        self.bundle_families[slot] = Some(family);
    }

    /// Phase 3: dispatches one disassembly work item per function body not
    /// yet disassembled and applies the resulting streams.
    pub fn disassemble_functions(&mut self, queue: &mut WorkQueue, format: AsmFormat) {
        assert!(self.named_functions_built);
        for side in 0..2 {
            let executable = Arc::clone(self.executables[side].as_ref().unwrap());
            for (idx, named) in self.named_functions[side].iter().enumerate() {
                if named.is_disassembled() {
                    continue;
                }
                let begin = named.function.begin_address();
                let end = named.function.end_address();
                let exe = Arc::clone(&executable);
                let named_index = idx as u32;
                let command_id = queue.dispatch(move || {
                    let items = FunctionSetup::new(&exe, format)
                        .and_then(|setup| disassemble_range(&setup, &exe, begin, end))
                        .unwrap_or_else(|err| {
                            eprintln!("Disassembly failed at 0x{:x}: {}", begin, err);
                            Vec::new()
                        });
                    WorkOutput::InstructionStream {
                        side,
                        named_index,
                        items,
                    }
                });
                self.work_states[side].add_hint(command_id, WorkReason::Disassemble);
            }
        }
        self.apply_results(queue);
    }

    /// Phase 4: attaches source file names and line numbers from the debug
    /// databases. Functions without debug info keep an empty file name.
    pub fn link_source_files(&mut self) {
        for side in 0..2 {
            let Some(debug_db) = self.debug_dbs[side].clone() else {
                continue;
            };
            for named in &mut self.named_functions[side] {
                let Some(db_function) = debug_db.find_function(&named.name) else {
                    continue;
                };
                let Some(file_name) = debug_db.source_file_name_for(db_function) else {
                    continue;
                };
                named.function.set_source_file(file_name, &db_function.lines);
            }
        }
    }

    /// Phase 5: loads each distinct linked source file into the cache.
    pub fn load_source_files(&mut self) {
        for side in 0..2 {
            for named in &mut self.named_functions[side] {
                if !named.is_linked_to_source_file() {
                    continue;
                }
                let file_name = named.function.get_source_file_name().to_string();
                let result = self.file_cache.load_content(&file_name);
                named.has_loaded_source_file = result != LoadResult::Failed;
            }
        }
    }

    /// Phase 6: runs the alignment for the given matched functions on the
    /// work queue and stores the results.
    pub fn compare_functions(
        &mut self,
        queue: &mut WorkQueue,
        matched_indices: &[IndexT],
        lookahead_limit: u32,
    ) {
        assert!(self.matched_functions_built);
        for &matched_idx in matched_indices {
            let bodies = self.matched_function_bodies(matched_idx);
            let left = bodies[0].get_instructions().to_vec();
            let right = bodies[1].get_instructions().to_vec();
            let command_id = queue.dispatch(move || WorkOutput::Comparison {
                matched_index: matched_idx,
                result: run_comparison(&left, &right, lookahead_limit),
            });
            self.work_states[0].add_hint(command_id, WorkReason::BuildComparisonRecords);
        }
        self.apply_results(queue);
    }

    /// Applies finished work items to their slots. Cancelled items never
    /// reach this point; their slots keep the pre-phase state.
    fn apply_results(&mut self, queue: &mut WorkQueue) {
        let named_functions = &mut self.named_functions;
        let matched_functions = &mut self.matched_functions;
        let work_states = &mut self.work_states;
        queue.wait_results(|work_result| {
            for state in work_states.iter_mut() {
                state.remove_hint(work_result.command_id);
            }
            match work_result.output {
                WorkOutput::InstructionStream {
                    side,
                    named_index,
                    items,
                } => {
                    named_functions[side][named_index as usize]
                        .function
                        .set_instructions(items);
                }
                WorkOutput::Comparison {
                    matched_index,
                    result,
                } => {
                    matched_functions[matched_index as usize].comparison = result;
                }
            }
        });
    }

    /// Recomputes a family's progress counters by rescanning member flags.
    pub fn update_bundle_counters(&mut self, bundle_type: MatchBundleType) {
        let slot = bundle_type.as_index();
        let Some(family) = self.bundle_families[slot].as_mut() else {
            return;
        };
        family.update_disassembled_count(&self.named_functions, &self.matched_functions);
        family.update_linked_source_file_count(&self.named_functions, &self.matched_functions);
        family.update_loaded_source_file_count(&self.named_functions, &self.matched_functions);
        family.update_compared_count(&self.matched_functions);
    }

    // ---- source content access for rendering ----

    pub fn source_content(&self, file_name: &str) -> Option<&TextFileContent> {
        self.file_cache.find_content(file_name)
    }

    pub fn load_source_file(&mut self, file_name: &str) -> LoadResult {
        self.file_cache.load_content(file_name)
    }

    /// Drops all cached file contents; used between source-file bundles to
    /// keep at most one bundle's files resident.
    pub fn flush_source_cache(&mut self) {
        self.file_cache.clear();
    }

    /// Resets everything derived from the inputs. Caller-selected indices
    /// are kept so a UI can restore its lists after the rebuild.
    pub fn prepare_rebuild(&mut self) {
        self.named_functions = [Vec::new(), Vec::new()];
        self.name_to_named = [HashMap::new(), HashMap::new()];
        self.named_functions_built = false;
        self.matched_functions = Vec::new();
        self.matched_functions_built = false;
        self.bundle_families = [None, None, None];
        self.file_cache.clear();
        for state in &mut self.work_states {
            state.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_state_tracks_first_active() {
        let mut state = AsyncWorkState::default();
        assert!(!state.has_work());
        state.add_hint(3, WorkReason::Disassemble);
        state.add_hint(7, WorkReason::BuildComparisonRecords);
        assert!(state.has_work());
        assert_eq!(state.first_active_command_id(), Some(3));
        state.remove_hint(3);
        assert_eq!(state.first_active_command_id(), Some(7));
        state.remove_hint(7);
        assert!(!state.has_work());
    }

    #[test]
    fn rebuild_preserves_selection() {
        let mut pipeline = ComparisonPipeline::new();
        pipeline.select_matched_functions(vec![1, 2, 3]);
        pipeline.prepare_rebuild();
        assert_eq!(pipeline.selected_matched_indices(), &[1, 2, 3]);
        assert!(!pipeline.named_functions_built());
        assert!(!pipeline.matched_functions_built());
    }
}
