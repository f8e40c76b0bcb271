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

//! Function bookkeeping and bundling.
//!
//! Named functions are the flat per-side lists everything else indexes
//! into. Bundles group them by compiland, by source file or into one, for
//! aggregated reporting; a bundle owns indices only.

use std::collections::{HashMap, HashSet};

use crate::compare_types::{ComparisonResult, MatchBundleType};
use crate::function::Function;

pub type IndexT = u32;

/// Sentinel for "no matched function".
pub const INVALID_INDEX: IndexT = !0;

/// A single function of one executable, matched or not.
#[derive(Debug)]
pub struct NamedFunction {
    /// Exact decorated symbol name; the pairing key.
    pub name: String,
    pub demangled_name: String,
    pub function: Function,
    /// A debug database knows this function, so source linking can succeed.
    pub can_link_to_source_file: bool,
    pub has_loaded_source_file: bool,
    /// Index into the matched functions list, `INVALID_INDEX` when unmatched.
    pub matched_index: IndexT,
}

impl Default for NamedFunction {
    fn default() -> Self {
        Self {
            name: String::new(),
            demangled_name: String::new(),
            function: Function::new(),
            can_link_to_source_file: false,
            has_loaded_source_file: false,
            matched_index: INVALID_INDEX,
        }
    }
}

impl NamedFunction {
    pub fn is_disassembled(&self) -> bool {
        self.function.is_disassembled()
    }

    pub fn is_linked_to_source_file(&self) -> bool {
        !self.function.get_source_file_name().is_empty()
    }

    pub fn has_loaded_source_file(&self) -> bool {
        self.has_loaded_source_file
    }

    pub fn is_matched(&self) -> bool {
        self.matched_index != INVALID_INDEX
    }
}

/// Pairs a function present in both executables.
#[derive(Debug, Default)]
pub struct MatchedFunction {
    pub name: String,
    /// Per-side indices into the named functions lists.
    pub named_indices: [IndexT; 2],
    pub comparison: ComparisonResult,
}

impl MatchedFunction {
    pub fn is_compared(&self) -> bool {
        !self.comparison.records.is_empty()
    }
}

/// A named group of function indices: compiland name, source file name or
/// `"all"`.
#[derive(Debug, Default)]
pub struct Bundle {
    pub name: String,
    /// Indices into the matched functions list.
    pub matched_indices: Vec<IndexT>,
    /// Per-side indices into the named functions lists.
    pub unmatched_indices: [Vec<IndexT>; 2],
}

impl Bundle {
    /// Function bodies covered by this bundle; a matched entry covers two.
    pub fn unit_count(&self) -> usize {
        self.matched_indices.len() * 2
            + self.unmatched_indices[0].len()
            + self.unmatched_indices[1].len()
    }
}

/// A grouping source entry: the group name and the decorated names of its
/// member functions, as enumerated by the debug database.
#[derive(Debug, Clone)]
pub struct FunctionGroup {
    pub name: String,
    pub function_names: Vec<String>,
}

/// All bundles of one policy plus progress counters. Counters are
/// recomputed by full rescans of the member flags; the lists are small
/// enough that this beats bookkeeping on every state change.
#[derive(Debug, Default)]
pub struct BundleFamily {
    pub bundle_type: MatchBundleType,
    pub bundles: Vec<Bundle>,
    pub disassembled_count: u32,
    pub linked_source_file_count: u32,
    pub missing_source_file_count: u32,
    pub loaded_source_file_count: u32,
    pub compared_count: u32,
}

impl BundleFamily {
    pub fn total_unit_count(&self) -> u32 {
        self.bundles.iter().map(|b| b.unit_count() as u32).sum()
    }

    pub fn total_matched_count(&self) -> u32 {
        self.bundles.iter().map(|b| b.matched_indices.len() as u32).sum()
    }

    fn for_each_named<F: FnMut(&NamedFunction)>(
        &self,
        named_functions: &[Vec<NamedFunction>; 2],
        matched_functions: &[MatchedFunction],
        mut visit: F,
    ) {
        for bundle in &self.bundles {
            for &matched_idx in &bundle.matched_indices {
                let matched = &matched_functions[matched_idx as usize];
                for side in 0..2 {
                    visit(&named_functions[side][matched.named_indices[side] as usize]);
                }
            }
            for side in 0..2 {
                for &named_idx in &bundle.unmatched_indices[side] {
                    visit(&named_functions[side][named_idx as usize]);
                }
            }
        }
    }

    pub fn update_disassembled_count(
        &mut self,
        named_functions: &[Vec<NamedFunction>; 2],
        matched_functions: &[MatchedFunction],
    ) {
        let mut count = 0;
        self.for_each_named(named_functions, matched_functions, |f| {
            if f.is_disassembled() {
                count += 1;
            }
        });
        self.disassembled_count = count;
    }

    pub fn update_linked_source_file_count(
        &mut self,
        named_functions: &[Vec<NamedFunction>; 2],
        matched_functions: &[MatchedFunction],
    ) {
        let mut linked = 0;
        let mut missing = 0;
        self.for_each_named(named_functions, matched_functions, |f| {
            if f.is_linked_to_source_file() {
                linked += 1;
            } else if !f.can_link_to_source_file {
                missing += 1;
            }
        });
        self.linked_source_file_count = linked;
        self.missing_source_file_count = missing;
    }

    pub fn update_loaded_source_file_count(
        &mut self,
        named_functions: &[Vec<NamedFunction>; 2],
        matched_functions: &[MatchedFunction],
    ) {
        let mut loaded = 0;
        self.for_each_named(named_functions, matched_functions, |f| {
            if f.has_loaded_source_file() {
                loaded += 1;
            }
        });
        self.loaded_source_file_count = loaded;
    }

    pub fn update_compared_count(&mut self, matched_functions: &[MatchedFunction]) {
        let mut count = 0;
        for bundle in &self.bundles {
            for &matched_idx in &bundle.matched_indices {
                if matched_functions[matched_idx as usize].is_compared() {
                    count += 1;
                }
            }
        }
        self.compared_count = count;
    }

    pub fn has_completed_disassembling(&self) -> bool {
        self.disassembled_count == self.total_unit_count()
    }

    pub fn has_completed_source_file_linking(&self) -> bool {
        self.linked_source_file_count + self.missing_source_file_count == self.total_unit_count()
    }

    pub fn has_completed_source_file_loading(&self) -> bool {
        self.has_completed_source_file_linking()
            && self.loaded_source_file_count == self.linked_source_file_count
    }

    /// Only matched members obtain comparison records, so completion is
    /// measured against the matched member count.
    pub fn has_completed_comparison(&self) -> bool {
        self.compared_count == self.total_matched_count()
    }
}

/// Builds the bundle family for one policy.
///
/// The grouping source enumerates decorated member names; each resolves
/// through the bundling side's name map and routes to the bundle's matched
/// or unmatched list. Names outside the map are dropped, the grouping
/// source being authoritative for its side. An empty grouping falls back
/// to a single catch-all bundle named "all".
pub fn build_bundle_family(
    bundle_type: MatchBundleType,
    groups: &[FunctionGroup],
    named_functions: &[Vec<NamedFunction>; 2],
    matched_functions: &[MatchedFunction],
    name_to_named: &HashMap<String, IndexT>,
    bundling_side: usize,
) -> BundleFamily {
    let mut family = BundleFamily {
        bundle_type,
        ..Default::default()
    };

    if bundle_type != MatchBundleType::None {
        let mut routed: HashSet<IndexT> = HashSet::new();
        for group in groups {
            let mut bundle = Bundle {
                name: group.name.clone(),
                ..Default::default()
            };
            for function_name in &group.function_names {
                let Some(&named_idx) = name_to_named.get(function_name) else {
                    continue;
                };
                if !routed.insert(named_idx) {
                    continue; // already claimed by an earlier group
                }
                let named = &named_functions[bundling_side][named_idx as usize];
                if named.is_matched() {
                    bundle.matched_indices.push(named.matched_index);
                } else {
                    bundle.unmatched_indices[bundling_side].push(named_idx);
                }
            }
            family.bundles.push(bundle);
        }
    }

    if family.bundles.is_empty() {
        family.bundles.push(build_catch_all_bundle(named_functions, matched_functions));
    }

    family
}

fn build_catch_all_bundle(
    named_functions: &[Vec<NamedFunction>; 2],
    matched_functions: &[MatchedFunction],
) -> Bundle {
    let mut bundle = Bundle {
        name: "all".to_string(),
        matched_indices: (0..matched_functions.len() as IndexT).collect(),
        ..Default::default()
    };
    for side in 0..2 {
        for (idx, named) in named_functions[side].iter().enumerate() {
            if !named.is_matched() {
                bundle.unmatched_indices[side].push(idx as IndexT);
            }
        }
    }
    bundle
}
