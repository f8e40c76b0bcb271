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

//! High level operations: load inputs, produce a raw listing of one
//! executable, or run the full comparison of two and write per-bundle
//! report files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundles::IndexT;
use crate::compare_types::{AsmFormat, MatchBundleType, MatchStrictness};
use crate::debug_db::DebugDb;
use crate::disasm::FunctionSetup;
use crate::error::{DiffError, DiffResult};
use crate::executable::Executable;
use crate::function::Function;
use crate::pipeline::ComparisonPipeline;
use crate::printer::{append_asm_listing, append_comparison_report, PrintConfig};
use crate::utils::file_basename;
use crate::work_queue::WorkQueue;

pub struct LoadExecutableOptions {
    pub input_file: String,
    /// Optional JSON symbol sidecar; its symbols overwrite embedded ones.
    pub config_file: Option<String>,
    pub verbose: bool,
}

pub fn load_executable(options: &LoadExecutableOptions) -> DiffResult<Executable> {
    let mut executable = Executable::read(&options.input_file, options.verbose)?;
    if let Some(config_file) = &options.config_file {
        executable.load_config(config_file, true)?;
    }
    Ok(executable)
}

pub fn load_debug_database(input_file: &str, verbose: bool) -> DiffResult<DebugDb> {
    DebugDb::read(input_file, verbose)
}

pub struct AsmOutputOptions<'a> {
    pub executable: &'a Executable,
    pub output_file: String,
    pub start_addr: u64,
    pub end_addr: u64,
    pub format: AsmFormat,
    pub print_indent_len: u32,
}

/// Disassembles one address range into a plain text listing.
pub fn process_asm_output(options: &AsmOutputOptions) -> DiffResult<()> {
    if options.start_addr >= options.end_addr {
        return Err(DiffError::InvalidAddressRange {
            start: options.start_addr,
            end: options.end_addr,
        });
    }
    if options.format == AsmFormat::Masm {
        return Err(DiffError::UnsupportedFormat("masm".to_string()));
    }

    let setup = FunctionSetup::new(options.executable, options.format)?;
    let mut function = Function::with_address_range(options.start_addr, options.end_addr);
    function.disassemble(&setup, options.executable)?;

    let mut text = String::new();
    append_asm_listing(&mut text, function.get_instructions(), options.print_indent_len);
    fs::write(&options.output_file, text)
        .map_err(|_| DiffError::OutputFile(options.output_file.clone()))?;
    Ok(())
}

pub struct AsmComparisonOptions {
    pub executables: [Arc<Executable>; 2],
    pub debug_dbs: [Option<Arc<DebugDb>>; 2],
    pub output_file: String,
    pub format: AsmFormat,
    pub bundle_type: MatchBundleType,
    pub strictness: MatchStrictness,
    pub lookahead_limit: u32,
    pub print_config: PrintConfig,
    pub worker_count: usize,
}

/// Runs the full phased comparison and writes one report file per bundle.
pub fn process_asm_comparison(options: &AsmComparisonOptions) -> DiffResult<()> {
    for executable in &options.executables {
        if executable.get_code_section().is_none() {
            return Err(DiffError::NoCodeSection(executable.get_filename().to_string()));
        }
    }

    let mut pipeline = ComparisonPipeline::new();
    for side in 0..2 {
        pipeline.set_executable(side, Arc::clone(&options.executables[side]));
        if let Some(db) = &options.debug_dbs[side] {
            pipeline.set_debug_db(side, Arc::clone(db));
        }
    }

    let mut queue = WorkQueue::new(options.worker_count);

    pipeline.build_matched_functions();
    pipeline.build_bundles(options.bundle_type);
    pipeline.disassemble_functions(&mut queue, options.format);
    if options.print_config.sourcecode_len + options.print_config.sourceline_len > 0 {
        pipeline.link_source_files();
        if options.bundle_type != MatchBundleType::SourceFile {
            // Source-file bundles load and flush per bundle instead, so at
            // most one bundle's files stay resident.
            pipeline.load_source_files();
        }
    }
    let all_matched = pipeline.all_matched_indices();
    pipeline.compare_functions(&mut queue, &all_matched, options.lookahead_limit);
    pipeline.update_bundle_counters(options.bundle_type);

    output_comparison_results(&mut pipeline, options)
}

fn output_comparison_results(
    pipeline: &mut ComparisonPipeline,
    options: &AsmComparisonOptions,
) -> DiffResult<()> {
    let exe_filenames = [
        options.executables[0].get_filename().to_string(),
        options.executables[1].get_filename().to_string(),
    ];

    let bundles: Vec<(String, Vec<IndexT>)> = pipeline
        .bundle_family(options.bundle_type)
        .map(|family| {
            family
                .bundles
                .iter()
                .map(|b| (b.name.clone(), b.matched_indices.clone()))
                .collect()
        })
        .unwrap_or_default();

    for (bundle_idx, (bundle_name, matched_indices)) in bundles.iter().enumerate() {
        // Pull this bundle's source files into the cache first.
        let mut source_names = Vec::new();
        for &matched_idx in matched_indices {
            for body in pipeline.matched_function_bodies(matched_idx) {
                let name = body.get_source_file_name();
                if !name.is_empty() {
                    source_names.push(name.to_string());
                }
            }
        }
        for name in source_names {
            pipeline.load_source_file(&name);
        }

        let mut text = String::with_capacity(1024 * 1024);
        for &matched_idx in matched_indices {
            let matched = pipeline.matched_function(matched_idx);
            let display_name = &pipeline
                .named_function(0, matched.named_indices[0])
                .demangled_name;
            let bodies = pipeline.matched_function_bodies(matched_idx);
            let source_contents = [
                pipeline.source_content(bodies[0].get_source_file_name()),
                pipeline.source_content(bodies[1].get_source_file_name()),
            ];
            append_comparison_report(
                &mut text,
                display_name,
                &matched.comparison,
                bodies,
                &exe_filenames,
                source_contents,
                options.strictness,
                &options.print_config,
            );
        }

        let output_path = build_cmp_output_path(bundle_idx, bundle_name, &options.output_file);
        fs::write(&output_path, text)
            .map_err(|_| DiffError::OutputFile(output_path.display().to_string()))?;

        if options.bundle_type == MatchBundleType::SourceFile {
            // Source-file bundles touch at most their own files; dropping
            // the cache keeps the resident set tiny.
            pipeline.flush_source_cache();
        }
    }
    Ok(())
}

/// Report file name for one bundle:
/// `<stem>.<basename(bundle)>.<index><ext>` next to `output_file`.
pub fn build_cmp_output_path(bundle_idx: usize, bundle_name: &str, output_file: &str) -> PathBuf {
    let output_path = Path::new(output_file);
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out");
    let ext = output_path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let filename = format!("{}.{}.{}{}", stem, file_basename(bundle_name), bundle_idx, ext);
    match output_path.parent() {
        Some(parent) => parent.join(filename),
        None => PathBuf::from(filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_includes_stem_bundle_and_index() {
        let path = build_cmp_output_path(2, "src/code.cpp", "reports/diff.txt");
        assert_eq!(path, PathBuf::from("reports/diff.code.cpp.2.txt"));
    }

    #[test]
    fn output_path_without_extension() {
        let path = build_cmp_output_path(0, "all", "diff");
        assert_eq!(path, PathBuf::from("diff.all.0"));
    }
}
