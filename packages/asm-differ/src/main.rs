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

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;

use asm_differ::compare_types::{to_asm_format, to_match_bundle_type, to_match_strictness};
use asm_differ::printer::PrintConfig;
use asm_differ::runner;
use asm_differ::utils::parse_hex_or_dec;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input executable(s): one for a raw listing, two for a comparison
    #[arg(required = true, num_args = 1..=2)]
    input_files: Vec<String>,

    /// Debug info file per input; defaults to the executable itself
    #[arg(long = "debug-file", num_args = 0..=2)]
    debug_files: Vec<String>,

    /// JSON symbol config per input
    #[arg(long = "config-file", num_args = 0..=2)]
    config_files: Vec<String>,

    /// Output file; bundle reports derive their names from it
    #[arg(short = 'o', long = "output", default_value = "diff.txt")]
    output_file: String,

    /// Assembly flavor: igas, agas, masm, default
    #[arg(long = "format", default_value = "default")]
    format: String,

    /// Function grouping: compiland, sourcefile, none
    #[arg(long = "bundle-type", default_value = "none")]
    bundle_type: String,

    /// How undecided positions count: lenient, undecided, strict
    #[arg(long = "strictness", default_value = "undecided")]
    strictness: String,

    /// Max instructions the aligner may skip per side to resynchronize
    #[arg(long = "lookahead-limit", default_value_t = 20)]
    lookahead_limit: u32,

    /// Start address for the raw listing mode (hex or decimal)
    #[arg(long = "start-addr")]
    start_addr: Option<String>,

    /// End address for the raw listing mode (hex or decimal)
    #[arg(long = "end-addr")]
    end_addr: Option<String>,

    #[arg(long = "print-indent-len", default_value_t = 4)]
    print_indent_len: u32,

    #[arg(long = "print-asm-len", default_value_t = 80)]
    print_asm_len: u32,

    #[arg(long = "print-byte-count", default_value_t = 11)]
    print_byte_count: u32,

    /// Width of the interleaved source code column; 0 disables it
    #[arg(long = "print-sourcecode-len", default_value_t = 80)]
    print_sourcecode_len: u32,

    #[arg(long = "print-sourceline-len", default_value_t = 5)]
    print_sourceline_len: u32,

    /// Worker threads for disassembly and comparison
    #[arg(long = "jobs", default_value_t = 4)]
    jobs: usize,

    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

fn optional_arg(values: &[String], idx: usize) -> Option<String> {
    values.get(idx).filter(|s| !s.is_empty()).cloned()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let now = Instant::now();

    let print_config = PrintConfig {
        indent_len: args.print_indent_len,
        asm_len: args.print_asm_len,
        byte_count: args.print_byte_count,
        sourcecode_len: args.print_sourcecode_len,
        sourceline_len: args.print_sourceline_len,
    };
    let format = to_asm_format(&args.format);

    if args.input_files.len() == 1 {
        let (Some(start_str), Some(end_str)) = (&args.start_addr, &args.end_addr) else {
            bail!("raw listing mode needs --start-addr and --end-addr");
        };
        let Some(start_addr) = parse_hex_or_dec(start_str) else {
            bail!("cannot parse start address '{}'", start_str);
        };
        let Some(end_addr) = parse_hex_or_dec(end_str) else {
            bail!("cannot parse end address '{}'", end_str);
        };

        let executable = runner::load_executable(&runner::LoadExecutableOptions {
            input_file: args.input_files[0].clone(),
            config_file: optional_arg(&args.config_files, 0),
            verbose: args.verbose,
        })?;

        runner::process_asm_output(&runner::AsmOutputOptions {
            executable: &executable,
            output_file: args.output_file.clone(),
            start_addr,
            end_addr,
            format,
            print_indent_len: args.print_indent_len,
        })?;
        eprintln!("Wrote '{}' (elapsed: {:.2?})", args.output_file, now.elapsed());
        return Ok(());
    }

    let mut executables = Vec::with_capacity(2);
    let mut debug_dbs = Vec::with_capacity(2);
    for side in 0..2 {
        let executable = runner::load_executable(&runner::LoadExecutableOptions {
            input_file: args.input_files[side].clone(),
            config_file: optional_arg(&args.config_files, side),
            verbose: args.verbose,
        })?;
        executables.push(Arc::new(executable));

        // Debug info lives in the executable unless a separate file is given.
        let debug_file =
            optional_arg(&args.debug_files, side).unwrap_or_else(|| args.input_files[side].clone());
        match runner::load_debug_database(&debug_file, args.verbose) {
            Ok(db) => debug_dbs.push(Some(Arc::new(db))),
            Err(err) => {
                eprintln!("No usable debug info in '{}': {}", debug_file, err);
                debug_dbs.push(None);
            }
        }
    }
    if args.verbose {
        eprintln!("Loaded both executables (elapsed: {:.2?})", now.elapsed());
    }

    let options = runner::AsmComparisonOptions {
        executables: [executables.remove(0), executables.remove(0)],
        debug_dbs: [debug_dbs.remove(0), debug_dbs.remove(0)],
        output_file: args.output_file.clone(),
        format,
        bundle_type: to_match_bundle_type(&args.bundle_type),
        strictness: to_match_strictness(&args.strictness),
        lookahead_limit: args.lookahead_limit,
        print_config,
        worker_count: args.jobs,
    };
    runner::process_asm_comparison(&options)?;

    eprintln!("Comparison done (elapsed: {:.2?})", now.elapsed());
    Ok(())
}
