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

use thiserror::Error;

/// Errors surfaced by the high level operations. Missing symbols, missing
/// source files and undecodable instructions are not errors; they degrade
/// into `Missing`/`Invalid` comparison records instead.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse executable: {0}")]
    Executable(#[from] object::Error),

    #[error("failed to read debug info: {0}")]
    DebugInfo(#[from] gimli::Error),

    #[error("disassembler error: {0}")]
    Disassembler(#[from] capstone::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("input file is empty: {0}")]
    EmptyInput(String),

    #[error("executable has no code section: {0}")]
    NoCodeSection(String),

    #[error("invalid address range: start 0x{start:x} must be below end 0x{end:x}")]
    InvalidAddressRange { start: u64, end: u64 },

    #[error("output format '{0}' is not supported for this operation")]
    UnsupportedFormat(String),

    #[error("cannot open output file: {0}")]
    OutputFile(String),
}

pub type DiffResult<T> = Result<T, DiffError>;
