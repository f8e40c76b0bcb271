// Crate root: declare modules and control visibility
pub mod bundles;
pub mod compare_types;
pub mod debug_db;
pub mod disasm;
pub mod error;
pub mod executable;
pub mod file_content;
pub mod function;
pub mod instr;
pub mod matcher;
pub mod pipeline;
pub mod printer;
pub mod runner;
pub mod symbols;
pub mod utils;
pub mod work_queue;

// Re-export commonly used API from the library for binaries/tests
pub use compare_types::{
    to_asm_format, to_match_bundle_type, to_match_strictness, AsmFormat, ComparisonResult,
    MatchBundleType, MatchStrictness,
};
pub use error::{DiffError, DiffResult};
pub use matcher::{compare_instructions, run_comparison};
