//! xlate-bench - transpilation validation pipeline
//!
//! For every candidate C program:
//! - Builds it under every subset of its optional compile flags and runs its tests
//! - Transpiles it to Rust and rebuilds the transpiled project
//! - Links the original tests against the Rust artifact and runs them
//! - Records the earliest stage at which anything failed
//!
//! Stage failures are recorded per program; they never stop the run.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod executor;
pub mod flags;
pub mod metadata;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod stage;
pub mod telemetry;

// Re-export key types
pub use aggregate::{summarize, ResultSet, Summary};
pub use config::{PipelineConfig, StageCommands, StageTimeouts, TranspilePolicy};
pub use error::{BenchError, Result};
pub use executor::{CommandExecutor, ShellExecutor};
pub use flags::{combinations, FlagCombination};
pub use model::{
    CompileOutcome, Outcome, ProgramResult, ProgramSpec, StageFailure, StageKind, StageResult,
    Status, TestOutcome,
};
pub use pipeline::Pipeline;
pub use report::{write_results, ResultsReport};
pub use stage::{Side, StageRunner};
pub use telemetry::init_tracing;
