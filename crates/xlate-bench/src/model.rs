//! Program specifications, stage identities and per-program results.

use crate::flags::FlagCombination;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// A candidate program under test, as supplied by metadata discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgramSpec {
    /// Unique program name.
    pub name: String,

    /// Directory the program is built in.
    pub path: PathBuf,

    /// Test sources, linked and executed in this order.
    #[serde(default, alias = "tests")]
    pub test_files: Vec<PathBuf>,

    /// Optional compile flags; every subset is built and tested.
    #[serde(default, alias = "compile_flags")]
    pub optional_flags: Vec<String>,
}

impl ProgramSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            test_files: Vec::new(),
            optional_flags: Vec::new(),
        }
    }

    pub fn with_tests<I, P>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.test_files = tests.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Working directory for this program, resolved against `root` when relative.
    pub fn working_dir(&self, root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            root.join(&self.path)
        }
    }
}

/// Pipeline stages, declared in pipeline order.
///
/// The derived ordering is the failure precedence used for reporting: the
/// smallest failing stage of a program is its `failed_stage`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Compile the original C sources (records a compilation database).
    Build,

    /// Translate the compilation database into a Rust project.
    Transpile,

    /// Build the transpiled Rust project.
    RustBuild,

    /// Link a test source against the current artifact.
    Link,

    /// Run a linked test executable.
    Execute,
}

impl StageKind {
    /// All stages in pipeline order.
    pub const ALL: [StageKind; 5] = [
        StageKind::Build,
        StageKind::Transpile,
        StageKind::RustBuild,
        StageKind::Link,
        StageKind::Execute,
    ];

    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Build => "build",
            StageKind::Transpile => "transpile",
            StageKind::RustBuild => "rust_build",
            StageKind::Link => "link",
            StageKind::Execute => "execute",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
}

/// Terminal result of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr, or the infrastructure diagnostic when the command
    /// could not run to completion.
    pub stderr: String,

    /// Exit code; `None` when the process never started, timed out or was
    /// terminated by a signal.
    pub exit_code: Option<i32>,

    /// Whether the command was killed after exceeding its timeout.
    pub timed_out: bool,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl Outcome {
    pub fn passed(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status: Status::Passed,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(0),
            timed_out: false,
            duration_ms: 0,
        }
    }

    pub fn failed(exit_code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            timed_out: false,
            duration_ms: 0,
        }
    }

    /// A command that could not be started at all.
    pub fn spawn_failure(error: impl fmt::Display) -> Self {
        Self::failed(None, "", format!("failed to start command: {error}"))
    }

    /// A command killed after exceeding its timeout.
    pub fn timeout(limit: Duration, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        let mut stderr = stderr.into();
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("command timed out after {limit:?}"));
        Self {
            timed_out: true,
            ..Self::failed(None, stdout, stderr)
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_passed(&self) -> bool {
        self.status == Status::Passed
    }
}

/// Outcome of one stage attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: StageKind,
    pub outcome: Outcome,
}

impl StageResult {
    pub fn new(stage: StageKind, outcome: Outcome) -> Self {
        Self { stage, outcome }
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_passed()
    }

    /// The typed failure, if this stage failed.
    pub fn failure(&self) -> Option<StageFailure> {
        (!self.passed()).then(|| StageFailure::new(self.stage, &self.outcome))
    }
}

/// Result of linking and running one test file.
///
/// `stage` is `Link` when linking failed, otherwise `Execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub test_file: PathBuf,
    pub stage: StageKind,
    pub outcome: Outcome,
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        self.outcome.is_passed()
    }

    pub fn failure(&self) -> Option<StageFailure> {
        (!self.passed()).then(|| StageFailure::new(self.stage, &self.outcome))
    }
}

/// One flag combination's pass through build, link and execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    pub flag_combination: FlagCombination,

    /// The build (C side) or rust build (Rust side) stage.
    pub stage_result: StageResult,

    /// Empty unless `stage_result` passed.
    pub test_outcomes: Vec<TestOutcome>,
}

impl CompileOutcome {
    /// Whether the build passed and every recorded test passed.
    pub fn passed(&self) -> bool {
        self.stage_result.passed() && self.test_outcomes.iter().all(TestOutcome::passed)
    }

    /// Failures in this combination, build first, then tests in order.
    pub fn failures(&self) -> Vec<StageFailure> {
        self.stage_result
            .failure()
            .into_iter()
            .chain(self.test_outcomes.iter().filter_map(TestOutcome::failure))
            .collect()
    }
}

/// Everything recorded for one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramResult {
    pub name: String,
    pub overall_outcome: Status,

    /// Earliest stage, in pipeline order, at which anything failed.
    pub failed_stage: Option<StageKind>,

    /// C-side results, one per flag combination.
    pub per_flag_results: Vec<CompileOutcome>,

    /// `None` only if transpilation was never attempted.
    pub transpile_result: Option<StageResult>,

    /// Rust-side results; empty when transpilation failed.
    pub rust_results: Vec<CompileOutcome>,
}

impl ProgramResult {
    /// Freeze a program's recorded stages, deriving its overall status and
    /// failed stage.
    pub fn new(
        name: impl Into<String>,
        per_flag_results: Vec<CompileOutcome>,
        transpile_result: Option<StageResult>,
        rust_results: Vec<CompileOutcome>,
    ) -> Self {
        let mut result = Self {
            name: name.into(),
            overall_outcome: Status::Failed,
            failed_stage: None,
            per_flag_results,
            transpile_result,
            rust_results,
        };

        let transpiled = result
            .transpile_result
            .as_ref()
            .is_some_and(StageResult::passed);
        let all_passed = transpiled
            && result.per_flag_results.iter().all(CompileOutcome::passed)
            && result.rust_results.iter().all(CompileOutcome::passed);

        result.failed_stage = result.failures().iter().map(StageFailure::stage).min();
        if all_passed {
            result.overall_outcome = Status::Passed;
        } else if result.failed_stage.is_none() {
            // Transpile was never attempted; nothing else failed.
            result.failed_stage = Some(StageKind::Transpile);
        }
        result
    }

    pub fn passed(&self) -> bool {
        self.overall_outcome == Status::Passed
    }

    /// Every failure recorded for this program: C side, transpile, Rust side.
    pub fn failures(&self) -> Vec<StageFailure> {
        let c_side = self.per_flag_results.iter().flat_map(CompileOutcome::failures);
        let transpile = self.transpile_result.iter().filter_map(StageResult::failure);
        let rust_side = self.rust_results.iter().flat_map(CompileOutcome::failures);
        c_side.chain(transpile).chain(rust_side).collect()
    }
}

/// A failed stage with its captured diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    #[error("build failed: {stderr}")]
    Build { stdout: String, stderr: String },

    #[error("transpile failed: {stderr}")]
    Transpile { stdout: String, stderr: String },

    #[error("rust build failed: {stderr}")]
    RustBuild { stdout: String, stderr: String },

    #[error("link failed: {stderr}")]
    Link { stdout: String, stderr: String },

    #[error("execution failed: {stderr}")]
    Execute { stdout: String, stderr: String },
}

impl StageFailure {
    pub fn new(stage: StageKind, outcome: &Outcome) -> Self {
        let stdout = outcome.stdout.clone();
        let stderr = outcome.stderr.clone();
        match stage {
            StageKind::Build => StageFailure::Build { stdout, stderr },
            StageKind::Transpile => StageFailure::Transpile { stdout, stderr },
            StageKind::RustBuild => StageFailure::RustBuild { stdout, stderr },
            StageKind::Link => StageFailure::Link { stdout, stderr },
            StageKind::Execute => StageFailure::Execute { stdout, stderr },
        }
    }

    pub fn stage(&self) -> StageKind {
        match self {
            StageFailure::Build { .. } => StageKind::Build,
            StageFailure::Transpile { .. } => StageKind::Transpile,
            StageFailure::RustBuild { .. } => StageKind::RustBuild,
            StageFailure::Link { .. } => StageKind::Link,
            StageFailure::Execute { .. } => StageKind::Execute,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            StageFailure::Build { stderr, .. }
            | StageFailure::Transpile { stderr, .. }
            | StageFailure::RustBuild { stderr, .. }
            | StageFailure::Link { stderr, .. }
            | StageFailure::Execute { stderr, .. } => stderr,
        }
    }
}
