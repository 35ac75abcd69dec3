//! Serialized form of a [`ResultSet`] (`test_results.json`).

use crate::aggregate::{ResultSet, Summary};
use crate::error::{BenchError, Result};
use crate::model::{CompileOutcome, Outcome, ProgramResult, StageKind, StageResult, Status, TestOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

// ── test_results.json schema ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub metadata_digest: String,
    pub summary: SummaryReport,
    pub programs: Vec<ProgramReport>,
}

/// Summary counters; failures appear as `failed_at_<stage>` keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    #[serde(flatten)]
    pub failed_at: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramReport {
    pub name: String,
    pub status: Status,
    pub failed_stage: Option<StageKind>,
    pub per_flag_results: Vec<CombinationReport>,
    pub transpile: Option<OutcomeReport>,
    pub rust_results: Vec<CombinationReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombinationReport {
    /// Flags joined the way they were passed to the build.
    pub flags: String,
    pub status: Status,
    /// Build diagnostics when the build failed.
    pub error: Option<String>,
    pub build: OutcomeReport,
    pub tests: Vec<TestReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestReport {
    pub file: PathBuf,
    /// `link` or `execute`, whichever produced the outcome.
    pub stage: StageKind,
    #[serde(flatten)]
    pub outcome: OutcomeReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeReport {
    pub status: Status,
    /// Captured stderr for failed commands.
    pub error: Option<String>,
    pub stdout: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl From<&Outcome> for OutcomeReport {
    fn from(outcome: &Outcome) -> Self {
        Self {
            status: outcome.status,
            error: (!outcome.is_passed()).then(|| outcome.stderr.clone()),
            stdout: outcome.stdout.clone(),
            exit_code: outcome.exit_code,
            timed_out: outcome.timed_out,
            duration_ms: outcome.duration_ms,
        }
    }
}

impl From<&TestOutcome> for TestReport {
    fn from(test: &TestOutcome) -> Self {
        Self {
            file: test.test_file.clone(),
            stage: test.stage,
            outcome: OutcomeReport::from(&test.outcome),
        }
    }
}

impl From<&CompileOutcome> for CombinationReport {
    fn from(combination: &CompileOutcome) -> Self {
        let build = OutcomeReport::from(&combination.stage_result.outcome);
        Self {
            flags: combination.flag_combination.join(),
            status: if combination.passed() {
                Status::Passed
            } else {
                Status::Failed
            },
            error: build.error.clone(),
            build,
            tests: combination.test_outcomes.iter().map(TestReport::from).collect(),
        }
    }
}

impl From<&ProgramResult> for ProgramReport {
    fn from(program: &ProgramResult) -> Self {
        Self {
            name: program.name.clone(),
            status: program.overall_outcome,
            failed_stage: program.failed_stage,
            per_flag_results: program.per_flag_results.iter().map(CombinationReport::from).collect(),
            transpile: program
                .transpile_result
                .as_ref()
                .map(|StageResult { outcome, .. }| OutcomeReport::from(outcome)),
            rust_results: program.rust_results.iter().map(CombinationReport::from).collect(),
        }
    }
}

impl From<&Summary> for SummaryReport {
    fn from(summary: &Summary) -> Self {
        Self {
            total: summary.total,
            passed: summary.passed,
            failed: summary.failed,
            failed_at: summary
                .failed_at
                .iter()
                .map(|(stage, count)| (format!("failed_at_{}", stage.name()), *count))
                .collect(),
        }
    }
}

impl From<&ResultSet> for ResultsReport {
    fn from(set: &ResultSet) -> Self {
        Self {
            run_id: set.run_id,
            started_at: set.started_at,
            finished_at: set.finished_at,
            duration_ms: set.duration_ms(),
            metadata_digest: set.metadata_digest.clone(),
            summary: SummaryReport::from(&set.summary),
            programs: set.programs.iter().map(ProgramReport::from).collect(),
        }
    }
}

/// Write the result set as pretty-printed JSON, creating parent directories.
pub fn write_results(path: &Path, set: &ResultSet) -> Result<()> {
    let report = ResultsReport::from(set);
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| BenchError::WriteResults {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, json).map_err(|source| BenchError::WriteResults {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), programs = report.programs.len(), "wrote results");
    Ok(())
}
