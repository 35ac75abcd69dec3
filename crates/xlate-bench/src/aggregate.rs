//! Roll-up of program results into summary counters.

use crate::model::{ProgramResult, StageKind};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Counters over a complete set of program results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,

    /// Programs per earliest failing stage; every stage is present.
    pub failed_at: BTreeMap<StageKind, usize>,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failed_at(&self, stage: StageKind) -> usize {
        self.failed_at.get(&stage).copied().unwrap_or(0)
    }
}

/// Summarize results in a single pass.
pub fn summarize(results: &[ProgramResult]) -> Summary {
    let mut failed_at: BTreeMap<StageKind, usize> = StageKind::ALL.iter().map(|s| (*s, 0)).collect();
    let mut passed = 0;

    for result in results {
        if result.passed() {
            passed += 1;
        }
        if let Some(stage) = result.failed_stage {
            *failed_at.entry(stage).or_insert(0) += 1;
        }
    }

    Summary {
        total: results.len(),
        passed,
        failed: results.len() - passed,
        failed_at,
    }
}

/// The frozen output of one pipeline run.
#[derive(Debug, Clone)]
pub struct ResultSet {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Digest of the program list the run was fed.
    pub metadata_digest: String,

    pub summary: Summary,
    pub programs: Vec<ProgramResult>,
}

impl ResultSet {
    pub fn new(
        programs: Vec<ProgramResult>,
        metadata_digest: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let summary = summarize(&programs);
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at,
            metadata_digest,
            summary,
            programs,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Outcome, StageResult};

    fn program(name: &str, transpile: Outcome) -> ProgramResult {
        ProgramResult::new(
            name,
            vec![],
            Some(StageResult::new(StageKind::Transpile, transpile)),
            vec![],
        )
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.passed, 0);
        assert!(summary.all_passed());
        assert_eq!(summary.failed_at.len(), StageKind::ALL.len());
        assert!(summary.failed_at.values().all(|c| *c == 0));
    }

    #[test]
    fn test_summarize_counts_failed_stage() {
        let results = vec![
            program("ok", Outcome::passed("", "")),
            program("bad1", Outcome::failed(Some(1), "", "unsupported")),
            program("bad2", Outcome::failed(Some(1), "", "unsupported")),
        ];

        let summary = summarize(&results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failed_at(StageKind::Transpile), 2);
        assert_eq!(summary.failed_at(StageKind::Build), 0);
        assert!(!summary.all_passed());
    }

    #[test]
    fn test_result_set_summary_matches_programs() {
        let now = Utc::now();
        let set = ResultSet::new(
            vec![program("ok", Outcome::passed("", ""))],
            "digest".to_string(),
            now,
            now,
        );
        assert_eq!(set.summary, summarize(&set.programs));
        assert_eq!(set.duration_ms(), 0);
    }
}
