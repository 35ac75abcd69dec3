//! Pipeline orchestration across programs, flag combinations and test files.

use crate::aggregate::ResultSet;
use crate::config::PipelineConfig;
use crate::error::{BenchError, Result};
use crate::executor::CommandExecutor;
use crate::flags::{self, FlagCombination};
use crate::metadata;
use crate::model::{CompileOutcome, ProgramResult, ProgramSpec, StageKind, StageResult, TestOutcome};
use crate::stage::{Side, StageRunner};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Drives every program through build, transpile, rust build, link and
/// execute.
///
/// A failing stage ends only its own path: a failed build skips that flag
/// combination's tests, a failed link skips the remaining test files of that
/// combination, and a failed transpile skips the Rust side. Sibling
/// combinations and other programs always run.
#[derive(Clone)]
pub struct Pipeline {
    runner: StageRunner,
    config: Arc<PipelineConfig>,
}

impl Pipeline {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: PipelineConfig) -> Self {
        let runner = StageRunner::new(executor, config.timeouts.clone());
        Self {
            runner,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every program and freeze the results into a [`ResultSet`].
    pub async fn run(&self, programs: &[ProgramSpec]) -> Result<ResultSet> {
        let started_at = Utc::now();
        let digest = metadata::digest(programs)?;
        let results = self.run_all(programs).await?;
        Ok(ResultSet::new(results, digest, started_at, Utc::now()))
    }

    /// Process all programs, returning results in input order.
    ///
    /// With `jobs > 1` programs run concurrently, except that programs sharing
    /// a working directory are processed one after another by the same worker.
    pub async fn run_all(&self, programs: &[ProgramSpec]) -> Result<Vec<ProgramResult>> {
        metadata::validate(programs, self.config.max_optional_flags)?;

        info!(programs = programs.len(), jobs = self.config.jobs, "starting pipeline");

        if self.config.jobs <= 1 {
            let mut results = Vec::with_capacity(programs.len());
            for program in programs {
                results.push(self.run_program(program).await);
            }
            return Ok(results);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.jobs));
        let mut join_set = JoinSet::new();

        for group in self.group_by_working_dir(programs) {
            let pipeline = self.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let mut done = Vec::with_capacity(group.len());
                for (idx, program) in group {
                    let result = pipeline.run_program(&program).await;
                    done.push((idx, result));
                }
                done
            });
        }

        let mut slots: Vec<Option<ProgramResult>> = vec![None; programs.len()];
        while let Some(joined) = join_set.join_next().await {
            let done = joined.map_err(|e| BenchError::Worker(e.to_string()))?;
            for (idx, result) in done {
                slots[idx] = Some(result);
            }
        }

        slots
            .into_iter()
            .zip(programs)
            .map(|(slot, program)| {
                slot.ok_or_else(|| BenchError::Worker(format!("missing result for program '{}'", program.name)))
            })
            .collect()
    }

    fn group_by_working_dir(&self, programs: &[ProgramSpec]) -> Vec<Vec<(usize, ProgramSpec)>> {
        let mut groups: Vec<Vec<(usize, ProgramSpec)>> = Vec::new();
        let mut by_dir: HashMap<PathBuf, usize> = HashMap::new();
        for (idx, program) in programs.iter().enumerate() {
            let dir = program.working_dir(&self.config.root);
            let slot = *by_dir.entry(dir).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push((idx, program.clone()));
        }
        groups
    }

    /// Run the full stage sequence for one program.
    #[instrument(skip_all, fields(program = %program.name))]
    pub async fn run_program(&self, program: &ProgramSpec) -> ProgramResult {
        let dir = program.working_dir(&self.config.root);
        let combinations = flags::combinations(&program.optional_flags);

        info!(
            dir = %dir.display(),
            combinations = combinations.len(),
            tests = program.test_files.len(),
            "processing program"
        );

        let per_flag_results = self.run_matrix(Side::C, program, &dir, &combinations).await;

        let transpile = self.transpile(program, &dir).await;
        let rust_results = if transpile.passed() {
            self.run_matrix(Side::Rust, program, &dir, &combinations).await
        } else {
            warn!(stderr = %transpile.outcome.stderr.trim(), "transpile failed, skipping rust build");
            Vec::new()
        };

        let result = ProgramResult::new(program.name.clone(), per_flag_results, Some(transpile), rust_results);

        match result.failed_stage {
            None => info!("program passed"),
            Some(stage) => info!(failed_stage = %stage, "program failed"),
        }
        result
    }

    async fn run_matrix(
        &self,
        side: Side,
        program: &ProgramSpec,
        dir: &Path,
        combinations: &[FlagCombination],
    ) -> Vec<CompileOutcome> {
        let mut results = Vec::with_capacity(combinations.len());
        for flags in combinations {
            results.push(self.run_combination(side, program, dir, flags).await);
        }
        results
    }

    /// Clean, build, then link and execute each test file in order.
    #[instrument(skip_all, fields(side = side.name(), flags = %flags))]
    async fn run_combination(
        &self,
        side: Side,
        program: &ProgramSpec,
        dir: &Path,
        flags: &FlagCombination,
    ) -> CompileOutcome {
        let commands = &self.config.commands;

        self.runner.clean(&commands.clean_command(side, flags), dir).await;

        let stage_result = self
            .runner
            .run_stage(side.build_stage(), &commands.build_command(side, flags), dir)
            .await;

        let mut test_outcomes = Vec::new();
        if stage_result.passed() {
            for test_file in &program.test_files {
                let link = self
                    .runner
                    .run_stage(StageKind::Link, &commands.link_command(side, flags, test_file), dir)
                    .await;
                if !link.passed() {
                    // A link failure means the artifact itself is unusable.
                    test_outcomes.push(TestOutcome {
                        test_file: test_file.clone(),
                        stage: StageKind::Link,
                        outcome: link.outcome,
                    });
                    break;
                }

                let execute = self
                    .runner
                    .run_stage(StageKind::Execute, &commands.execute_command(side, flags, test_file), dir)
                    .await;
                test_outcomes.push(TestOutcome {
                    test_file: test_file.clone(),
                    stage: StageKind::Execute,
                    outcome: execute.outcome,
                });
            }
        }

        CompileOutcome {
            flag_combination: flags.clone(),
            stage_result,
            test_outcomes,
        }
    }

    /// Rebuild with the transpile policy's flags to refresh the compilation
    /// database, then transpile it.
    async fn transpile(&self, program: &ProgramSpec, dir: &Path) -> StageResult {
        let commands = &self.config.commands;
        let flags = self.config.transpile_flags.flags_for(program);

        self.runner.clean(&commands.clean_command(Side::C, &flags), dir).await;
        let build = self
            .runner
            .run_stage(StageKind::Build, &commands.build_command(Side::C, &flags), dir)
            .await;
        if !build.passed() {
            let mut outcome = build.outcome;
            outcome.stderr = format!("build with {flags} failed before transpiling:\n{}", outcome.stderr);
            return StageResult::new(StageKind::Transpile, outcome);
        }

        self.runner
            .run_stage(StageKind::Transpile, &commands.transpile_command(&flags), dir)
            .await
    }
}
