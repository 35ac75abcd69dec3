//! Stage execution and command rendering.

use crate::config::{StageCommands, StageTimeouts};
use crate::executor::CommandExecutor;
use crate::flags::FlagCombination;
use crate::model::{Outcome, StageKind, StageResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which artifact a build/link/execute pass targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The original C build.
    C,
    /// The transpiled Rust build.
    Rust,
}

impl Side {
    /// The stage that produces this side's artifact.
    pub fn build_stage(&self) -> StageKind {
        match self {
            Side::C => StageKind::Build,
            Side::Rust => StageKind::RustBuild,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Side::C => "c",
            Side::Rust => "rust",
        }
    }
}

/// Substitute the `{flags}`, `{test_file}`, `{test_stem}` and `{exe}`
/// placeholders of a command template.
fn render(template: &str, flags: &FlagCombination, test_file: Option<&Path>, exe: Option<&str>) -> String {
    let mut command = template.replace("{flags}", &flags.join());
    if let Some(test_file) = test_file {
        command = command
            .replace("{test_file}", &test_file.to_string_lossy())
            .replace("{test_stem}", &test_stem(test_file));
    }
    if let Some(exe) = exe {
        command = command.replace("{exe}", exe);
    }
    command.trim_end().to_string()
}

fn test_stem(test_file: &Path) -> String {
    test_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl StageCommands {
    /// Name of the executable a test file is linked into.
    pub fn exe_name(&self, side: Side, test_file: &Path) -> String {
        match side {
            Side::C => test_stem(test_file),
            Side::Rust => format!("{}{}", self.rust_exe_prefix, test_stem(test_file)),
        }
    }

    pub fn clean_command(&self, side: Side, flags: &FlagCombination) -> String {
        let template = match side {
            Side::C => &self.clean,
            Side::Rust => &self.rust_clean,
        };
        render(template, flags, None, None)
    }

    pub fn build_command(&self, side: Side, flags: &FlagCombination) -> String {
        let template = match side {
            Side::C => &self.build,
            Side::Rust => &self.rust_build,
        };
        render(template, flags, None, None)
    }

    pub fn transpile_command(&self, flags: &FlagCombination) -> String {
        render(&self.transpile, flags, None, None)
    }

    pub fn link_command(&self, side: Side, flags: &FlagCombination, test_file: &Path) -> String {
        let template = match side {
            Side::C => &self.link,
            Side::Rust => &self.rust_link,
        };
        let exe = self.exe_name(side, test_file);
        render(template, flags, Some(test_file), Some(&exe))
    }

    pub fn execute_command(&self, side: Side, flags: &FlagCombination, test_file: &Path) -> String {
        let exe = self.exe_name(side, test_file);
        render(&self.execute, flags, Some(test_file), Some(&exe))
    }
}

/// Runs single pipeline stages through a [`CommandExecutor`].
#[derive(Clone)]
pub struct StageRunner {
    executor: Arc<dyn CommandExecutor>,
    timeouts: StageTimeouts,
}

impl StageRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, timeouts: StageTimeouts) -> Self {
        Self { executor, timeouts }
    }

    /// Execute one stage and tag its outcome with the stage identity.
    pub async fn run_stage(&self, stage: StageKind, command: &str, working_dir: &Path) -> StageResult {
        debug!(%stage, command, "running stage");

        let outcome = self
            .executor
            .execute(command, working_dir, self.timeouts.for_stage(stage))
            .await;

        if outcome.is_passed() {
            debug!(%stage, duration_ms = outcome.duration_ms, "stage passed");
        } else {
            info!(
                %stage,
                exit_code = ?outcome.exit_code,
                timed_out = outcome.timed_out,
                duration_ms = outcome.duration_ms,
                "stage failed"
            );
        }

        StageResult::new(stage, outcome)
    }

    /// Remove stale build state. Failures are logged, not recorded: a clean
    /// target that has nothing to remove commonly exits non-zero.
    pub async fn clean(&self, command: &str, working_dir: &Path) -> Outcome {
        let outcome = self
            .executor
            .execute(command, working_dir, self.timeouts.for_clean())
            .await;
        if !outcome.is_passed() {
            warn!(command, stderr = %outcome.stderr.trim(), "clean step failed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ShellExecutor;
    use std::path::PathBuf;

    fn flags(names: &[&str]) -> FlagCombination {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        FlagCombination::all(&names)
    }

    #[test]
    fn test_default_commands() {
        let commands = StageCommands::default();
        let test = PathBuf::from("tests/test_list.c");

        assert_eq!(commands.build_command(Side::C, &flags(&["-DA", "-DB"])), "bear -- make -DA -DB");
        assert_eq!(commands.build_command(Side::C, &FlagCombination::empty()), "bear -- make");
        assert_eq!(commands.link_command(Side::C, &FlagCombination::empty(), &test), "make test_list");
        assert_eq!(commands.execute_command(Side::C, &FlagCombination::empty(), &test), "./test_list");
        assert_eq!(
            commands.link_command(Side::Rust, &FlagCombination::empty(), &test),
            "gcc -o c2rust_test_list tests/test_list.c -Isrc -Ltarget/release -lc2rust_out -ldl -lpthread -lm"
        );
        assert_eq!(
            commands.execute_command(Side::Rust, &FlagCombination::empty(), &test),
            "./c2rust_test_list"
        );
        assert_eq!(commands.build_command(Side::Rust, &flags(&["-DA"])), "cargo build --release");
    }

    #[test]
    fn test_custom_placeholders() {
        let commands = StageCommands {
            link: "cc {flags} -o {exe} {test_file} # {test_stem}".to_string(),
            ..StageCommands::default()
        };
        let test = PathBuf::from("t/check_a.c");
        assert_eq!(
            commands.link_command(Side::C, &flags(&["-DX"]), &test),
            "cc -DX -o check_a t/check_a.c # check_a"
        );
    }

    #[test]
    fn test_side_build_stage() {
        assert_eq!(Side::C.build_stage(), StageKind::Build);
        assert_eq!(Side::Rust.build_stage(), StageKind::RustBuild);
    }

    #[tokio::test]
    async fn test_run_stage_tags_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let runner = StageRunner::new(Arc::new(ShellExecutor::new()), StageTimeouts::uniform(30));

        let ok = runner.run_stage(StageKind::Build, "true", dir.path()).await;
        assert_eq!(ok.stage, StageKind::Build);
        assert!(ok.passed());

        let bad = runner
            .run_stage(StageKind::Link, "echo 'undefined reference' >&2; false", dir.path())
            .await;
        assert_eq!(bad.stage, StageKind::Link);
        assert!(!bad.passed());
        assert_eq!(bad.outcome.stderr, "undefined reference\n");
    }

    #[tokio::test]
    async fn test_clean_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = StageRunner::new(Arc::new(ShellExecutor::new()), StageTimeouts::default());
        let outcome = runner.clean("exit 2", dir.path()).await;
        assert!(!outcome.is_passed());
    }
}
