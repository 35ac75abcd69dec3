//! Pipeline configuration, loadable from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! stock `make` / `bear` / `c2rust` / `cargo` toolchain setup.

use crate::error::{BenchError, Result};
use crate::flags::FlagCombination;
use crate::model::{ProgramSpec, StageKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory relative program paths are resolved against.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Number of programs processed concurrently (1 = sequential).
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Which flag combination the program is built with before transpiling.
    #[serde(default)]
    pub transpile_flags: TranspilePolicy,

    /// Upper bound on optional flags per program (the matrix is `2^n`).
    #[serde(default = "default_max_optional_flags")]
    pub max_optional_flags: usize,

    /// Command templates for each step.
    #[serde(default)]
    pub commands: StageCommands,

    /// Per-stage timeouts.
    #[serde(default)]
    pub timeouts: StageTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            jobs: default_jobs(),
            transpile_flags: TranspilePolicy::default(),
            max_optional_flags: default_max_optional_flags(),
            commands: StageCommands::default(),
            timeouts: StageTimeouts::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BenchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| BenchError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_jobs() -> usize {
    1
}
fn default_max_optional_flags() -> usize {
    12
}

/// Flag combination used to refresh the compilation database before
/// transpiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranspilePolicy {
    /// Every optional flag enabled.
    #[default]
    #[serde(alias = "all")]
    AllFlags,
    /// No optional flags.
    #[serde(alias = "none")]
    NoFlags,
}

impl TranspilePolicy {
    /// The combination a program is built with before transpiling.
    pub fn flags_for(&self, program: &ProgramSpec) -> FlagCombination {
        match self {
            TranspilePolicy::AllFlags => FlagCombination::all(&program.optional_flags),
            TranspilePolicy::NoFlags => FlagCombination::empty(),
        }
    }
}

impl fmt::Display for TranspilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranspilePolicy::AllFlags => f.write_str("all_flags"),
            TranspilePolicy::NoFlags => f.write_str("no_flags"),
        }
    }
}

impl FromStr for TranspilePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "all_flags" | "all-flags" => Ok(TranspilePolicy::AllFlags),
            "none" | "no_flags" | "no-flags" => Ok(TranspilePolicy::NoFlags),
            other => Err(format!("unknown transpile policy: {other} (expected 'all' or 'none')")),
        }
    }
}

/// Command templates for every pipeline step.
///
/// Templates are shell command lines. Placeholders: `{flags}` (the flag
/// combination joined by spaces), `{test_file}`, `{test_stem}` and `{exe}`
/// (the test executable name for the current side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCommands {
    #[serde(default = "default_clean")]
    pub clean: String,
    #[serde(default = "default_build")]
    pub build: String,
    #[serde(default = "default_link")]
    pub link: String,
    #[serde(default = "default_execute")]
    pub execute: String,
    #[serde(default = "default_transpile")]
    pub transpile: String,
    #[serde(default = "default_rust_clean")]
    pub rust_clean: String,
    #[serde(default = "default_rust_build")]
    pub rust_build: String,
    #[serde(default = "default_rust_link")]
    pub rust_link: String,
    /// Prefix of Rust-side test executables, keeping them apart from the C ones.
    #[serde(default = "default_rust_exe_prefix")]
    pub rust_exe_prefix: String,
}

impl Default for StageCommands {
    fn default() -> Self {
        Self {
            clean: default_clean(),
            build: default_build(),
            link: default_link(),
            execute: default_execute(),
            transpile: default_transpile(),
            rust_clean: default_rust_clean(),
            rust_build: default_rust_build(),
            rust_link: default_rust_link(),
            rust_exe_prefix: default_rust_exe_prefix(),
        }
    }
}

fn default_clean() -> String {
    "make clean".to_string()
}
fn default_build() -> String {
    "bear -- make {flags}".to_string()
}
fn default_link() -> String {
    "make {exe}".to_string()
}
fn default_execute() -> String {
    "./{exe}".to_string()
}
fn default_transpile() -> String {
    "c2rust transpile --emit-build-files compile_commands.json".to_string()
}
fn default_rust_clean() -> String {
    "cargo clean".to_string()
}
fn default_rust_build() -> String {
    "cargo build --release".to_string()
}
fn default_rust_link() -> String {
    "gcc -o {exe} {test_file} -Isrc -Ltarget/release -lc2rust_out -ldl -lpthread -lm".to_string()
}
fn default_rust_exe_prefix() -> String {
    "c2rust_".to_string()
}

/// Per-stage timeouts in seconds; 0 disables the timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTimeouts {
    #[serde(default = "default_clean_secs")]
    pub clean_secs: u64,
    #[serde(default = "default_build_secs")]
    pub build_secs: u64,
    #[serde(default = "default_transpile_secs")]
    pub transpile_secs: u64,
    #[serde(default = "default_rust_build_secs")]
    pub rust_build_secs: u64,
    #[serde(default = "default_link_secs")]
    pub link_secs: u64,
    #[serde(default = "default_execute_secs")]
    pub execute_secs: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            clean_secs: default_clean_secs(),
            build_secs: default_build_secs(),
            transpile_secs: default_transpile_secs(),
            rust_build_secs: default_rust_build_secs(),
            link_secs: default_link_secs(),
            execute_secs: default_execute_secs(),
        }
    }
}

impl StageTimeouts {
    /// The same timeout for every stage.
    pub fn uniform(secs: u64) -> Self {
        Self {
            clean_secs: secs,
            build_secs: secs,
            transpile_secs: secs,
            rust_build_secs: secs,
            link_secs: secs,
            execute_secs: secs,
        }
    }

    pub fn for_stage(&self, stage: StageKind) -> Option<Duration> {
        let secs = match stage {
            StageKind::Build => self.build_secs,
            StageKind::Transpile => self.transpile_secs,
            StageKind::RustBuild => self.rust_build_secs,
            StageKind::Link => self.link_secs,
            StageKind::Execute => self.execute_secs,
        };
        to_timeout(secs)
    }

    pub fn for_clean(&self) -> Option<Duration> {
        to_timeout(self.clean_secs)
    }
}

fn to_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_clean_secs() -> u64 {
    120
}
fn default_build_secs() -> u64 {
    600
}
fn default_transpile_secs() -> u64 {
    600
}
fn default_rust_build_secs() -> u64 {
    1200
}
fn default_link_secs() -> u64 {
    120
}
fn default_execute_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config.jobs, 1);
        assert_eq!(config.transpile_flags, TranspilePolicy::AllFlags);
        assert_eq!(config.commands.build, "bear -- make {flags}");
        assert_eq!(config.timeouts.execute_secs, 60);
    }

    #[test]
    fn test_partial_override() {
        let config: PipelineConfig = toml::from_str(
            r#"
            jobs = 4
            transpile_flags = "none"

            [commands]
            build = "make CFLAGS='{flags}'"

            [timeouts]
            execute_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.jobs, 4);
        assert_eq!(config.transpile_flags, TranspilePolicy::NoFlags);
        assert_eq!(config.commands.build, "make CFLAGS='{flags}'");
        assert_eq!(config.commands.clean, "make clean");
        assert_eq!(config.timeouts.for_stage(StageKind::Execute), None);
        assert_eq!(
            config.timeouts.for_stage(StageKind::Build),
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_optional_flags = 4").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_optional_flags, 4);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "jobs = \"many\"").unwrap();

        let err = PipelineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, BenchError::ConfigParse { .. }));
    }

    #[test]
    fn test_transpile_policy_from_str() {
        assert_eq!("all".parse::<TranspilePolicy>().unwrap(), TranspilePolicy::AllFlags);
        assert_eq!("NONE".parse::<TranspilePolicy>().unwrap(), TranspilePolicy::NoFlags);
        assert!("some".parse::<TranspilePolicy>().is_err());
    }

    #[test]
    fn test_transpile_policy_flags() {
        let program = ProgramSpec::new("p", "p").with_flags(["-DA", "-DB"]);
        assert_eq!(TranspilePolicy::AllFlags.flags_for(&program).join(), "-DA -DB");
        assert!(TranspilePolicy::NoFlags.flags_for(&program).is_empty());
    }

    #[test]
    fn test_uniform_timeouts() {
        let timeouts = StageTimeouts::uniform(5);
        for stage in StageKind::ALL {
            assert_eq!(timeouts.for_stage(stage), Some(Duration::from_secs(5)));
        }
        assert_eq!(timeouts.for_clean(), Some(Duration::from_secs(5)));
    }
}
