//! Loading and validating the program list produced by metadata discovery.

use crate::error::{BenchError, Result};
use crate::model::ProgramSpec;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// On-disk metadata document: `{ "programs": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub programs: Vec<ProgramSpec>,
}

/// Read and validate the program list from a JSON metadata file.
pub fn load(path: &Path, max_optional_flags: usize) -> Result<Vec<ProgramSpec>> {
    let content = std::fs::read_to_string(path).map_err(|source| BenchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata: Metadata = serde_json::from_str(&content).map_err(|source| BenchError::MetadataParse {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&metadata.programs, max_optional_flags)?;

    info!(path = %path.display(), programs = metadata.programs.len(), "loaded metadata");
    Ok(metadata.programs)
}

/// Reject program lists the pipeline cannot process meaningfully.
pub fn validate(programs: &[ProgramSpec], max_optional_flags: usize) -> Result<()> {
    let mut names = HashSet::new();
    for program in programs {
        if program.name.trim().is_empty() {
            return Err(BenchError::InvalidMetadata(format!(
                "program at {} has an empty name",
                program.path.display()
            )));
        }
        if !names.insert(program.name.as_str()) {
            return Err(BenchError::InvalidMetadata(format!(
                "duplicate program name '{}'",
                program.name
            )));
        }
        if program.optional_flags.len() > max_optional_flags {
            return Err(BenchError::InvalidMetadata(format!(
                "program '{}' has {} optional flags (limit {})",
                program.name,
                program.optional_flags.len(),
                max_optional_flags
            )));
        }
        let mut flags = HashSet::new();
        if let Some(dup) = program.optional_flags.iter().find(|f| !flags.insert(f.as_str())) {
            return Err(BenchError::InvalidMetadata(format!(
                "program '{}' lists optional flag '{}' twice",
                program.name, dup
            )));
        }
    }
    Ok(())
}

/// Deterministic SHA-256 digest of the program list.
pub fn digest(programs: &[ProgramSpec]) -> Result<String> {
    let mut hasher = Sha256::new();
    for program in programs {
        hasher.update(serde_json::to_vec(program)?);
        hasher.update(b"\0");
    }
    Ok(hex::encode(hasher.finalize()))
}
