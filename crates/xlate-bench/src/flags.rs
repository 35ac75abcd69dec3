//! Optional compile-flag subsets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A subset of a program's optional flags, kept in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct FlagCombination(Vec<String>);

impl FlagCombination {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// The combination with every flag enabled.
    pub fn all(flags: &[String]) -> Self {
        Self(flags.to_vec())
    }

    pub fn flags(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Canonical form passed to the build command: flags joined by a space.
    pub fn join(&self) -> String {
        self.0.join(" ")
    }

    fn with(&self, flag: &str) -> Self {
        let mut flags = self.0.clone();
        flags.push(flag.to_string());
        Self(flags)
    }
}

impl fmt::Display for FlagCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("(no flags)")
        } else {
            f.write_str(&self.join())
        }
    }
}

/// Every subset of `flags`, `2^n` in total.
///
/// Each flag is branched on in order, exclusion first, so the empty
/// combination comes first and the all-flags combination last. For
/// `[A, B]` this yields `[]`, `[B]`, `[A]`, `[A, B]`.
pub fn combinations(flags: &[String]) -> Vec<FlagCombination> {
    let mut out = Vec::new();
    expand(flags, &FlagCombination::empty(), &mut out);
    out
}

fn expand(remaining: &[String], prefix: &FlagCombination, out: &mut Vec<FlagCombination>) {
    match remaining.split_first() {
        None => out.push(prefix.clone()),
        Some((flag, rest)) => {
            expand(rest, prefix, out);
            expand(rest, &prefix.with(flag), out);
        }
    }
}
