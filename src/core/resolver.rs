// src/core/resolver.rs

use crate::constants::{DISTRIBUTION_RULE_PREFIX, RULE_DIALECT_EXTENSION, RULE_EXTENSION};
use crate::core::error::AraraError;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// File names probed for `identifier` inside one search path, in order.
fn candidates(identifier: &str) -> [String; 3] {
    [
        format!("{}.{}", identifier, RULE_EXTENSION),
        format!("{}.{}", identifier, RULE_DIALECT_EXTENSION),
        format!("{}{}.{}", DISTRIBUTION_RULE_PREFIX, identifier, RULE_EXTENSION),
    ]
}

/// Finds the rule file for `identifier`.
///
/// Search paths are tried in order and every candidate name is probed
/// inside one path before moving to the next, so an earlier path always
/// wins over a better-named file in a later one.
pub fn resolve(identifier: &str, search_paths: &[PathBuf]) -> Result<PathBuf, AraraError> {
    let names = candidates(identifier);
    for dir in search_paths {
        for name in &names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                info!(
                    "Rule '{}' resolved to '{}'",
                    identifier,
                    candidate.display()
                );
                return Ok(dunce::simplified(&candidate).to_path_buf());
            }
        }
        debug!("No rule '{}' in '{}'", identifier, dir.display());
    }

    Err(AraraError::RuleNotFound {
        identifier: identifier.to_string(),
        paths: search_paths.iter().map(|p| normalize(p)).collect(),
    })
}

fn normalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn earlier_search_paths_win() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(first.path().join("arara-rule-clean.yaml"), "").unwrap();
        fs::write(second.path().join("clean.yaml"), "").unwrap();

        let found = resolve(
            "clean",
            &[first.path().to_path_buf(), second.path().to_path_buf()],
        )
        .unwrap();
        assert_eq!(found.file_name().unwrap(), "arara-rule-clean.yaml");
    }

    #[test]
    fn plain_name_beats_dialect_and_prefix_in_the_same_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("clean.toml"), "").unwrap();
        fs::write(dir.path().join("arara-rule-clean.yaml"), "").unwrap();
        let found = resolve("clean", &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(found.file_name().unwrap(), "clean.toml");

        fs::write(dir.path().join("clean.yaml"), "").unwrap();
        let found = resolve("clean", &[dir.path().to_path_buf()]).unwrap();
        assert_eq!(found.file_name().unwrap(), "clean.yaml");
    }

    #[test]
    fn missing_rule_lists_every_search_path() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let error = resolve("ghost", &[a.path().to_path_buf(), b.path().to_path_buf()])
            .unwrap_err();
        let AraraError::RuleNotFound { identifier, paths } = error else {
            panic!("expected RuleNotFound");
        };
        assert_eq!(identifier, "ghost");
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.is_absolute()));
    }
}
