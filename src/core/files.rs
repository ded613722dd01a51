// src/core/files.rs

use crate::core::error::AraraError;
use crate::models::{FileType, ProjectFile};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Finds the file to process for a name given on the command line.
///
/// An existing file with a known extension is used as is. Otherwise each
/// known extension is appended in turn, so `doc` finds `doc.tex`.
pub fn resolve_file(
    name: &str,
    working_directory: &Path,
    file_types: &[FileType],
) -> Result<ProjectFile, AraraError> {
    let base = working_directory.join(name);

    if base.is_file() {
        let extension = base
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(file_type) = file_types.iter().find(|t| t.extension == extension) {
            return Ok(ProjectFile::new(normalize(&base), file_type.clone()));
        }
        debug!("'{}' exists but has no known file type", base.display());
    }

    for file_type in file_types {
        let mut candidate = base.clone().into_os_string();
        candidate.push(".");
        candidate.push(&file_type.extension);
        let candidate = PathBuf::from(candidate);
        if candidate.is_file() {
            debug!("Resolved '{}' to '{}'", name, candidate.display());
            return Ok(ProjectFile::new(normalize(&candidate), file_type.clone()));
        }
    }

    Err(AraraError::FileNotFound {
        name: name.to_string(),
    })
}

/// Reads the lines of a file to scan for directives.
pub fn read_lines(file: &ProjectFile) -> Result<Vec<String>, AraraError> {
    let content = fs::read(&file.path).map_err(|e| AraraError::io(&file.path, e))?;
    Ok(String::from_utf8_lossy(&content)
        .lines()
        .map(String::from)
        .collect())
}

fn normalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn known_extension_is_used_directly() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("paper.dtx"), "% arara: clean").unwrap();
        let file = resolve_file("paper.dtx", dir.path(), &FileType::defaults()).unwrap();
        assert_eq!(file.file_type.extension, "dtx");
        assert!(file.path.is_absolute());
    }

    #[test]
    fn extensions_are_tried_in_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("paper.ltx"), "").unwrap();
        fs::write(dir.path().join("paper.ins"), "").unwrap();
        let file = resolve_file("paper", dir.path(), &FileType::defaults()).unwrap();
        assert_eq!(file.name(), "paper.ltx");
    }

    #[test]
    fn unknown_files_are_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();
        assert!(matches!(
            resolve_file("notes.md", dir.path(), &FileType::defaults()),
            Err(AraraError::FileNotFound { name }) if name == "notes.md"
        ));
        assert!(resolve_file("ghost", dir.path(), &FileType::defaults()).is_err());
    }

    #[test]
    fn lines_are_read_lossily() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.tex");
        fs::write(&path, b"% arara: pdflatex\n\xff\n").unwrap();
        let file = ProjectFile::new(path, FileType::defaults().remove(0));
        let lines = read_lines(&file).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "% arara: pdflatex");
    }
}
