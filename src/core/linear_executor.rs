// src/core/linear_executor.rs

use crate::core::error::AraraError;
use crate::core::interpreter::Interpreter;
use crate::core::session::Session;
use crate::core::{directives, display, files};
use crate::eval::Evaluator;
use crate::models::{ExecutionOptions, ExecutionStatus, ProjectFile};
use log::info;

/// Processes `files` in order and returns the worst status seen.
///
/// An error aborts the run: the files after the failing one are not
/// processed.
pub fn execute_files(
    files: &[ProjectFile],
    options: &ExecutionOptions,
    session: &mut Session,
    evaluator: &dyn Evaluator,
) -> Result<ExecutionStatus, AraraError> {
    let mut status = ExecutionStatus::Processing;
    for file in files {
        status = status.max(execute_file(file, options, session, evaluator)?);
    }
    Ok(status)
}

/// Runs every directive of one file until it ends, halts or fails.
pub fn execute_file(
    file: &ProjectFile,
    options: &ExecutionOptions,
    session: &mut Session,
    evaluator: &dyn Evaluator,
) -> Result<ExecutionStatus, AraraError> {
    let lines = files::read_lines(file)?;
    let extracted = directives::extract(&lines, options.parse_only_header, &file.file_type)?;
    let directives = directives::attach_reference(extracted, &file.path)?;
    info!(
        "Found {} directive(s) in '{}'",
        directives.len(),
        file.path.display()
    );

    display::print_file_header(file);
    if directives.is_empty() {
        display::print_no_directives(file);
        return Ok(ExecutionStatus::Processing);
    }

    let mut interpreter = Interpreter::new(options, session, file, evaluator);
    let mut status = ExecutionStatus::Processing;
    for directive in &directives {
        status = status.max(interpreter.execute(directive)?);
        if interpreter.is_halted() {
            info!("Processing of '{}' was halted", file.path.display());
            break;
        }
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ChangeCache;
    use crate::eval::{TemplateEvaluator, Value};
    use crate::models::FileType;
    use std::fs;
    use tempfile::tempdir;

    const MARK: &str = r#"identifier: mark
arguments:
- identifier: key
  flag: "@{ key }"
commands:
- command: "@{ putSession(key, true); true }"
"#;

    const STOP: &str = r#"identifier: stop
arguments:
- identifier: code
  flag: "@{ code }"
  default: "@{ 0 }"
commands:
- command: "@{ halt(code) }"
"#;

    fn setup(source: &str) -> (tempfile::TempDir, ExecutionOptions, ProjectFile) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("mark.yaml"), MARK).unwrap();
        fs::write(dir.path().join("stop.yaml"), STOP).unwrap();
        let tex = dir.path().join("doc.tex");
        fs::write(&tex, source).unwrap();
        let options = ExecutionOptions {
            rule_paths: vec![dir.path().to_path_buf()],
            working_directory: dir.path().to_path_buf(),
            ..ExecutionOptions::default()
        };
        let file = ProjectFile::new(tex, FileType::defaults().remove(0));
        (dir, options, file)
    }

    #[test]
    fn halting_skips_the_remaining_directives() {
        let (_dir, options, file) = setup(
            "% arara: mark: { key: first }\n% arara: stop\n% arara: mark: { key: second }\n",
        );
        let mut session = Session::new(ChangeCache::in_memory());
        let status = execute_file(&file, &options, &mut session, &TemplateEvaluator).unwrap();
        assert_eq!(status, ExecutionStatus::Processing);
        assert_eq!(session.get("first"), Some(&Value::Bool(true)));
        assert_eq!(session.get("second"), None);
    }

    #[test]
    fn halt_codes_set_the_file_status() {
        let (_dir, options, file) = setup("% arara: stop: { code: 3 }\n");
        let mut session = Session::new(ChangeCache::in_memory());
        let status = execute_files(
            std::slice::from_ref(&file),
            &options,
            &mut session,
            &TemplateEvaluator,
        )
        .unwrap();
        assert_eq!(status.exit_code(), 1);
    }

    #[test]
    fn errors_abort_the_run() {
        let (dir, options, file) = setup("% arara: mark: { wrong: 1 }\n% arara: mark: { key: after }\n");
        let other = dir.path().join("other.tex");
        fs::write(&other, "% arara: mark: { key: other }\n").unwrap();
        let other = ProjectFile::new(other, FileType::defaults().remove(0));

        let mut session = Session::new(ChangeCache::in_memory());
        let result = execute_files(&[file, other], &options, &mut session, &TemplateEvaluator);
        assert!(result.is_err());
        assert_eq!(session.get("after"), None);
        assert_eq!(session.get("other"), None);
    }

    #[test]
    fn files_without_directives_succeed() {
        let (_dir, options, file) = setup("\\documentclass{article}\n");
        let mut session = Session::new(ChangeCache::in_memory());
        assert_eq!(
            execute_file(&file, &options, &mut session, &TemplateEvaluator).unwrap(),
            ExecutionStatus::Processing
        );
    }
}
