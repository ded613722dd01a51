// src/core/rule_loader.rs

use crate::constants::{REFERENCE_KEY, RULE_DIALECT_EXTENSION};
use crate::core::error::AraraError;
use crate::models::Rule;
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Optional tag some rule files start with.
const CONFIG_TAG: &str = "!config";

/// Reads and validates the rule stored at `path`.
///
/// TOML files are read as the alternate dialect, anything else as YAML.
/// The rule must declare the `identifier` the directive asked for.
pub fn load(path: &Path, identifier: &str) -> Result<Rule, AraraError> {
    let content = fs::read_to_string(path).map_err(|e| parse_error(path, e.to_string()))?;
    let is_dialect = path
        .extension()
        .is_some_and(|ext| ext == RULE_DIALECT_EXTENSION);

    let rule: Rule = if is_dialect {
        toml::from_str(&content).map_err(|e| parse_error(path, e.to_string()))?
    } else {
        serde_yaml::from_str(strip_config_tag(&content))
            .map_err(|e| parse_error(path, e.to_string()))?
    };
    debug!(
        "Loaded rule '{}' with {} argument(s) and {} command(s) from '{}'",
        rule.identifier,
        rule.arguments.len(),
        rule.commands.len(),
        path.display()
    );

    validate(&rule, path, identifier)?;
    Ok(rule)
}

fn strip_config_tag(content: &str) -> &str {
    let trimmed = content.trim_start();
    match trimmed.strip_prefix(CONFIG_TAG) {
        Some(rest) if rest.starts_with(['\n', '\r']) || rest.is_empty() => rest,
        _ => content,
    }
}

fn validate(rule: &Rule, path: &Path, identifier: &str) -> Result<(), AraraError> {
    if rule.identifier != identifier {
        return Err(parse_error(
            path,
            format!(
                "the rule identifier '{}' does not match the directive '{}'",
                rule.identifier, identifier
            ),
        ));
    }
    if rule.commands.is_empty() {
        return Err(parse_error(path, "the rule has no commands"));
    }

    let mut seen = HashSet::new();
    for argument in &rule.arguments {
        if argument.identifier == REFERENCE_KEY {
            return Err(parse_error(
                path,
                format!("'{}' is reserved and cannot be declared as an argument", REFERENCE_KEY),
            ));
        }
        if !seen.insert(argument.identifier.as_str()) {
            return Err(parse_error(
                path,
                format!("the argument '{}' is declared twice", argument.identifier),
            ));
        }
    }
    Ok(())
}

fn parse_error(path: &Path, message: impl Into<String>) -> AraraError {
    AraraError::RuleParse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PDFLATEX: &str = r#"!config
identifier: pdflatex
name: PDFLaTeX
authors:
- Marco Daniel
arguments:
- identifier: shell
  flag: "@{ isTrue(parameters.shell, '--shell-escape', '--no-shell-escape') }"
- identifier: options
  flag: "@{ options }"
commands:
- name: PDFLaTeX engine
  command: "@{ getCommand('pdflatex', shell, options, reference) }"
"#;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn yaml_rules_with_config_tag() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "pdflatex.yaml", PDFLATEX);
        let rule = load(&path, "pdflatex").unwrap();
        assert_eq!(rule.display_name(), "PDFLaTeX");
        assert_eq!(rule.arguments.len(), 2);
        assert_eq!(rule.commands[0].exit, None);
        assert!(!rule.arguments[0].required);
    }

    #[test]
    fn toml_dialect() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "halt.toml",
            r#"
identifier = "halt"
name = "Halt"

[[commands]]
command = "@{ halt() }"
exit = "value == 0"
"#,
        );
        let rule = load(&path, "halt").unwrap();
        assert_eq!(rule.commands[0].command, "@{ halt() }");
        assert_eq!(rule.commands[0].exit.as_deref(), Some("value == 0"));
    }

    #[test]
    fn schema_violations_are_rule_parse_errors() {
        let dir = tempdir().unwrap();
        let cases = [
            ("mismatch.yaml", "identifier: other\ncommands:\n- command: x\n", "mismatch"),
            ("empty.yaml", "identifier: empty\ncommands: []\n", "empty"),
            (
                "dup.yaml",
                "identifier: dup\narguments:\n- identifier: a\n- identifier: a\ncommands:\n- command: x\n",
                "dup",
            ),
            (
                "reserved.yaml",
                "identifier: reserved\narguments:\n- identifier: reference\ncommands:\n- command: x\n",
                "reserved",
            ),
            ("broken.yaml", "identifier: [unclosed\n", "broken"),
        ];
        for (name, content, identifier) in cases {
            let path = write(dir.path(), name, content);
            assert!(
                matches!(load(&path, identifier), Err(AraraError::RuleParse { .. })),
                "{} should be rejected",
                name
            );
        }
        assert!(matches!(
            load(&dir.path().join("absent.yaml"), "absent"),
            Err(AraraError::RuleParse { .. })
        ));
    }
}
