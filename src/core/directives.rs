// src/core/directives.rs

use crate::constants::{CONTINUATION_MARKER, DIRECTIVE_KEYWORD, FILES_KEY, REFERENCE_KEY};
use crate::core::error::AraraError;
use crate::eval::Value;
use crate::models::{Directive, DirectiveConditional, FileType};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

lazy_static! {
    /// `<identifier>[: { ... }][ if|unless|while|until <expression>]`
    static ref DIRECTIVE_RE: Regex = Regex::new(
        r"^\s*(?P<id>[\w-]+)\s*(?::\s*(?P<params>\{.*\}))?\s*(?:\b(?P<kw>if|unless|while|until)\s+(?P<expr>\S.*?))?\s*$"
    )
    .expect("directive pattern is valid");
}

/// Directive text gathered from one `arara:` line and its continuations.
#[derive(Debug)]
struct RawDirective {
    text: String,
    line_numbers: Vec<usize>,
}

/// Extracts the directives embedded in `lines`.
///
/// Only comment lines, as told by the file type pattern, are considered.
/// In header mode extraction stops at the first line that is not a comment.
/// The returned directives carry no `reference` yet; see [`attach_reference`].
pub fn extract(
    lines: &[String],
    parse_only_header: bool,
    file_type: &FileType,
) -> Result<Vec<Directive>, AraraError> {
    let mut raw: Vec<RawDirective> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let number = index + 1;
        let Some(prefix) = file_type.pattern.find(line) else {
            if parse_only_header {
                debug!("Header ends at line {}", number);
                break;
            }
            continue;
        };
        let rest = line.get(prefix.end()..).unwrap_or_default();
        let Some(body) = rest.trim_start().strip_prefix(DIRECTIVE_KEYWORD) else {
            continue;
        };

        let body = body.trim();
        if let Some(continued) = body.strip_prefix(CONTINUATION_MARKER) {
            let previous = raw.last_mut().ok_or_else(|| AraraError::DirectiveParse {
                line: number,
                message: "a continuation must follow a directive".to_string(),
            })?;
            previous.text.push(' ');
            previous.text.push_str(continued.trim());
            previous.line_numbers.push(number);
        } else {
            raw.push(RawDirective {
                text: body.to_string(),
                line_numbers: vec![number],
            });
        }
    }

    raw.into_iter().map(parse_directive).collect()
}

fn parse_directive(raw: RawDirective) -> Result<Directive, AraraError> {
    let line = raw.line_numbers.first().copied().unwrap_or_default();
    let error = |message: String| AraraError::DirectiveParse { line, message };

    let captures = DIRECTIVE_RE
        .captures(&raw.text)
        .ok_or_else(|| error(format!("'{}' is not a valid directive", raw.text)))?;

    let parameters = match captures.name("params") {
        Some(params) => parse_parameters(params.as_str()).map_err(error)?,
        None => BTreeMap::new(),
    };
    if parameters.contains_key(REFERENCE_KEY) {
        return Err(error(format!("'{}' is a reserved parameter", REFERENCE_KEY)));
    }

    let conditional = match (captures.name("kw"), captures.name("expr")) {
        (Some(keyword), Some(expression)) => {
            DirectiveConditional::from_keyword(keyword.as_str(), expression.as_str().to_string())
                .ok_or_else(|| error(format!("unknown conditional '{}'", keyword.as_str())))?
        }
        _ => DirectiveConditional::None,
    };

    let directive = Directive {
        identifier: captures
            .name("id")
            .map(|id| id.as_str().to_string())
            .unwrap_or_default(),
        parameters,
        conditional,
        line_numbers: raw.line_numbers,
    };
    debug!(
        "Directive '{}' at line(s) {:?}, conditional: {}",
        directive.identifier, directive.line_numbers, directive.conditional
    );
    Ok(directive)
}

fn parse_parameters(source: &str) -> Result<BTreeMap<String, Value>, String> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(source).map_err(|e| e.to_string())?;
    match Value::from(yaml) {
        Value::Map(map) => Ok(map),
        other => Err(format!("parameters must be a map, found a {}", other.type_name())),
    }
}

/// Sets `reference` on every directive, replicating the ones that carry a
/// `files` list: one copy per file, resolved against the directory of
/// `file`, without the `files` key.
pub fn attach_reference(directives: Vec<Directive>, file: &Path) -> Result<Vec<Directive>, AraraError> {
    let base = file.parent().unwrap_or_else(|| Path::new("."));
    let mut expanded = Vec::with_capacity(directives.len());

    for mut directive in directives {
        let Some(files) = directive.parameters.remove(FILES_KEY) else {
            directive
                .parameters
                .insert(REFERENCE_KEY.to_string(), path_value(file));
            expanded.push(directive);
            continue;
        };

        let line = directive.line_numbers.first().copied().unwrap_or_default();
        let names: Vec<Value> = match files {
            Value::List(items) if !items.is_empty() => items,
            Value::Str(name) => vec![Value::Str(name)],
            _ => {
                return Err(AraraError::DirectiveParse {
                    line,
                    message: format!("'{}' must be a non-empty list of file names", FILES_KEY),
                });
            }
        };
        for name in names {
            let Value::Str(name) = name else {
                return Err(AraraError::DirectiveParse {
                    line,
                    message: format!("'{}' entries must be file names", FILES_KEY),
                });
            };
            let mut copy = directive.clone();
            copy.parameters
                .insert(REFERENCE_KEY.to_string(), path_value(&base.join(name)));
            expanded.push(copy);
        }
    }
    Ok(expanded)
}

fn path_value(path: &Path) -> Value {
    Value::Str(dunce::simplified(path).to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tex() -> FileType {
        FileType::defaults().remove(0)
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn directives_with_parameters_and_conditionals() {
        let source = lines(
            "% arara: pdflatex: { shell: yes, options: [ '-draftmode' ] }\n\
             % arara: bibtex if missing('bbl')\n\
             \\documentclass{article}\n\
             % arara: pdflatex until !found('log', 'Rerun')\n",
        );
        let directives = extract(&source, false, &tex()).unwrap();
        assert_eq!(directives.len(), 3);

        assert_eq!(directives[0].identifier, "pdflatex");
        assert_eq!(directives[0].parameters.get("shell"), Some(&Value::from("yes")));
        assert_eq!(
            directives[0].parameters.get("options"),
            Some(&Value::List(vec![Value::from("-draftmode")]))
        );
        assert_eq!(
            directives[1].conditional,
            DirectiveConditional::If("missing('bbl')".into())
        );
        assert_eq!(
            directives[2].conditional,
            DirectiveConditional::Until("!found('log', 'Rerun')".into())
        );
        assert_eq!(directives[2].line_numbers, vec![4]);
    }

    #[test]
    fn header_mode_stops_at_the_first_non_comment() {
        let source = lines("% arara: clean\n\\begin{document}\n% arara: pdflatex\n");
        assert_eq!(extract(&source, true, &tex()).unwrap().len(), 1);
        assert_eq!(extract(&source, false, &tex()).unwrap().len(), 2);
    }

    #[test]
    fn continuations_are_joined() {
        let source = lines(
            "% arara: pdflatex: {\n% arara: --> shell: yes }\n% arara: --> if changed('tex')\n",
        );
        let directives = extract(&source, false, &tex()).unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].line_numbers, vec![1, 2, 3]);
        assert_eq!(directives[0].parameters.get("shell"), Some(&Value::from("yes")));
        assert_eq!(
            directives[0].conditional,
            DirectiveConditional::If("changed('tex')".into())
        );
    }

    #[test]
    fn invalid_directives_report_their_line() {
        let cases = [
            "text\n% arara: --> orphan\n",
            "\n% arara: pdflatex: { shell: yes\n",
            "\n% arara: pdflatex: { reference: other.tex }\n",
            "\n% arara: pdflatex: [a, b]\n",
        ];
        for source in cases {
            let error = extract(&lines(source), false, &tex()).unwrap_err();
            assert!(
                matches!(error, AraraError::DirectiveParse { line: 2, .. }),
                "{:?} gave {:?}",
                source,
                error
            );
        }
    }

    #[test]
    fn files_replicate_the_directive() {
        let source = lines("% arara: makeindex: { files: [a.idx, b.idx], style: x }\n% arara: clean\n");
        let directives = extract(&source, false, &tex()).unwrap();
        let expanded = attach_reference(directives, Path::new("/work/doc.tex")).unwrap();

        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[0].reference(), Some(&path_value(Path::new("/work/a.idx"))));
        assert_eq!(expanded[1].reference(), Some(&path_value(Path::new("/work/b.idx"))));
        assert!(!expanded[0].parameters.contains_key(FILES_KEY));
        assert_eq!(expanded[1].parameters.get("style"), Some(&Value::from("x")));
        assert_eq!(expanded[2].reference(), Some(&path_value(Path::new("/work/doc.tex"))));
    }
}
