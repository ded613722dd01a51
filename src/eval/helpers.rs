// src/eval/helpers.rs

use super::{CommandLine, EvalError, Runtime, Value};
use crate::system::executor;
use colored::*;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use regex::Regex;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

type HelperResult = Result<Value, EvalError>;

/// A function rules may call from any expression.
struct HelperDefinition {
    name: &'static str,
    handler: fn(&[Value], &mut Runtime<'_>) -> HelperResult,
}

/// Every helper function, by name. Built once, read-only afterwards.
static HELPER_REGISTRY: &[HelperDefinition] = &[
    // --- Conditional helpers ---
    HelperDefinition { name: "exists", handler: exists },
    HelperDefinition { name: "missing", handler: missing },
    HelperDefinition { name: "changed", handler: changed },
    HelperDefinition { name: "unchanged", handler: unchanged },
    HelperDefinition { name: "found", handler: found },
    HelperDefinition { name: "toFile", handler: to_file },
    HelperDefinition { name: "currentFile", handler: current_file },
    HelperDefinition { name: "showInput", handler: show_input },
    HelperDefinition { name: "showOptions", handler: show_options },
    // --- Rule helpers ---
    HelperDefinition { name: "halt", handler: halt },
    HelperDefinition { name: "getOriginalFile", handler: get_original_file },
    HelperDefinition { name: "getOriginalReference", handler: get_original_reference },
    HelperDefinition { name: "trimSpaces", handler: trim_spaces },
    HelperDefinition { name: "getBasename", handler: get_basename },
    HelperDefinition { name: "getFiletype", handler: get_filetype },
    HelperDefinition { name: "replicatePattern", handler: replicate_pattern },
    HelperDefinition { name: "throwError", handler: throw_error },
    HelperDefinition { name: "getSession", handler: get_session },
    HelperDefinition { name: "putSession", handler: put_session },
    HelperDefinition { name: "buildString", handler: build_string },
    HelperDefinition { name: "getCommand", handler: get_command },
    HelperDefinition { name: "getCommandWithWorkingDirectory", handler: get_command_with_working_directory },
    HelperDefinition { name: "isVerboseMode", handler: is_verbose_mode },
    HelperDefinition { name: "isDryRunMode", handler: is_dry_run_mode },
    HelperDefinition { name: "showMessage", handler: show_message },
    HelperDefinition { name: "isOnPath", handler: is_on_path },
    HelperDefinition { name: "unsafelyExecuteSystemCommand", handler: unsafely_execute_system_command },
    HelperDefinition { name: "listFilesByExtensions", handler: list_files_by_extensions },
    HelperDefinition { name: "listFilesByPatterns", handler: list_files_by_patterns },
    HelperDefinition { name: "writeToFile", handler: write_to_file },
    HelperDefinition { name: "readFromFile", handler: read_from_file },
    HelperDefinition { name: "isSubdirectory", handler: is_subdirectory },
    // --- Value predicates ---
    HelperDefinition { name: "isEmpty", handler: is_empty },
    HelperDefinition { name: "isNotEmpty", handler: is_not_empty },
    HelperDefinition { name: "isTrue", handler: is_true },
    HelperDefinition { name: "isFalse", handler: is_false },
    HelperDefinition { name: "isString", handler: is_string },
    HelperDefinition { name: "isList", handler: is_list },
    HelperDefinition { name: "isMap", handler: is_map },
    HelperDefinition { name: "isBoolean", handler: is_boolean },
    HelperDefinition { name: "containsKey", handler: contains_key },
    HelperDefinition { name: "size", handler: size },
    // --- Platform predicates ---
    HelperDefinition { name: "isWindows", handler: is_windows },
    HelperDefinition { name: "isLinux", handler: is_linux },
    HelperDefinition { name: "isMac", handler: is_mac },
    HelperDefinition { name: "isUnix", handler: is_unix },
    HelperDefinition { name: "isCygwin", handler: is_cygwin },
];

/// Finds a helper definition in the registry by its name.
fn find_helper(name: &str) -> Option<&'static HelperDefinition> {
    HELPER_REGISTRY.iter().find(|helper| helper.name == name)
}

/// The names of all registered helpers, in registry order.
pub fn helper_names() -> impl Iterator<Item = &'static str> {
    HELPER_REGISTRY.iter().map(|helper| helper.name)
}

/// Calls the helper `name` with already evaluated arguments.
pub fn call(name: &str, args: Vec<Value>, runtime: &mut Runtime<'_>) -> HelperResult {
    let helper = find_helper(name).ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
    log::trace!("Calling helper '{}' with {} argument(s)", name, args.len());
    (helper.handler)(&args, runtime)
}

// --- Argument access ---

fn arity(function: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(EvalError::helper(
            function,
            format!("expected {} argument(s), got {}", expected, args.len()),
        ));
    }
    Ok(())
}

fn string_arg(function: &str, args: &[Value], index: usize) -> Result<String, EvalError> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(Value::Int(i)) => Ok(i.to_string()),
        Some(other) => Err(EvalError::helper(
            function,
            format!("argument {} must be a string, found a {}", index + 1, other.type_name()),
        )),
        None => Err(EvalError::helper(function, format!("missing argument {}", index + 1))),
    }
}

fn bool_arg(function: &str, args: &[Value], index: usize) -> Result<bool, EvalError> {
    match args.get(index) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(EvalError::helper(
            function,
            format!("argument {} must be a boolean, found a {}", index + 1, other.type_name()),
        )),
        None => Err(EvalError::helper(function, format!("missing argument {}", index + 1))),
    }
}

fn list_of_strings(function: &str, args: &[Value], index: usize) -> Result<Vec<String>, EvalError> {
    match args.get(index) {
        Some(value @ Value::List(_)) => Ok(value
            .clone()
            .flatten()
            .into_iter()
            .map(|v| v.to_string())
            .collect()),
        Some(Value::Str(s)) => Ok(vec![s.clone()]),
        Some(other) => Err(EvalError::helper(
            function,
            format!("argument {} must be a list, found a {}", index + 1, other.type_name()),
        )),
        None => Err(EvalError::helper(function, format!("missing argument {}", index + 1))),
    }
}

/// Shared shape of the predicate helpers: with one extra argument the result
/// is that argument or an empty string; with two, one of the two.
fn choose(function: &str, condition: bool, extra: &[Value]) -> HelperResult {
    match extra {
        [] => Ok(Value::Bool(condition)),
        [then] => Ok(if condition { then.clone() } else { Value::from("") }),
        [then, otherwise] => Ok(if condition { then.clone() } else { otherwise.clone() }),
        _ => Err(EvalError::helper(function, "expected at most two alternatives")),
    }
}

// --- Path resolution ---

/// Resolves a file argument.
///
/// A bare word such as `'pdf'` names a sibling of the current file with that
/// extension; anything containing a dot or a separator is a path, relative
/// to the working directory.
fn resolve_target(argument: &str, runtime: &Runtime<'_>) -> PathBuf {
    let looks_like_path =
        argument.contains('.') || argument.contains('/') || argument.contains(std::path::MAIN_SEPARATOR);
    if looks_like_path {
        resolve_path(argument, runtime)
    } else {
        runtime.file.path.with_extension(argument)
    }
}

fn resolve_path(argument: &str, runtime: &Runtime<'_>) -> PathBuf {
    let path = Path::new(argument);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        runtime.options.working_directory.join(path)
    };
    joined.components().collect()
}

fn path_value(path: &Path) -> Value {
    Value::Str(dunce::simplified(path).to_string_lossy().into_owned())
}

// --- Conditional helpers ---

fn exists(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("exists", args, 1, 1)?;
    Ok(Value::Bool(resolve_target(&string_arg("exists", args, 0)?, rt).exists()))
}

fn missing(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("missing", args, 1, 1)?;
    Ok(Value::Bool(!resolve_target(&string_arg("missing", args, 0)?, rt).exists()))
}

fn changed(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("changed", args, 1, 1)?;
    let target = resolve_target(&string_arg("changed", args, 0)?, rt);
    let changed = rt
        .session
        .cache_mut()
        .has_changed(&target)
        .map_err(|e| EvalError::helper("changed", e.to_string()))?;
    Ok(Value::Bool(changed))
}

fn unchanged(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("unchanged", args, 1, 1)?;
    let target = resolve_target(&string_arg("unchanged", args, 0)?, rt);
    let changed = rt
        .session
        .cache_mut()
        .has_changed(&target)
        .map_err(|e| EvalError::helper("unchanged", e.to_string()))?;
    Ok(Value::Bool(!changed))
}

fn found(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("found", args, 2, 2)?;
    let target = resolve_target(&string_arg("found", args, 0)?, rt);
    let pattern = string_arg("found", args, 1)?;
    let regex = Regex::new(&pattern).map_err(|e| EvalError::helper("found", e.to_string()))?;
    if !target.exists() {
        return Ok(Value::Bool(false));
    }
    let content = fs::read_to_string(&target).map_err(|e| {
        EvalError::helper("found", format!("could not read '{}': {}", target.display(), e))
    })?;
    Ok(Value::Bool(regex.is_match(&content)))
}

fn to_file(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("toFile", args, 1, 1)?;
    Ok(path_value(&resolve_path(&string_arg("toFile", args, 0)?, rt)))
}

fn current_file(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("currentFile", args, 0, 0)?;
    Ok(path_value(&rt.file.path))
}

fn show_input(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("showInput", args, 1, 2)?;
    let prompt = string_arg("showInput", args, 0)?;
    let theme = ColorfulTheme::default();
    let mut input = Input::<String>::with_theme(&theme).with_prompt(prompt);
    if args.len() == 2 {
        input = input.default(string_arg("showInput", args, 1)?);
    }
    input
        .interact_text()
        .map(Value::Str)
        .map_err(|e| EvalError::helper("showInput", e.to_string()))
}

fn show_options(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("showOptions", args, 2, 2)?;
    let prompt = string_arg("showOptions", args, 0)?;
    let options = list_of_strings("showOptions", args, 1)?;
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&options)
        .default(0)
        .interact()
        .map_err(|e| EvalError::helper("showOptions", e.to_string()))?;
    i64::try_from(selection + 1)
        .map(Value::Int)
        .map_err(|e| EvalError::helper("showOptions", e.to_string()))
}

// --- Rule helpers ---

/// Requests a halt of the current file, with an optional completion code.
fn halt(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("halt", args, 0, 1)?;
    let code = match args.first() {
        None => 0,
        Some(Value::Int(code)) => *code,
        Some(other) => {
            return Err(EvalError::helper(
                "halt",
                format!("the exit code must be an integer, found a {}", other.type_name()),
            ));
        }
    };
    log::info!("Halt requested for '{}' with code {}", rt.file.path.display(), code);
    rt.session.halt(&rt.file.path, code);
    Ok(Value::Bool(true))
}

fn get_original_file(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("getOriginalFile", args, 0, 0)?;
    Ok(Value::Str(rt.file.name()))
}

fn get_original_reference(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("getOriginalReference", args, 0, 0)?;
    Ok(path_value(&rt.file.path))
}

fn trim_spaces(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("trimSpaces", args, 1, 1)?;
    Ok(Value::Str(string_arg("trimSpaces", args, 0)?.trim().to_string()))
}

fn get_basename(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("getBasename", args, 1, 1)?;
    let name = string_arg("getBasename", args, 0)?;
    let stem = Path::new(&name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Value::Str(stem))
}

fn get_filetype(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("getFiletype", args, 1, 1)?;
    let name = string_arg("getFiletype", args, 0)?;
    let extension = Path::new(&name)
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Value::Str(extension))
}

fn replicate_pattern(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("replicatePattern", args, 2, 2)?;
    let pattern = string_arg("replicatePattern", args, 0)?;
    let values = list_of_strings("replicatePattern", args, 1)?;
    Ok(Value::List(
        values
            .iter()
            .map(|v| Value::Str(pattern.replace("%s", v)))
            .collect(),
    ))
}

fn throw_error(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("throwError", args, 1, 1)?;
    Err(EvalError::Raised(string_arg("throwError", args, 0)?))
}

fn get_session(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("getSession", args, 0, 0)?;
    Ok(Value::Map(rt.session.snapshot()))
}

fn put_session(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("putSession", args, 2, 2)?;
    let key = string_arg("putSession", args, 0)?;
    let value = args.get(1).cloned().unwrap_or_default();
    rt.session.put(key, value);
    Ok(Value::Null)
}

fn flatten_to_strings(args: &[Value]) -> Vec<String> {
    args.iter()
        .cloned()
        .flat_map(Value::flatten)
        .map(|v| v.to_string())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn build_string(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    Ok(Value::Str(flatten_to_strings(args).join(" ")))
}

fn get_command(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    let arguments = flatten_to_strings(args);
    if arguments.is_empty() {
        return Err(EvalError::helper("getCommand", "a command needs at least a program name"));
    }
    Ok(Value::Command(CommandLine::new(arguments)))
}

fn get_command_with_working_directory(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    let function = "getCommandWithWorkingDirectory";
    let directory = resolve_path(&string_arg(function, args, 0)?, rt);
    let arguments = flatten_to_strings(args.get(1..).unwrap_or_default());
    if arguments.is_empty() {
        return Err(EvalError::helper(function, "a command needs at least a program name"));
    }
    Ok(Value::Command(
        CommandLine::new(arguments).with_working_directory(directory),
    ))
}

fn is_verbose_mode(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("isVerboseMode", args, 0, 0)?;
    Ok(Value::Bool(rt.options.verbose))
}

fn is_dry_run_mode(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("isDryRunMode", args, 0, 0)?;
    Ok(Value::Bool(rt.options.is_dry_run()))
}

fn show_message(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("showMessage", args, 2, 2)?;
    let title = string_arg("showMessage", args, 0)?;
    let text = string_arg("showMessage", args, 1)?;
    println!("{} {}", format!("[{}]", title).bold().cyan(), text);
    Ok(Value::Null)
}

fn is_on_path(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isOnPath", args, 1, 1)?;
    let name = string_arg("isOnPath", args, 0)?;
    Ok(Value::Bool(is_executable_in_path(&name)))
}

fn is_executable_in_path(executable_name: &str) -> bool {
    let candidates: Vec<String> = if cfg!(target_os = "windows") {
        ["", ".exe", ".cmd", ".bat"]
            .iter()
            .map(|ext| format!("{}{}", executable_name, ext))
            .collect()
    } else {
        vec![executable_name.to_string()]
    };
    if let Ok(path_var) = env::var("PATH") {
        for path in env::split_paths(&path_var) {
            if candidates.iter().any(|c| path.join(c).is_file()) {
                return true;
            }
        }
    }
    false
}

/// Runs a command right away, even in dry-run mode, returning `[code, output]`.
fn unsafely_execute_system_command(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    let function = "unsafelyExecuteSystemCommand";
    arity(function, args, 1, 1)?;
    let command = match args.first() {
        Some(Value::Command(c)) => c.clone(),
        Some(Value::Str(line)) => CommandLine::new(
            shlex::split(line)
                .ok_or_else(|| EvalError::helper(function, format!("cannot parse '{}'", line)))?,
        ),
        Some(other) => {
            return Err(EvalError::helper(
                function,
                format!("expected a command or a string, found a {}", other.type_name()),
            ));
        }
        None => return Err(EvalError::helper(function, "missing argument 1")),
    };
    let (code, output) =
        executor::execute_and_capture_output(&command, &rt.options.working_directory)
            .map_err(|e| EvalError::helper(function, e.to_string()))?;
    Ok(Value::List(vec![Value::Int(code), Value::Str(output)]))
}

fn list_files(
    function: &str,
    args: &[Value],
    rt: &Runtime<'_>,
    matcher: impl Fn(&str) -> bool,
) -> HelperResult {
    arity(function, args, 3, 3)?;
    let directory = resolve_path(&string_arg(function, args, 0)?, rt);
    let recursive = bool_arg(function, args, 2)?;
    if !directory.is_dir() {
        return Err(EvalError::helper(
            function,
            format!("'{}' is not a directory", directory.display()),
        ));
    }

    let walker = WalkDir::new(&directory).min_depth(1).sort_by_file_name();
    let walker = if recursive { walker } else { walker.max_depth(1) };
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| EvalError::helper(function, e.to_string()))?;
        if entry.file_type().is_file() && matcher(&entry.file_name().to_string_lossy()) {
            files.push(path_value(entry.path()));
        }
    }
    Ok(Value::List(files))
}

fn list_files_by_extensions(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    let extensions = list_of_strings("listFilesByExtensions", args, 1)?;
    list_files("listFilesByExtensions", args, rt, |name| {
        Path::new(name)
            .extension()
            .map(|ext| extensions.iter().any(|e| e.as_str() == ext.to_string_lossy()))
            .unwrap_or(false)
    })
}

fn list_files_by_patterns(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    let patterns = list_of_strings("listFilesByPatterns", args, 1)?
        .iter()
        .map(|p| wildcard_to_regex(p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EvalError::helper("listFilesByPatterns", e.to_string()))?;
    list_files("listFilesByPatterns", args, rt, |name| {
        patterns.iter().any(|re| re.is_match(name))
    })
}

/// Translates a `*`/`?` wildcard into an anchored regex.
fn wildcard_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source)
}

fn write_to_file(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("writeToFile", args, 3, 3)?;
    let target = resolve_path(&string_arg("writeToFile", args, 0)?, rt);
    let text = match args.get(1) {
        Some(Value::List(lines)) => lines
            .iter()
            .map(|l| format!("{}\n", l))
            .collect::<String>(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let append = bool_arg("writeToFile", args, 2)?;
    let written = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&target)
        .and_then(|mut f| f.write_all(text.as_bytes()));
    if let Err(e) = &written {
        log::warn!("writeToFile could not write '{}': {}", target.display(), e);
    }
    Ok(Value::Bool(written.is_ok()))
}

fn read_from_file(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("readFromFile", args, 1, 1)?;
    let target = resolve_path(&string_arg("readFromFile", args, 0)?, rt);
    match fs::read_to_string(&target) {
        Ok(content) => Ok(Value::List(content.lines().map(Value::from).collect())),
        Err(e) => {
            log::warn!("readFromFile could not read '{}': {}", target.display(), e);
            Ok(Value::List(Vec::new()))
        }
    }
}

fn is_subdirectory(args: &[Value], rt: &mut Runtime<'_>) -> HelperResult {
    arity("isSubdirectory", args, 2, 2)?;
    let child = resolve_path(&string_arg("isSubdirectory", args, 0)?, rt);
    let parent = resolve_path(&string_arg("isSubdirectory", args, 1)?, rt);
    for dir in [&child, &parent] {
        if !dir.is_dir() {
            return Err(EvalError::helper(
                "isSubdirectory",
                format!("'{}' is not a directory", dir.display()),
            ));
        }
    }
    let canonical = |p: &Path| {
        dunce::canonicalize(p).map_err(|e| EvalError::helper("isSubdirectory", e.to_string()))
    };
    Ok(Value::Bool(canonical(&child)?.starts_with(canonical(&parent)?)))
}

// --- Value predicates ---

fn is_empty(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isEmpty", args, 1, 3)?;
    let empty = args.first().map(Value::is_empty).unwrap_or(true);
    choose("isEmpty", empty, args.get(1..).unwrap_or_default())
}

fn is_not_empty(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isNotEmpty", args, 1, 3)?;
    let empty = args.first().map(Value::is_empty).unwrap_or(true);
    choose("isNotEmpty", !empty, args.get(1..).unwrap_or_default())
}

/// Truthiness of directive parameters, which arrive as booleans or as
/// `yes`/`no`-style strings.
fn truthiness(function: &str, value: Option<&Value>) -> Result<bool, EvalError> {
    match value {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Int(i)) => Ok(*i != 0),
        Some(Value::Str(s)) => match s.trim().to_lowercase().as_str() {
            "yes" | "true" | "on" | "1" => Ok(true),
            "no" | "false" | "off" | "0" => Ok(false),
            _ => Err(EvalError::helper(
                function,
                format!("'{}' is not a valid boolean value", s),
            )),
        },
        Some(other) => Err(EvalError::helper(
            function,
            format!("cannot interpret a {} as a boolean", other.type_name()),
        )),
        None => Err(EvalError::helper(function, "missing argument 1")),
    }
}

fn is_true(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isTrue", args, 1, 3)?;
    let condition = truthiness("isTrue", args.first())?;
    choose("isTrue", condition, args.get(1..).unwrap_or_default())
}

fn is_false(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isFalse", args, 1, 3)?;
    let condition = !truthiness("isFalse", args.first())?;
    choose("isFalse", condition, args.get(1..).unwrap_or_default())
}

fn is_string(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isString", args, 1, 1)?;
    Ok(Value::Bool(matches!(args.first(), Some(Value::Str(_)))))
}

fn is_list(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isList", args, 1, 1)?;
    Ok(Value::Bool(matches!(args.first(), Some(Value::List(_)))))
}

fn is_map(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isMap", args, 1, 1)?;
    Ok(Value::Bool(matches!(args.first(), Some(Value::Map(_)))))
}

fn is_boolean(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isBoolean", args, 1, 1)?;
    Ok(Value::Bool(matches!(args.first(), Some(Value::Bool(_)))))
}

fn contains_key(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("containsKey", args, 2, 2)?;
    let key = string_arg("containsKey", args, 1)?;
    match args.first() {
        Some(Value::Map(map)) => Ok(Value::Bool(map.contains_key(&key))),
        Some(Value::Null) => Ok(Value::Bool(false)),
        Some(other) => Err(EvalError::helper(
            "containsKey",
            format!("expected a map, found a {}", other.type_name()),
        )),
        None => Err(EvalError::helper("containsKey", "missing argument 1")),
    }
}

fn size(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("size", args, 1, 1)?;
    let len = match args.first() {
        Some(Value::Str(s)) => s.chars().count(),
        Some(Value::List(l)) => l.len(),
        Some(Value::Map(m)) => m.len(),
        Some(Value::Null) => 0,
        Some(other) => {
            return Err(EvalError::helper(
                "size",
                format!("a {} has no size", other.type_name()),
            ));
        }
        None => 0,
    };
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|e| EvalError::helper("size", e.to_string()))
}

// --- Platform predicates ---

fn is_windows(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isWindows", args, 0, 2)?;
    choose("isWindows", cfg!(target_os = "windows"), args)
}

fn is_linux(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isLinux", args, 0, 2)?;
    choose("isLinux", cfg!(target_os = "linux"), args)
}

fn is_mac(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isMac", args, 0, 2)?;
    choose("isMac", cfg!(target_os = "macos"), args)
}

fn is_unix(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isUnix", args, 0, 2)?;
    choose("isUnix", cfg!(unix), args)
}

fn is_cygwin(args: &[Value], _rt: &mut Runtime<'_>) -> HelperResult {
    arity("isCygwin", args, 0, 2)?;
    let cygwin = env::var("OSTYPE")
        .map(|t| t.to_lowercase().contains("cygwin"))
        .unwrap_or(false);
    choose("isCygwin", cygwin, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ChangeCache;
    use crate::core::session::Session;
    use crate::models::{ExecutionOptions, FileType, ProjectFile};
    use tempfile::tempdir;

    struct Fixture {
        session: Session,
        options: ExecutionOptions,
        file: ProjectFile,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let tex = dir.path().join("doc.tex");
        fs::write(&tex, "\\documentclass{article}\n% arara: pdflatex\n").unwrap();
        let options = ExecutionOptions {
            working_directory: dir.path().to_path_buf(),
            ..ExecutionOptions::default()
        };
        Fixture {
            session: Session::new(ChangeCache::in_memory()),
            options,
            file: ProjectFile::new(tex, FileType::defaults().remove(0)),
            _dir: dir,
        }
    }

    fn call_with(fx: &mut Fixture, name: &str, args: Vec<Value>) -> HelperResult {
        let mut runtime = Runtime::new(&mut fx.session, &fx.options, &fx.file);
        call(name, args, &mut runtime)
    }

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = helper_names().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn extension_arguments_target_siblings_of_the_current_file() {
        let mut fx = fixture();
        assert_eq!(call_with(&mut fx, "exists", vec!["tex".into()]).unwrap(), Value::Bool(true));
        assert_eq!(call_with(&mut fx, "missing", vec!["pdf".into()]).unwrap(), Value::Bool(true));
        assert_eq!(
            call_with(&mut fx, "exists", vec!["doc.tex".into()]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn changed_then_unchanged() {
        let mut fx = fixture();
        assert_eq!(call_with(&mut fx, "changed", vec!["tex".into()]).unwrap(), Value::Bool(true));
        assert_eq!(call_with(&mut fx, "unchanged", vec!["tex".into()]).unwrap(), Value::Bool(true));
        assert_eq!(call_with(&mut fx, "changed", vec!["tex".into()]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn found_searches_file_contents() {
        let mut fx = fixture();
        assert_eq!(
            call_with(&mut fx, "found", vec!["tex".into(), r"\\documentclass".into()]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call_with(&mut fx, "found", vec!["log".into(), "Rerun".into()]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn halt_records_the_code_for_the_current_file() {
        let mut fx = fixture();
        assert_eq!(call_with(&mut fx, "halt", vec![Value::Int(3)]).unwrap(), Value::Bool(true));
        assert_eq!(fx.session.halt_code(&fx.file.path), Some(3));
        assert!(call_with(&mut fx, "halt", vec!["x".into()]).is_err());
    }

    #[test]
    fn commands_are_flattened_and_blanks_dropped() {
        let mut fx = fixture();
        let result = call_with(
            &mut fx,
            "getCommand",
            vec![
                "pdflatex".into(),
                Value::List(vec!["".into(), "--shell-escape".into()]),
                "doc.tex".into(),
            ],
        )
        .unwrap();
        assert_eq!(
            result,
            Value::Command(CommandLine::new(vec![
                "pdflatex".into(),
                "--shell-escape".into(),
                "doc.tex".into()
            ]))
        );
        assert!(call_with(&mut fx, "getCommand", vec!["".into()]).is_err());
    }

    #[test]
    fn predicate_forms() {
        let mut fx = fixture();
        assert_eq!(call_with(&mut fx, "isTrue", vec!["yes".into()]).unwrap(), Value::Bool(true));
        assert_eq!(
            call_with(&mut fx, "isTrue", vec!["no".into(), "-a".into()]).unwrap(),
            Value::from("")
        );
        assert_eq!(
            call_with(&mut fx, "isFalse", vec![false.into(), "-a".into(), "-b".into()]).unwrap(),
            Value::from("-a")
        );
        assert!(call_with(&mut fx, "isTrue", vec!["maybe".into()]).is_err());
        assert_eq!(
            call_with(&mut fx, "isEmpty", vec!["".into(), "x".into(), "y".into()]).unwrap(),
            Value::from("x")
        );
        assert_eq!(
            call_with(&mut fx, "isNotEmpty", vec![Value::List(vec![])]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn string_helpers() {
        let mut fx = fixture();
        assert_eq!(
            call_with(&mut fx, "getBasename", vec!["dir/paper.tex".into()]).unwrap(),
            Value::from("paper")
        );
        assert_eq!(
            call_with(&mut fx, "getFiletype", vec!["paper.tex".into()]).unwrap(),
            Value::from("tex")
        );
        assert_eq!(
            call_with(&mut fx, "trimSpaces", vec!["  a b  ".into()]).unwrap(),
            Value::from("a b")
        );
        assert_eq!(
            call_with(
                &mut fx,
                "replicatePattern",
                vec!["-I%s".into(), Value::List(vec!["a".into(), "b".into()])]
            )
            .unwrap(),
            Value::List(vec!["-Ia".into(), "-Ib".into()])
        );
        assert_eq!(
            call_with(&mut fx, "buildString", vec!["a".into(), "".into(), "b".into()]).unwrap(),
            Value::from("a b")
        );
        assert_eq!(
            call_with(&mut fx, "getOriginalFile", vec![]).unwrap(),
            Value::from("doc.tex")
        );
    }

    #[test]
    fn throw_error_raises() {
        let mut fx = fixture();
        assert!(matches!(
            call_with(&mut fx, "throwError", vec!["boom".into()]),
            Err(EvalError::Raised(m)) if m == "boom"
        ));
    }

    #[test]
    fn session_round_trip() {
        let mut fx = fixture();
        call_with(&mut fx, "putSession", vec!["rule:pass".into(), Value::Int(2)]).unwrap();
        let Value::Map(view) = call_with(&mut fx, "getSession", vec![]).unwrap() else {
            panic!("expected a map");
        };
        assert_eq!(view.get("rule:pass"), Some(&Value::Int(2)));
    }

    #[test]
    fn file_listing_and_io() {
        let mut fx = fixture();
        let dir = fx.options.working_directory.clone();
        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("sub").join("chapter.tex"), "x").unwrap();
        fs::write(dir.join("notes.md"), "x").unwrap();

        let flat = call_with(
            &mut fx,
            "listFilesByExtensions",
            vec![".".into(), Value::List(vec!["tex".into()]), false.into()],
        )
        .unwrap();
        assert_eq!(flat, Value::List(vec![path_value(&dir.join("doc.tex"))]));

        let deep = call_with(
            &mut fx,
            "listFilesByPatterns",
            vec![".".into(), Value::List(vec!["ch*.tex".into()]), true.into()],
        )
        .unwrap();
        assert_eq!(deep, Value::List(vec![path_value(&dir.join("sub").join("chapter.tex"))]));

        assert_eq!(
            call_with(
                &mut fx,
                "writeToFile",
                vec!["out.txt".into(), Value::List(vec!["one".into(), "two".into()]), false.into()]
            )
            .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call_with(&mut fx, "readFromFile", vec!["out.txt".into()]).unwrap(),
            Value::List(vec!["one".into(), "two".into()])
        );
        assert_eq!(
            call_with(&mut fx, "isSubdirectory", vec!["sub".into(), ".".into()]).unwrap(),
            Value::Bool(true)
        );
    }
}
