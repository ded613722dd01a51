// src/core/session.rs

use crate::core::cache::ChangeCache;
use crate::eval::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Namespace under which command line properties are visible to rules.
const PARAMETER_NAMESPACE: &str = "arg:";

/// Mutable state for one engine invocation.
///
/// Handed down by `&mut` through interpreter, command runner and evaluator.
/// It is touched from the execution thread only.
#[derive(Debug, Default)]
pub struct Session {
    parameters: BTreeMap<String, String>,
    store: BTreeMap<String, Value>,
    halts: HashMap<PathBuf, i64>,
    cache: ChangeCache,
}

impl Session {
    /// A session without properties, backed by `cache`.
    pub fn new(cache: ChangeCache) -> Self {
        Self {
            cache,
            ..Self::default()
        }
    }

    /// Attaches the `-P key=value` properties given on the command line.
    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Everything `getSession()` exposes: stored entries plus the command
    /// line properties under `arg:<key>`.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let mut view = self.store.clone();
        for (key, value) in &self.parameters {
            view.insert(
                format!("{}{}", PARAMETER_NAMESPACE, key),
                Value::Str(value.clone()),
            );
        }
        view
    }

    /// Stores a value for later `getSession()` calls.
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.store.insert(key.into(), value);
    }

    /// A stored value, without the `arg:` properties.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.store.get(key)
    }

    /// Records a halt request for `file`. A later request overwrites the code.
    pub fn halt(&mut self, file: &Path, code: i64) {
        self.halts.insert(file.to_path_buf(), code);
    }

    /// The halt code recorded for `file`, if a rule halted it.
    pub fn halt_code(&self, file: &Path) -> Option<i64> {
        self.halts.get(file).copied()
    }

    /// Whether a rule halted `file`.
    pub fn is_halted(&self, file: &Path) -> bool {
        self.halts.contains_key(file)
    }

    /// The change-detection cache shared by the helpers.
    pub fn cache_mut(&mut self) -> &mut ChangeCache {
        &mut self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_are_namespaced_in_the_snapshot() {
        let mut parameters = BTreeMap::new();
        parameters.insert("engine".to_string(), "xelatex".to_string());
        let mut session = Session::new(ChangeCache::in_memory()).with_parameters(parameters);
        session.put("clean:done", Value::Bool(true));

        let view = session.snapshot();
        assert_eq!(view.get("arg:engine"), Some(&Value::from("xelatex")));
        assert_eq!(view.get("clean:done"), Some(&Value::Bool(true)));
        assert!(!view.contains_key("engine"));
    }

    #[test]
    fn halts_are_scoped_per_file() {
        let mut session = Session::default();
        let a = Path::new("/work/a.tex");
        let b = Path::new("/work/b.tex");
        session.halt(a, 0);
        assert!(session.is_halted(a));
        assert_eq!(session.halt_code(a), Some(0));
        assert!(!session.is_halted(b));
        assert_eq!(session.halt_code(b), None);
    }
}
