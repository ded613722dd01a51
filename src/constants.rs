// src/constants.rs

/// The keyword that introduces a directive inside a comment line.
pub const DIRECTIVE_KEYWORD: &str = "arara:";

/// The marker that continues the previous directive on a new comment line.
pub const CONTINUATION_MARKER: &str = "-->";

/// Prefix of the rules shipped with the distribution, so they never collide
/// with user rules of the same name.
pub const DISTRIBUTION_RULE_PREFIX: &str = "arara-rule-";

/// Extension of the primary rule format (YAML).
pub const RULE_EXTENSION: &str = "yaml";

/// Extension of the alternate rule dialect (TOML).
pub const RULE_DIALECT_EXTENSION: &str = "toml";

/// The directive parameter holding the file being processed. It is reserved:
/// rules may not declare it and directives may not set it by hand.
pub const REFERENCE_KEY: &str = "reference";

/// The directive parameter that replicates a directive over several files.
pub const FILES_KEY: &str = "files";

/// Name of the variable holding the exit code in `exit` expressions.
pub const EXIT_VALUE_KEY: &str = "value";

/// Names of the configuration files, in lookup order.
pub const CONFIG_FILENAMES: &[&str] = &[
    ".araraconfig.toml",
    "araraconfig.toml",
    ".arararc.toml",
    "arararc.toml",
];

/// Default name of the reference store, relative to the working directory.
pub const REFERENCE_STORE_FILENAME: &str = "arara.reference";

/// Name of the log file written when logging is enabled.
pub const LOG_FILENAME: &str = "arara.log";

/// Directory, next to the executable, holding the built-in rules.
pub const RULES_DIRNAME: &str = "rules";

/// Default maximum number of iterations for `while`/`until` directives.
pub const DEFAULT_MAX_LOOPS: u32 = 10;

/// The comment pattern shared by all TeX-like file types.
pub const TEX_COMMENT_PATTERN: &str = r"^\s*%\s+";

/// File types recognized out of the box, in resolution order.
pub const DEFAULT_FILE_TYPES: &[&str] = &["tex", "dtx", "ltx", "drv", "ins"];
