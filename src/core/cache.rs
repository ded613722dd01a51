// src/core/cache.rs

use flate2::Crc;
use log::{debug, warn};
use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Marker persisted for a file that did not exist when last observed.
const ABSENT_MARKER: &str = "-";

/// Failures of the reference store or of the observed files.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read the reference store '{path}': {source}")]
    ReadStore { path: PathBuf, source: io::Error },
    #[error("Failed to write the reference store '{path}': {source}")]
    WriteStore { path: PathBuf, source: io::Error },
    #[error("Failed to read '{path}' for checksumming: {source}")]
    ReadFile { path: PathBuf, source: io::Error },
}

/// The last observed state of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Present(u32),
    Absent,
}

impl Observation {
    /// Observes `path` now: the CRC-32 of its contents, or `Absent`.
    pub fn of(path: &Path) -> Result<Self, CacheError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Self::Present(checksum(&bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::Absent),
            Err(source) => Err(CacheError::ReadFile {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == ABSENT_MARKER {
            return Some(Self::Absent);
        }
        u32::from_str_radix(raw, 16).ok().map(Self::Present)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(crc) => write!(f, "{:08x}", crc),
            Self::Absent => f.write_str(ABSENT_MARKER),
        }
    }
}

/// CRC-32 of `bytes`.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(bytes);
    crc.sum()
}

/// Answers "has this file changed since it was last observed".
///
/// Every query records the new observation before returning, so two
/// consecutive queries without a mutation in between report `true` then
/// `false`. With a reference store the entries survive across runs; the
/// store is re-read before each query so several handles on the same file
/// stay consistent. Without one the entries live in memory only.
#[derive(Debug, Default)]
pub struct ChangeCache {
    store: Option<PathBuf>,
    entries: BTreeMap<PathBuf, Observation>,
}

impl ChangeCache {
    /// A cache that keeps its entries in memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A cache persisted to `store`, one `path=checksum` line per file.
    pub fn with_store(store: impl Into<PathBuf>) -> Self {
        Self {
            store: Some(store.into()),
            entries: BTreeMap::new(),
        }
    }

    /// Whether `path` changed since the last query, recording the new state.
    pub fn has_changed(&mut self, path: &Path) -> Result<bool, CacheError> {
        let key = normalize(path);
        self.reload()?;

        let current = Observation::of(&key)?;
        let previous = self.entries.insert(key.clone(), current);
        let changed = previous != Some(current);
        debug!(
            "Cache observation for '{}': {} (previously {}), changed={}",
            key.display(),
            current,
            previous.map_or_else(|| "unseen".to_string(), |p| p.to_string()),
            changed
        );

        self.persist()?;
        Ok(changed)
    }

    /// The negation of [`ChangeCache::has_changed`], with the same side effects.
    pub fn is_unchanged(&mut self, path: &Path) -> Result<bool, CacheError> {
        self.has_changed(path).map(|changed| !changed)
    }

    fn reload(&mut self) -> Result<(), CacheError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let content = match fs::read_to_string(store) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(CacheError::ReadStore {
                    path: store.clone(),
                    source,
                });
            }
        };

        self.entries.clear();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            // Paths may contain '=', the checksum never does.
            let parsed = line
                .rsplit_once('=')
                .and_then(|(path, raw)| Observation::parse(raw).map(|obs| (path, obs)));
            match parsed {
                Some((path, observation)) => {
                    self.entries.insert(PathBuf::from(path), observation);
                }
                None => warn!(
                    "Skipping malformed line {} in reference store '{}'",
                    number + 1,
                    store.display()
                ),
            }
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), CacheError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let content: String = self
            .entries
            .iter()
            .map(|(path, observation)| format!("{}={}\n", path.display(), observation))
            .collect();
        fs::write(store, content).map_err(|source| CacheError::WriteStore {
            path: store.clone(),
            source,
        })
    }
}

/// Canonical form of a tracked path. Deleted files cannot be canonicalized,
/// so their parent directory is instead.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => dunce::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn crc32_matches_reference_value() {
        assert_eq!(
            checksum(b"The quick brown fox jumps over the lazy dog"),
            0x414f_a339
        );
    }

    #[test]
    fn second_query_without_mutation_reports_unchanged() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.tex");
        fs::write(&file, "hello").unwrap();

        let mut cache = ChangeCache::in_memory();
        assert!(cache.has_changed(&file).unwrap());
        assert!(!cache.has_changed(&file).unwrap());

        fs::write(&file, "hello, world").unwrap();
        assert!(cache.has_changed(&file).unwrap());
        assert!(cache.is_unchanged(&file).unwrap());
    }

    #[test]
    fn deletion_is_reported_exactly_once() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.aux");
        fs::write(&file, "aux").unwrap();

        let mut cache = ChangeCache::in_memory();
        assert!(cache.has_changed(&file).unwrap());
        fs::remove_file(&file).unwrap();
        assert!(cache.has_changed(&file).unwrap());
        assert!(!cache.has_changed(&file).unwrap());
    }

    #[test]
    fn observations_persist_across_runs() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.tex");
        let store = dir.path().join("arara.reference");
        fs::write(&file, "content").unwrap();

        assert!(ChangeCache::with_store(&store).has_changed(&file).unwrap());
        assert!(!ChangeCache::with_store(&store).has_changed(&file).unwrap());

        let persisted = fs::read_to_string(&store).unwrap();
        let expected = format!("={:08x}\n", checksum(b"content"));
        assert!(persisted.ends_with(&expected), "store was {:?}", persisted);
    }

    #[test]
    fn handles_sharing_a_store_stay_consistent() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.tex");
        let store = dir.path().join("arara.reference");
        fs::write(&file, "one").unwrap();

        let mut first = ChangeCache::with_store(&store);
        let mut second = ChangeCache::with_store(&store);
        assert!(first.has_changed(&file).unwrap());
        assert!(!second.has_changed(&file).unwrap());
    }

    #[test]
    fn absent_files_are_stored_with_the_marker() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("arara.reference");
        let mut cache = ChangeCache::with_store(&store);
        assert!(cache.has_changed(&dir.path().join("missing.pdf")).unwrap());
        assert!(fs::read_to_string(&store).unwrap().trim_end().ends_with("=-"));
    }

    #[test]
    fn malformed_store_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.tex");
        let store = dir.path().join("arara.reference");
        fs::write(&file, "x").unwrap();
        fs::write(&store, "garbage line\n/some/where=zzzz\n").unwrap();

        let mut cache = ChangeCache::with_store(&store);
        assert!(cache.has_changed(&file).unwrap());
        assert!(!cache.has_changed(&file).unwrap());
    }
}
