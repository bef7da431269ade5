//! Two-tier store of compiled units.
//!
//! Units live in an in-process map keyed by the SHA-256 of their query and are
//! mirrored to `<root>/<hash>.squnit`. A later process with the same root only
//! loads the artifact; it never generates code for a query it finds there.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    codegen::Generated,
    unit::{CompiledUnit, UnitRef},
};

/// File extension of unit artifacts.
pub const UNIT_EXTENSION: &str = "squnit";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt unit {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("generated unit could not be loaded: {0}")]
    Load(String),
}

/// Counters describing cache activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: usize,
    pub disk_hits: usize,
    pub generated: usize,
    pub write_failures: usize,
    pub entries: usize,
}

/// Cache of compiled units.
pub struct UnitCache {
    root: Option<PathBuf>,
    units: DashMap<String, UnitRef>,
    memory_hits: AtomicUsize,
    disk_hits: AtomicUsize,
    generated: AtomicUsize,
    write_failures: AtomicUsize,
    temp_counter: AtomicUsize,
}

impl UnitCache {
    /// Cache mirrored under `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_root(Some(root.into()))
    }

    /// Cache without a durable tier.
    pub fn in_memory() -> Self {
        Self::with_root(None)
    }

    fn with_root(root: Option<PathBuf>) -> Self {
        UnitCache {
            root,
            units: DashMap::new(),
            memory_hits: AtomicUsize::new(0),
            disk_hits: AtomicUsize::new(0),
            generated: AtomicUsize::new(0),
            write_failures: AtomicUsize::new(0),
            temp_counter: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Cache key of a query: lowercase hex SHA-256.
    pub fn key(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Location of the artifact for `hash`, if the cache has a durable tier.
    pub fn artifact_path(&self, hash: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(format!("{hash}.{UNIT_EXTENSION}")))
    }

    /// Return the unit for `query`, loading or generating it on a miss.
    ///
    /// `generate` runs only when neither tier holds a unit for this exact
    /// query. Its error is returned untouched and nothing is stored. Units
    /// nested deeper than `max_form_depth` are rejected when loaded.
    pub fn get_or_generate<F, E>(
        &self,
        query: &str,
        max_form_depth: usize,
        generate: F,
    ) -> Result<UnitRef, E>
    where
        F: FnOnce() -> Result<Generated, E>,
        E: From<CacheError>,
    {
        let hash = Self::key(query);
        let mut foreign = false;

        if let Some(unit) = self.units.get(&hash) {
            if unit.query() == query {
                self.memory_hits.fetch_add(1, Ordering::Relaxed);
                debug!(hash = %hash, "unit found in memory");
                return Ok(Arc::clone(unit.value()));
            }
            warn!(hash = %hash, "hash collision in memory, unit belongs to another query");
            foreign = true;
        }

        if !foreign && let Some(path) = self.artifact_path(&hash) {
            match read_artifact(&path, &hash, max_form_depth) {
                Ok(Some(unit)) if unit.query() == query => {
                    self.disk_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(hash = %hash, path = %path.display(), "unit loaded from disk");
                    let unit = Arc::new(unit);
                    self.units.insert(hash, Arc::clone(&unit));
                    return Ok(unit);
                }
                Ok(Some(_)) => {
                    warn!(hash = %hash, path = %path.display(), "hash collision on disk, artifact belongs to another query");
                    foreign = true;
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "discarding unusable artifact"),
            }
        }

        let generated = generate()?;
        self.generated.fetch_add(1, Ordering::Relaxed);
        debug!(hash = %hash, "unit generated");

        let source = generated.to_unit_source(&hash, query);
        let unit = Arc::new(
            CompiledUnit::load_with_depth(source, max_form_depth)
                .map_err(|e| CacheError::Load(e.to_string()))?,
        );

        if foreign {
            // keep the other query's entry and artifact intact
            return Ok(unit);
        }
        if let Some(path) = self.artifact_path(&hash)
            && let Err(err) = self.write_artifact(&path, unit.source())
        {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %err, "unit not persisted, continuing in memory");
        }
        self.units.insert(hash, Arc::clone(&unit));
        Ok(unit)
    }

    /// Write through a temporary file in the same directory, then rename, so
    /// readers never observe a partial unit.
    fn write_artifact(&self, path: &Path, source: &str) -> Result<(), CacheError> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|source| CacheError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = dir.join(format!(".{file_name}.{}.{n}.tmp", std::process::id()));

        let io_err = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Err(err) = fs::write(&temp, source).and_then(|_| fs::rename(&temp, path)) {
            let _ = fs::remove_file(&temp);
            return Err(io_err(err));
        }
        Ok(())
    }

    /// Drop every in-memory unit and delete the artifacts under the root,
    /// along with temporary files an interrupted write left behind.
    /// Returns the number of artifacts removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        self.units.clear();
        let Some(root) = &self.root else {
            return Ok(0);
        };
        let io_err = |source| CacheError::Io {
            path: root.clone(),
            source,
        };
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(io_err(err)),
        };

        let mut removed = 0;
        let mut stale = 0;
        for entry in entries {
            let path = entry.map_err(io_err)?.path();
            let is_unit = path.extension().is_some_and(|ext| ext == UNIT_EXTENSION);
            let is_temp = !is_unit && is_temp_artifact(&path);
            if !is_unit && !is_temp {
                continue;
            }
            fs::remove_file(&path).map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
            if is_unit {
                removed += 1;
            } else {
                stale += 1;
            }
        }
        debug!(root = %root.display(), removed, stale, "unit cache cleared");
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            generated: self.generated.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            entries: self.units.len(),
        }
    }
}

/// Matches the `.{hash}.squnit.{pid}.{n}.tmp` names used by `write_artifact`.
fn is_temp_artifact(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            name.starts_with('.')
                && name.ends_with(".tmp")
                && name.contains(&format!(".{UNIT_EXTENSION}."))
        })
}

/// `Ok(None)` when no artifact exists.
fn read_artifact(
    path: &Path,
    hash: &str,
    max_form_depth: usize,
) -> Result<Option<CompiledUnit>, CacheError> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let corrupt = |reason: String| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    let unit =
        CompiledUnit::load_with_depth(source, max_form_depth).map_err(|e| corrupt(e.to_string()))?;
    if unit.hash() != hash {
        return Err(corrupt(format!("header hash {} does not match", unit.hash())));
    }
    Ok(Some(unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codegen::CodeGen, parser::parse, unit::MAX_FORM_DEPTH};

    fn generate(query: &str) -> Result<Generated, CacheError> {
        let expr = parse(query).map_err(|e| CacheError::Load(e.to_string()))?;
        Ok(CodeGen::generate(&expr))
    }

    #[test]
    fn key_is_sha256_hex() {
        assert_eq!(
            UnitCache::key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn in_memory_cache_generates_once() {
        let cache = UnitCache::in_memory();
        cache.get_or_generate("1 + 1", MAX_FORM_DEPTH, || generate("1 + 1")).unwrap();
        cache.get_or_generate("1 + 1", MAX_FORM_DEPTH, || generate("1 + 1")).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.generated, 1);
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(cache.clear().unwrap(), 0);
    }

    #[test]
    fn temp_names_are_recognised() {
        assert!(is_temp_artifact(Path::new("/c/.abc.squnit.41.0.tmp")));
        assert!(!is_temp_artifact(Path::new("/c/abc.squnit")));
        assert!(!is_temp_artifact(Path::new("/c/.editor.swp.tmp")));
        assert!(!is_temp_artifact(Path::new("/c/abc.squnit.tmp")));
    }

    #[test]
    fn unwritable_root_degrades_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let cache = UnitCache::new(blocker.join("units"));
        let unit = cache.get_or_generate("2", MAX_FORM_DEPTH, || generate("2")).unwrap();
        assert_eq!(unit.query(), "2");
        assert_eq!(cache.stats().write_failures, 1);
        assert_eq!(cache.stats().entries, 1);
    }
}
