//! Dependency source resolution with a decompilation fallback.
//!
//! Classes present in the project model are not resolved here. For any other
//! class the ordered search path (jars or class directories) is scanned, the
//! first location holding the compiled class is decompiled, and the sanitized
//! text is pruned to the wanted methods.

use crate::decompiler::{DecompileError, Decompiler};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use unitsmith_core::model::{ProjectModel, normalize_signatures};
use unitsmith_parser::index::reconcile_wanted;
use unitsmith_parser::prune::{PrunedSource, declared_signatures, prune};
use unitsmith_parser::sanitize::sanitize;

/// Sanitized source of a class reconstructed from a compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstructed {
    pub class_name: String,
    /// Search-path location the class came from.
    pub origin: PathBuf,
    /// Full sanitized decompiler output.
    pub source: String,
}

/// Outcome of resolving one dependency class.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The class has a parsed model; use it instead.
    NotApplicable,
    /// Reconstructed and pruned to the wanted methods.
    Found {
        reconstructed: Arc<Reconstructed>,
        pruned: PrunedSource,
    },
    /// No search-path location produced the class.
    NotFound,
    /// Reconstructed, but the text did not parse.
    Unusable(String),
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Resolves dependency classes that have no source model.
pub struct SourceResolver {
    search_path: Vec<PathBuf>,
    decompiler: Option<Arc<dyn Decompiler>>,
    /// Class name → reconstruction, `None` for classes found nowhere.
    cache: Option<RwLock<HashMap<String, Option<Arc<Reconstructed>>>>>,
}

impl SourceResolver {
    pub fn new(
        search_path: Vec<PathBuf>,
        decompiler: Arc<dyn Decompiler>,
        cache_decompiled: bool,
    ) -> Self {
        Self {
            search_path,
            decompiler: Some(decompiler),
            cache: cache_decompiled.then(|| RwLock::new(HashMap::new())),
        }
    }

    /// A resolver that never reconstructs anything.
    pub fn without_fallback() -> Self {
        Self {
            search_path: Vec::new(),
            decompiler: None,
            cache: None,
        }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Resolve `class_name`, pruned down to `wanted` (normalized signatures).
    ///
    /// Call signatures with unknown or narrower argument types are first
    /// matched against the methods the reconstructed class declares.
    pub fn resolve(
        &self,
        model: &dyn ProjectModel,
        class_name: &str,
        wanted: &BTreeSet<String>,
    ) -> Resolution {
        if model.class_unit(class_name).is_some() {
            return Resolution::NotApplicable;
        }
        let Some(reconstructed) = self.reconstruct(class_name) else {
            tracing::debug!(class = class_name, "dependency not found on search path");
            return Resolution::NotFound;
        };
        let reconciled = declared_signatures(&reconstructed.source)
            .map(|declared| reconcile_wanted(&normalize_signatures(wanted), &declared))
            .and_then(|wanted| prune(&reconstructed.source, &wanted));
        match reconciled {
            Ok(pruned) => {
                tracing::debug!(
                    class = class_name,
                    kept = pruned.kept.len(),
                    stubbed = pruned.stubbed,
                    removed = pruned.removed,
                    "pruned reconstructed dependency"
                );
                Resolution::Found {
                    reconstructed,
                    pruned,
                }
            }
            Err(e) => {
                tracing::warn!(class = class_name, error = %e, "reconstructed source is unusable");
                Resolution::Unusable(e.to_string())
            }
        }
    }

    /// Sanitized decompiled source of `class_name`, from the cache if present.
    pub fn reconstruct(&self, class_name: &str) -> Option<Arc<Reconstructed>> {
        if let Some(cache) = &self.cache
            && let Ok(entries) = cache.read()
            && let Some(hit) = entries.get(class_name)
        {
            return hit.clone();
        }

        let found = self.scan(class_name).map(Arc::new);

        if let Some(cache) = &self.cache
            && let Ok(mut entries) = cache.write()
        {
            // Another attempt may have raced us; decompilation is idempotent,
            // so the first stored entry wins.
            return entries
                .entry(class_name.to_string())
                .or_insert(found)
                .clone();
        }
        found
    }

    fn scan(&self, class_name: &str) -> Option<Reconstructed> {
        let decompiler = self.decompiler.as_deref()?;
        for location in &self.search_path {
            match decompile_from(decompiler, location, class_name) {
                Ok(raw) => {
                    let source = sanitize(&raw);
                    if source.trim().is_empty() {
                        continue;
                    }
                    tracing::debug!(
                        class = class_name,
                        origin = %location.display(),
                        "reconstructed dependency from compiled artifact"
                    );
                    return Some(Reconstructed {
                        class_name: class_name.to_string(),
                        origin: location.clone(),
                        source,
                    });
                }
                Err(DecompileError::MissingEntry { .. }) => {}
                Err(e) => {
                    tracing::debug!(
                        class = class_name,
                        location = %location.display(),
                        error = %e,
                        "search-path location failed, trying next"
                    );
                }
            }
        }
        None
    }
}

/// Binary path of a class inside an archive: `a/b/C.class`.
pub fn class_entry_name(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

/// Extract `class_name` from one search-path location and decompile it.
fn decompile_from(
    decompiler: &dyn Decompiler,
    location: &Path,
    class_name: &str,
) -> Result<String, DecompileError> {
    let entry = class_entry_name(class_name);

    if location.is_dir() {
        let class_file = location.join(&entry);
        if !class_file.is_file() {
            return Err(DecompileError::MissingEntry {
                entry,
                location: location.to_path_buf(),
            });
        }
        return decompiler.decompile(&class_file);
    }

    let io_err = |source: std::io::Error| DecompileError::Io {
        path: location.to_path_buf(),
        source,
    };
    let archive_err = |e: zip::result::ZipError| DecompileError::Archive {
        path: location.to_path_buf(),
        message: e.to_string(),
    };

    let file = File::open(location).map_err(io_err)?;
    let mut archive = zip::ZipArchive::new(file).map_err(archive_err)?;
    let mut compiled = match archive.by_name(&entry) {
        Ok(compiled) => compiled,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(DecompileError::MissingEntry {
                entry,
                location: location.to_path_buf(),
            });
        }
        Err(e) => return Err(archive_err(e)),
    };

    let mut scratch = tempfile::Builder::new()
        .prefix("class")
        .suffix(".class")
        .tempfile()
        .map_err(io_err)?;
    std::io::copy(&mut compiled, &mut scratch).map_err(io_err)?;
    scratch.flush().map_err(io_err)?;

    decompiler.decompile(scratch.path())
}
