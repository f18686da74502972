//! Decides which workspace paths are skipped entirely.
//!
//! Patterns are globs read from the option store under
//! [`EXCLUDE_KEY`], separated by newlines or commas. The list is compiled
//! lazily on first query and again after [`ExclusionFilter::refresh`];
//! between those points, exclusion is a pure function of the path and the
//! compiled set.

use crate::store::OptionStore;
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::warn;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Store key holding the exclusion pattern list.
pub const EXCLUDE_KEY: &str = "exclude_path_patterns";

/// Glob-based path exclusion with a hot-reloadable pattern list.
pub struct ExclusionFilter {
    store: Arc<dyn OptionStore>,
    compiled: RwLock<Option<GlobSet>>,
}

impl ExclusionFilter {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Self {
            store,
            compiled: RwLock::new(None),
        }
    }

    /// Drop the compiled set; the next query reloads patterns from the store.
    pub fn refresh(&self) {
        *self.compiled.write().unwrap() = None;
    }

    /// Whether `path` matches any configured exclusion pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if let Some(set) = self.compiled.read().unwrap().as_ref() {
            return set.is_match(path);
        }
        let set = self.compile();
        let matched = set.is_match(path);
        *self.compiled.write().unwrap() = Some(set);
        matched
    }

    /// Build the glob set from the store's current pattern list.
    ///
    /// A malformed pattern is skipped with a warning; an unreachable store
    /// yields an empty set (exclusion is advisory, analysis proceeds).
    fn compile(&self) -> GlobSet {
        let raw = match self.store.get(EXCLUDE_KEY) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                warn!("exclusion patterns unavailable: {}", err);
                String::new()
            }
        };

        let mut builder = GlobSetBuilder::new();
        for pattern in raw
            .split([',', '\n'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(err) => warn!("skipping malformed exclusion pattern `{}`: {}", pattern, err),
            }
        }
        builder.build().unwrap_or_else(|err| {
            warn!("exclusion patterns disabled: {}", err);
            GlobSet::empty()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};

    fn filter_with(patterns: &str) -> (ExclusionFilter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.set(EXCLUDE_KEY, patterns);
        (ExclusionFilter::new(Arc::clone(&store) as _), store)
    }

    #[test]
    fn test_matching_paths_are_excluded() {
        let (filter, _) = filter_with("**/node_modules/**, **/*.min.js");

        assert!(filter.is_excluded(Path::new("app/node_modules/lib/a.js")));
        assert!(filter.is_excluded(Path::new("dist/app.min.js")));
        assert!(!filter.is_excluded(Path::new("src/app.js")));
    }

    #[test]
    fn test_empty_pattern_list_excludes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let filter = ExclusionFilter::new(store as _);
        assert!(!filter.is_excluded(Path::new("src/app.js")));
    }

    #[test]
    fn test_malformed_pattern_is_skipped_individually() {
        let (filter, _) = filter_with("**/vendor/**\na{bad\n**/*.min.js");

        // The malformed middle pattern must not take down its neighbors.
        assert!(filter.is_excluded(Path::new("lib/vendor/x.js")));
        assert!(filter.is_excluded(Path::new("x.min.js")));
        assert!(!filter.is_excluded(Path::new("src/app.js")));
    }

    #[test]
    fn test_refresh_picks_up_new_patterns() {
        let (filter, store) = filter_with("**/old/**");
        assert!(filter.is_excluded(Path::new("app/old/a.js")));
        assert!(!filter.is_excluded(Path::new("app/new/a.js")));

        store.set(EXCLUDE_KEY, "**/new/**");
        // Pattern list is cached until told to refresh.
        assert!(filter.is_excluded(Path::new("app/old/a.js")));

        filter.refresh();
        assert!(!filter.is_excluded(Path::new("app/old/a.js")));
        assert!(filter.is_excluded(Path::new("app/new/a.js")));
    }

    #[test]
    fn test_unreachable_store_excludes_nothing() {
        struct DownStore;
        impl OptionStore for DownStore {
            fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
                Err(StoreError::Unavailable("backend offline".to_string()))
            }
            fn subscribe(&self, _listener: crate::store::ChangeListener) {}
        }

        let filter = ExclusionFilter::new(Arc::new(DownStore));
        assert!(!filter.is_excluded(Path::new("src/app.js")));
    }
}
