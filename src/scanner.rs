//! Orchestrates full and incremental scans.
//!
//! Both scan shapes reduce to one flat, ordered list of per-file changes and
//! a uniform per-file handler: clear existing annotations, check exclusion,
//! read, analyze, add fresh annotations. A failure scoped to one file never
//! aborts the scan of its siblings; a failure acquiring the shared engine
//! aborts the scan before any annotation instruction is emitted.

use crate::annotate::{Annotation, AnnotationSink};
use crate::engine::Analyzer;
use crate::exclude::ExclusionFilter;
use crate::provider::{EngineProvider, ProviderError};
use crate::workspace::Workspace;
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// What happened to a file since the last scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One entry of a workspace change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Cooperative cancellation, checked at file boundaries.
///
/// Cancelling stops the scan before the next file; annotation changes already
/// emitted stay in place.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Failures that abort a whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The shared engine could not be acquired or configured.
    #[error("scan aborted: {0}")]
    Provider(#[from] ProviderError),

    /// Workspace enumeration failed.
    #[error("workspace enumeration failed: {0}")]
    Workspace(#[from] io::Error),
}

/// Counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Source files visited (excluded files included, non-source files not).
    pub files_visited: usize,
    /// Files actually run through the engine.
    pub files_analyzed: usize,
    /// Files skipped by the exclusion filter.
    pub files_excluded: usize,
    /// Files whose read or analysis failed (treated as zero issues).
    pub files_failed: usize,
    /// Issues reported across all analyzed files.
    pub issue_count: usize,
    /// Whether the scan stopped early on cancellation.
    pub cancelled: bool,
    /// Wall-clock duration of the scan.
    pub duration: Duration,
}

impl ScanSummary {
    pub fn is_clean(&self) -> bool {
        self.issue_count == 0
    }

    /// Fold another scan's counters into this one.
    pub fn merge(&mut self, other: ScanSummary) {
        self.files_visited += other.files_visited;
        self.files_analyzed += other.files_analyzed;
        self.files_excluded += other.files_excluded;
        self.files_failed += other.files_failed;
        self.issue_count += other.issue_count;
        self.cancelled |= other.cancelled;
        self.duration += other.duration;
    }
}

/// Recognized source kinds; nothing else is ever analyzed.
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ext.eq_ignore_ascii_case("js")
                || ext.eq_ignore_ascii_case("mjs")
                || ext.eq_ignore_ascii_case("cjs")
        })
}

/// Drives analysis over workspace change sets.
pub struct Scanner {
    provider: EngineProvider,
    filter: ExclusionFilter,
}

impl Scanner {
    pub fn new(provider: EngineProvider, filter: ExclusionFilter) -> Self {
        Self { provider, filter }
    }

    /// The engine provider, for explicit lifecycle control.
    pub fn provider_mut(&mut self) -> &mut EngineProvider {
        &mut self.provider
    }

    /// The exclusion filter, for explicit refresh.
    pub fn filter(&self) -> &ExclusionFilter {
        &self.filter
    }

    /// Visit every file in the workspace subtree.
    pub fn full_scan(
        &mut self,
        workspace: &dyn Workspace,
        sink: &mut dyn AnnotationSink,
        cancel: &CancelToken,
    ) -> Result<ScanSummary, ScanError> {
        let started = Instant::now();
        let changes: Vec<FileChange> = workspace
            .files()?
            .into_iter()
            .map(|path| FileChange::new(path, ChangeKind::Changed))
            .collect();
        self.run(&changes, workspace, sink, cancel, started)
    }

    /// Visit only the added and changed files of a delta.
    ///
    /// Removed files are skipped; their prior annotations are the external
    /// surface's to clear.
    pub fn incremental_scan(
        &mut self,
        changes: &[FileChange],
        workspace: &dyn Workspace,
        sink: &mut dyn AnnotationSink,
        cancel: &CancelToken,
    ) -> Result<ScanSummary, ScanError> {
        self.run(changes, workspace, sink, cancel, Instant::now())
    }

    fn run(
        &mut self,
        changes: &[FileChange],
        workspace: &dyn Workspace,
        sink: &mut dyn AnnotationSink,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<ScanSummary, ScanError> {
        let mut summary = ScanSummary::default();

        // One engine snapshot for the whole scan, acquired before any
        // annotation instruction. An invalidation arriving mid-scan takes
        // effect at the next scan's acquisition.
        let engine = self.provider.get()?;

        for change in changes {
            if cancel.is_cancelled() {
                debug!("scan cancelled after {} files", summary.files_visited);
                summary.cancelled = true;
                break;
            }
            if change.kind == ChangeKind::Removed {
                continue;
            }
            if !is_source_file(&change.path) {
                continue;
            }
            summary.files_visited += 1;
            scan_file(engine, &self.filter, &change.path, workspace, sink, &mut summary);
        }

        summary.duration = started.elapsed();
        debug!(
            "scan done: {} visited, {} analyzed, {} excluded, {} issues",
            summary.files_visited,
            summary.files_analyzed,
            summary.files_excluded,
            summary.issue_count
        );
        Ok(summary)
    }
}

/// The uniform per-file handler.
fn scan_file(
    engine: &Analyzer,
    filter: &ExclusionFilter,
    path: &Path,
    workspace: &dyn Workspace,
    sink: &mut dyn AnnotationSink,
    summary: &mut ScanSummary,
) {
    // Clear first, unconditionally: stale issues must not outlive a skipped
    // or failed analysis.
    sink.clear(path);

    if filter.is_excluded(path) {
        debug!("excluded: {}", path.display());
        summary.files_excluded += 1;
        return;
    }

    let text = match workspace.read(path) {
        Ok(text) => text,
        Err(err) => {
            warn!("failed to read {}: {}", path.display(), err);
            summary.files_failed += 1;
            return;
        }
    };

    match engine.analyze(path, &text) {
        Ok(result) => {
            summary.files_analyzed += 1;
            summary.issue_count += result.len();
            for issue in result.issues() {
                sink.add(path, Annotation::warning(&issue.reason, issue.line));
            }
        }
        Err(err) => {
            warn!("analysis of {} failed: {}", path.display(), err);
            summary.files_failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::MemorySink;
    use crate::engine::Issue;
    use crate::exclude::EXCLUDE_KEY;
    use crate::ruleset::{Ruleset, RulesetFault, RulesetLoadError, RulesetLoader, RulesetOptions};
    use crate::store::{MemoryStore, OptionStore, OptionsBridge, StoreError};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    /// Workspace backed by an in-memory path-to-content map.
    #[derive(Default)]
    struct MapWorkspace {
        files: Vec<PathBuf>,
        contents: HashMap<PathBuf, String>,
        unreadable: Vec<PathBuf>,
    }

    impl MapWorkspace {
        fn with(entries: &[(&str, &str)]) -> Self {
            let mut ws = Self::default();
            for (path, content) in entries {
                ws.files.push(PathBuf::from(path));
                ws.contents.insert(PathBuf::from(path), content.to_string());
            }
            ws
        }

        fn mark_unreadable(&mut self, path: &str) {
            self.unreadable.push(PathBuf::from(path));
        }
    }

    impl Workspace for MapWorkspace {
        fn files(&self) -> io::Result<Vec<PathBuf>> {
            Ok(self.files.clone())
        }

        fn read(&self, path: &Path) -> io::Result<String> {
            if self.unreadable.iter().any(|p| p == path) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
            }
            self.contents
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
    }

    /// Loader producing a ruleset that counts analyze calls and flags every
    /// line containing "bad".
    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl CountingLoader {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl RulesetLoader for CountingLoader {
        fn load(&self) -> Result<Box<dyn Ruleset>, RulesetLoadError> {
            let calls = Arc::clone(&self.calls);
            let ruleset = move |source: &str,
                                _: &RulesetOptions,
                                _: &[String]|
                  -> Result<Vec<Issue>, RulesetFault> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| line.contains("bad"))
                    .map(|(idx, _)| Issue::new(idx + 1, 0, "flagged line", "bad-line"))
                    .collect())
            };
            Ok(Box::new(ruleset))
        }
    }

    fn scanner_over(store: Arc<MemoryStore>) -> (Scanner, Arc<AtomicUsize>) {
        let (loader, calls) = CountingLoader::new();
        let bridge = OptionsBridge::new(Arc::clone(&store) as Arc<dyn OptionStore>);
        let provider = EngineProvider::new(Box::new(loader), bridge);
        let filter = ExclusionFilter::new(store as Arc<dyn OptionStore>);
        (Scanner::new(provider, filter), calls)
    }

    #[test]
    fn test_full_scan_analyzes_source_files_only() {
        let store = Arc::new(MemoryStore::new());
        let (mut scanner, calls) = scanner_over(store);
        let workspace = MapWorkspace::with(&[
            ("src/a.js", "ok"),
            ("README.md", "bad but not a source file"),
            ("src/b.mjs", "bad line here"),
        ]);
        let mut sink = MemorySink::new();

        let summary = scanner
            .full_scan(&workspace, &mut sink, &CancelToken::new())
            .unwrap();

        assert_eq!(summary.files_visited, 2);
        assert_eq!(summary.files_analyzed, 2);
        assert_eq!(summary.issue_count, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!sink.cleared(Path::new("README.md")));
        assert_eq!(sink.annotations(Path::new("src/b.mjs")).len(), 1);
    }

    #[test]
    fn test_excluded_file_gets_clear_but_no_analyze() {
        let store = Arc::new(MemoryStore::new());
        store.set(EXCLUDE_KEY, "**/vendor/**");
        let (mut scanner, calls) = scanner_over(store);
        let workspace = MapWorkspace::with(&[
            ("vendor/lib.js", "bad"),
            ("src/app.js", "ok"),
        ]);
        let mut sink = MemorySink::new();

        let summary = scanner
            .full_scan(&workspace, &mut sink, &CancelToken::new())
            .unwrap();

        // Exactly one analyze call; both files receive a clear instruction.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.files_excluded, 1);
        assert!(sink.cleared(Path::new("vendor/lib.js")));
        assert!(sink.cleared(Path::new("src/app.js")));
        assert!(sink.annotations(Path::new("vendor/lib.js")).is_empty());
    }

    #[test]
    fn test_clear_replaces_stale_annotations() {
        let store = Arc::new(MemoryStore::new());
        let (mut scanner, _) = scanner_over(store);
        let workspace = MapWorkspace::with(&[("src/a.js", "fixed now")]);
        let mut sink = MemorySink::new();
        sink.add(Path::new("src/a.js"), Annotation::warning("stale", 9));

        scanner
            .full_scan(&workspace, &mut sink, &CancelToken::new())
            .unwrap();

        assert!(sink.annotations(Path::new("src/a.js")).is_empty());
    }

    #[test]
    fn test_one_unreadable_file_does_not_abort_siblings() {
        let store = Arc::new(MemoryStore::new());
        let (mut scanner, calls) = scanner_over(store);
        let mut workspace = MapWorkspace::with(&[
            ("a.js", "bad"),
            ("b.js", "bad"),
            ("c.js", "bad"),
        ]);
        workspace.mark_unreadable("b.js");
        let mut sink = MemorySink::new();

        let summary = scanner
            .full_scan(&workspace, &mut sink, &CancelToken::new())
            .unwrap();

        assert_eq!(summary.files_analyzed, 2);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sink.annotations(Path::new("a.js")).len(), 1);
        assert!(sink.annotations(Path::new("b.js")).is_empty());
        assert_eq!(sink.annotations(Path::new("c.js")).len(), 1);
    }

    #[test]
    fn test_engine_fault_is_zero_issues_for_that_file() {
        struct FaultyLoader;
        impl RulesetLoader for FaultyLoader {
            fn load(&self) -> Result<Box<dyn Ruleset>, RulesetLoadError> {
                let ruleset = |source: &str,
                               _: &RulesetOptions,
                               _: &[String]|
                 -> Result<Vec<Issue>, RulesetFault> {
                    if source.contains("explode") {
                        Err(RulesetFault::new("internal error"))
                    } else {
                        Ok(vec![Issue::new(1, 0, "finding", "rule")])
                    }
                };
                Ok(Box::new(ruleset))
            }
        }

        let store = Arc::new(MemoryStore::new());
        let bridge = OptionsBridge::new(Arc::clone(&store) as Arc<dyn OptionStore>);
        let provider = EngineProvider::new(Box::new(FaultyLoader), bridge);
        let filter = ExclusionFilter::new(store as Arc<dyn OptionStore>);
        let mut scanner = Scanner::new(provider, filter);

        let workspace = MapWorkspace::with(&[("a.js", "explode"), ("b.js", "fine")]);
        let mut sink = MemorySink::new();
        let summary = scanner
            .full_scan(&workspace, &mut sink, &CancelToken::new())
            .unwrap();

        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.files_analyzed, 1);
        assert!(sink.annotations(Path::new("a.js")).is_empty());
        assert_eq!(sink.annotations(Path::new("b.js")).len(), 1);
    }

    #[test]
    fn test_incremental_scan_skips_removed_files() {
        let store = Arc::new(MemoryStore::new());
        let (mut scanner, calls) = scanner_over(store);
        let workspace = MapWorkspace::with(&[("a.js", "bad"), ("b.js", "bad")]);
        let mut sink = MemorySink::new();

        let changes = vec![
            FileChange::new("a.js", ChangeKind::Changed),
            FileChange::new("gone.js", ChangeKind::Removed),
            FileChange::new("b.js", ChangeKind::Added),
        ];
        let summary = scanner
            .incremental_scan(&changes, &workspace, &mut sink, &CancelToken::new())
            .unwrap();

        assert_eq!(summary.files_visited, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Removed files receive no instructions at all.
        assert!(!sink.cleared(Path::new("gone.js")));
    }

    #[test]
    fn test_incremental_scan_leaves_untouched_files_alone() {
        let store = Arc::new(MemoryStore::new());
        let (mut scanner, _) = scanner_over(store);
        let workspace = MapWorkspace::with(&[("a.js", "ok"), ("other.js", "bad")]);
        let mut sink = MemorySink::new();
        sink.add(Path::new("other.js"), Annotation::warning("kept", 1));

        let changes = vec![FileChange::new("a.js", ChangeKind::Changed)];
        scanner
            .incremental_scan(&changes, &workspace, &mut sink, &CancelToken::new())
            .unwrap();

        // No global clear: the annotation on the untouched file survives.
        assert_eq!(sink.annotations(Path::new("other.js")).len(), 1);
    }

    #[test]
    fn test_cancellation_stops_between_files() {
        let store = Arc::new(MemoryStore::new());
        let (mut scanner, calls) = scanner_over(store);
        let workspace = MapWorkspace::with(&[("a.js", "ok"), ("b.js", "ok")]);
        let mut sink = MemorySink::new();

        let cancel = CancelToken::new();
        cancel.cancel();
        let summary = scanner
            .full_scan(&workspace, &mut sink, &cancel)
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.files_visited, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!sink.cleared(Path::new("a.js")));
    }

    #[test]
    fn test_store_unavailable_aborts_with_no_side_effects() {
        struct DownStore;
        impl OptionStore for DownStore {
            fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
                Err(StoreError::Unavailable("backend offline".to_string()))
            }
            fn subscribe(&self, _listener: crate::store::ChangeListener) {}
        }

        let down = Arc::new(DownStore);
        let (loader, calls) = CountingLoader::new();
        let bridge = OptionsBridge::new(Arc::clone(&down) as Arc<dyn OptionStore>);
        let provider = EngineProvider::new(Box::new(loader), bridge);
        let filter = ExclusionFilter::new(down as Arc<dyn OptionStore>);
        let mut scanner = Scanner::new(provider, filter);

        let workspace = MapWorkspace::with(&[("a.js", "bad")]);
        let mut sink = MemorySink::new();
        let result = scanner.full_scan(&workspace, &mut sink, &CancelToken::new());

        assert!(matches!(
            result,
            Err(ScanError::Provider(ProviderError::Store(_)))
        ));
        assert!(!scanner.provider_mut().is_ready());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // Not even a clear instruction was emitted.
        assert!(!sink.cleared(Path::new("a.js")));
        assert_eq!(sink.total(), 0);
    }

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file(Path::new("a.js")));
        assert!(is_source_file(Path::new("a.MJS")));
        assert!(is_source_file(Path::new("dir/a.cjs")));
        assert!(!is_source_file(Path::new("a.json")));
        assert!(!is_source_file(Path::new("js")));
        assert!(!is_source_file(Path::new("a.ts")));
    }
}
