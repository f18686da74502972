//! Lookout - incremental JavaScript analysis for project workspaces
//!
//! Lookout watches a workspace, decides which files need (re-)analysis after
//! a change, runs each through a configured analysis engine, and reports
//! findings as positional annotations tied to the file.
//!
//! # Architecture
//!
//! ```text
//! change set -> Scanner -> ExclusionFilter
//!                 |
//!                 v
//!          EngineProvider -> Analyzer -> Ruleset
//!                 ^
//!          OptionsBridge <- OptionStore
//! ```
//!
//! The scanner reduces both scan shapes (full tree, change delta) to a flat
//! list of per-file changes and a uniform clear-then-add handler. The
//! provider owns one engine instance per configuration epoch and rebuilds it
//! from the option store when the store reports a change. The ruleset itself
//! is opaque: anything implementing [`Ruleset`] behind a [`RulesetLoader`]
//! can be driven; [`BuiltinRuleset`] ships as the default.

pub mod annotate;
pub mod builtin;
pub mod engine;
pub mod exclude;
pub mod options;
pub mod provider;
pub mod ruleset;
pub mod scanner;
pub mod store;
pub mod watch;
pub mod workspace;

// Re-export main types
pub use annotate::{Annotation, AnnotationSink, ConsoleSink, MemorySink, Severity};
pub use builtin::{BuiltinLoader, BuiltinRuleset};
pub use engine::{AnalysisResult, Analyzer, EngineError, Issue};
pub use exclude::{ExclusionFilter, EXCLUDE_KEY};
pub use options::{InvalidValue, Opt, OptionValue, ValueType};
pub use provider::{EngineProvider, ProviderError};
pub use ruleset::{Ruleset, RulesetFault, RulesetLoadError, RulesetLoader, RulesetOptions};
pub use scanner::{
    is_source_file, CancelToken, ChangeKind, FileChange, ScanError, ScanSummary, Scanner,
};
pub use store::{JsonFileStore, MemoryStore, OptionStore, OptionsBridge, StoreError};
pub use watch::{WatchBatch, WorkspaceWatcher};
pub use workspace::{FsWorkspace, Workspace};
