//! Annotation surface: what the scanner emits for a collaborator to render.
//!
//! Annotations are externally owned markers tied to a file and line. The
//! scanner only issues two instructions per file: clear everything, then add
//! the fresh set. Rendering, storage, and lifetime beyond that are the
//! sink's concern.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Severity of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One positional marker on a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    /// Human-readable message.
    pub message: String,
    /// Severity level.
    pub severity: Severity,
    /// Line number (1-based).
    pub line: usize,
}

impl Annotation {
    pub fn new(message: &str, severity: Severity, line: usize) -> Self {
        Self {
            message: message.to_string(),
            severity,
            line,
        }
    }

    /// Warning-severity annotation, the default for analysis findings.
    pub fn warning(message: &str, line: usize) -> Self {
        Self::new(message, Severity::Warning, line)
    }
}

/// Receives annotation instructions from the scanner.
pub trait AnnotationSink {
    /// Remove every annotation previously attached to `path`.
    fn clear(&mut self, path: &Path);

    /// Attach one annotation to `path`.
    fn add(&mut self, path: &Path, annotation: Annotation);
}

/// Collects annotations in memory. Useful for tests and for embedding the
/// scanner behind an API that wants the whole result at once.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: BTreeMap<PathBuf, Vec<Annotation>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` has received a clear instruction.
    pub fn cleared(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Annotations currently attached to `path`.
    pub fn annotations(&self, path: &Path) -> &[Annotation] {
        self.files.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every touched file, in path order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Total annotation count across all files.
    pub fn total(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

impl AnnotationSink for MemorySink {
    fn clear(&mut self, path: &Path) {
        self.files.insert(path.to_path_buf(), Vec::new());
    }

    fn add(&mut self, path: &Path, annotation: Annotation) {
        self.files.entry(path.to_path_buf()).or_default().push(annotation);
    }
}

/// Prints annotations to stdout, grouped per file.
pub struct ConsoleSink {
    colored: bool,
    current: Option<PathBuf>,
    count: usize,
}

impl ConsoleSink {
    pub fn new(colored: bool) -> Self {
        Self {
            colored,
            current: None,
            count: 0,
        }
    }

    /// Annotations printed so far.
    pub fn count(&self) -> usize {
        self.count
    }

    fn severity_label(&self, severity: Severity) -> String {
        let label = severity.to_string();
        if !self.colored {
            return label;
        }
        match severity {
            Severity::Error => label.red().bold().to_string(),
            Severity::Warning => label.yellow().bold().to_string(),
            Severity::Info => label.blue().to_string(),
        }
    }
}

impl AnnotationSink for ConsoleSink {
    fn clear(&mut self, _path: &Path) {
        // The console holds nothing between scans.
    }

    fn add(&mut self, path: &Path, annotation: Annotation) {
        if self.current.as_deref() != Some(path) {
            if self.current.is_some() {
                println!();
            }
            let header = path.display().to_string();
            if self.colored {
                println!("{}", header.underline());
            } else {
                println!("{}", header);
            }
            self.current = Some(path.to_path_buf());
        }
        println!(
            "  {}: {} {}",
            annotation.line,
            self.severity_label(annotation.severity),
            annotation.message
        );
        self.count += 1;
    }
}
