//! The analysis engine: one loaded ruleset program plus its live option
//! configuration.
//!
//! An [`Analyzer`] is shared across every file analyzed within one
//! configuration epoch. It is not thread-confined, but its configuration is
//! mutable state; the provider (see [`crate::provider`]) keeps configuration
//! stable before the instance is used.

use crate::options::Opt;
use crate::ruleset::{Ruleset, RulesetFault, RulesetOptions};
use log::debug;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// A single issue found in the code being checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Line on which the issue occurs (1-based).
    pub line: usize,
    /// Position within the line (0-based).
    pub character: usize,
    /// Textual description of the issue.
    pub reason: String,
    /// Identifier of the violated rule.
    pub id: String,
}

impl Issue {
    pub fn new(line: usize, character: usize, reason: &str, id: &str) -> Self {
        Self {
            line,
            character,
            reason: reason.to_string(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({})",
            self.line, self.character, self.reason, self.id
        )
    }
}

/// The ordered issues for one file, produced fresh on each `analyze` call.
#[derive(Debug, Default)]
pub struct AnalysisResult {
    issues: Vec<Issue>,
}

impl AnalysisResult {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    /// Issues in engine output order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

/// Engine-level failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A raw value failed conversion to the option's declared type.
    #[error("invalid value for option `{option}`: {source}")]
    InvalidOptionValue {
        option: &'static str,
        #[source]
        source: crate::options::InvalidValue,
    },

    /// The ruleset program threw while analyzing one file.
    #[error(transparent)]
    Fault(#[from] RulesetFault),
}

/// One loaded ruleset program with a live option configuration.
pub struct Analyzer {
    ruleset: Box<dyn Ruleset>,
    options: RulesetOptions,
}

impl Analyzer {
    pub fn new(ruleset: Box<dyn Ruleset>) -> Self {
        Self {
            ruleset,
            options: RulesetOptions::new(),
        }
    }

    /// Clear all previously applied options back to ruleset defaults.
    ///
    /// Idempotent.
    pub fn reset_options(&mut self) {
        self.options.clear();
    }

    /// Convert `raw` to the option's declared type and apply it.
    ///
    /// On success the option takes effect for all subsequent `analyze` calls
    /// until the next `reset_options`.
    pub fn set_option(&mut self, opt: Opt, raw: &str) -> Result<(), EngineError> {
        let value = opt
            .value_type()
            .parse(raw)
            .map_err(|source| EngineError::InvalidOptionValue {
                option: opt.name(),
                source,
            })?;
        self.options.set(opt.name(), value);
        Ok(())
    }

    /// The currently applied options.
    pub fn options(&self) -> &RulesetOptions {
        &self.options
    }

    /// Run the ruleset against `source`.
    ///
    /// `path` is diagnostic context only; the engine never touches the file
    /// system. Deterministic: the same (options, source) pair yields the same
    /// ordered issues.
    pub fn analyze(&self, path: &Path, source: &str) -> Result<AnalysisResult, EngineError> {
        let predefined = self.predefined_globals();
        debug!(
            "analyzing {} ({} options, {} predefined globals)",
            path.display(),
            self.options.len(),
            predefined.len()
        );
        let issues = self.ruleset.run(source, &self.options, &predefined)?;
        Ok(AnalysisResult::new(issues))
    }

    /// Split the `predef` option into the predefined-globals list of the
    /// ruleset calling convention.
    fn predefined_globals(&self) -> Vec<String> {
        self.options
            .str(Opt::Predef.name())
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}
