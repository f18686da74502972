//! The seam to the loaded ruleset program.
//!
//! The actual analysis logic is an opaque dependency: a loaded program that
//! takes source text, an options object, and a list of predefined globals,
//! and produces a sequence of issues. This module fixes that calling
//! convention as a trait, plus the loader that produces a fresh program
//! instance per configuration epoch.

use crate::engine::Issue;
use crate::options::OptionValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// The options object handed to the ruleset, keyed by option name.
///
/// Only explicitly configured options are present; the ruleset applies its
/// own defaults for everything else.
#[derive(Debug, Clone, Default)]
pub struct RulesetOptions {
    values: BTreeMap<&'static str, OptionValue>,
}

impl RulesetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or replace one option.
    pub fn set(&mut self, name: &'static str, value: OptionValue) {
        self.values.insert(name, value);
    }

    /// Drop every configured option.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Boolean option, falling back to the ruleset default when unset or not
    /// a boolean.
    pub fn bool(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(OptionValue::Bool(v)) => *v,
            _ => default,
        }
    }

    /// Integer option, falling back to the ruleset default.
    pub fn int(&self, name: &str, default: i64) -> i64 {
        match self.values.get(name) {
            Some(OptionValue::Int(v)) => *v,
            _ => default,
        }
    }

    /// String option; `None` when unset.
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Configured options in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

/// The ruleset program threw internally while analyzing one file.
#[derive(Debug, Error)]
#[error("ruleset fault: {message}")]
pub struct RulesetFault {
    pub message: String,
}

impl RulesetFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The ruleset program could not be parsed or evaluated.
#[derive(Debug, Error)]
#[error("failed to load ruleset program: {message}")]
pub struct RulesetLoadError {
    pub message: String,
}

impl RulesetLoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A loaded ruleset program.
///
/// `run` must be deterministic: the same (options, source) pair yields the
/// same issues in the same order. Implementations must not perform I/O.
pub trait Ruleset: Send {
    fn run(
        &self,
        source: &str,
        options: &RulesetOptions,
        predefined: &[String],
    ) -> Result<Vec<Issue>, RulesetFault>;
}

impl<F> Ruleset for F
where
    F: Fn(&str, &RulesetOptions, &[String]) -> Result<Vec<Issue>, RulesetFault> + Send,
{
    fn run(
        &self,
        source: &str,
        options: &RulesetOptions,
        predefined: &[String],
    ) -> Result<Vec<Issue>, RulesetFault> {
        self(source, options, predefined)
    }
}

/// Produces a fresh ruleset program instance.
///
/// Loading is the expensive step of a configuration epoch; the provider
/// calls this once per epoch, not per file.
pub trait RulesetLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn Ruleset>, RulesetLoadError>;
}

impl<F> RulesetLoader for F
where
    F: Fn() -> Result<Box<dyn Ruleset>, RulesetLoadError> + Send + Sync,
{
    fn load(&self) -> Result<Box<dyn Ruleset>, RulesetLoadError> {
        self()
    }
}
