//! Lifecycle of the shared analyzer instance.
//!
//! The provider is a two-state machine: Unconfigured (no instance held) and
//! Ready (instance held, configured from the latest store snapshot). Loading
//! the ruleset program and applying the configuration is the expensive step,
//! so invalidation only records that the instance is gone; the cost is paid
//! at the next `get`, not on every preference edit.

use crate::engine::Analyzer;
use crate::ruleset::{RulesetLoadError, RulesetLoader};
use crate::store::{OptionsBridge, StoreError};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Failures acquiring a configured engine. Both abort the whole scan that
/// asked for the engine; neither leaves a partially configured instance.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The option store could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The ruleset program failed to load; fatal for this epoch.
    #[error(transparent)]
    Load(#[from] RulesetLoadError),
}

/// Owns one [`Analyzer`] per configuration epoch.
pub struct EngineProvider {
    loader: Box<dyn RulesetLoader>,
    bridge: OptionsBridge,
    engine: Option<Analyzer>,
    stale: Arc<AtomicBool>,
}

impl EngineProvider {
    /// Create a provider and subscribe it to store changes.
    ///
    /// A change notification cannot take `&mut self` (the instance is
    /// single-owner), so it records a stale mark; the Unconfigured transition
    /// completes at the next [`get`](Self::get). The mark is a SeqCst atomic:
    /// invalidation happens-before the next acquisition, but never affects an
    /// engine reference already checked out by a running scan.
    pub fn new(loader: Box<dyn RulesetLoader>, bridge: OptionsBridge) -> Self {
        let stale = Arc::new(AtomicBool::new(false));
        let mark = Arc::clone(&stale);
        bridge.store().subscribe(Box::new(move |key| {
            debug!("option `{}` changed; engine invalidated", key);
            mark.store(true, Ordering::SeqCst);
        }));
        Self {
            loader,
            bridge,
            engine: None,
            stale,
        }
    }

    /// Whether a configured instance is currently held.
    pub fn is_ready(&self) -> bool {
        self.engine.is_some() && !self.stale.load(Ordering::SeqCst)
    }

    /// Discard the held instance unconditionally.
    pub fn invalidate(&mut self) {
        self.engine = None;
    }

    /// Return the configured engine, constructing it if necessary.
    ///
    /// On failure the provider stays Unconfigured and the next `get` starts
    /// from scratch against the then-current snapshot.
    pub fn get(&mut self) -> Result<&Analyzer, ProviderError> {
        if self.stale.swap(false, Ordering::SeqCst) {
            self.invalidate();
        }
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => self.build()?,
        };
        Ok(self.engine.insert(engine))
    }

    /// Load a fresh ruleset, reset it, and apply the current snapshot.
    ///
    /// A single option whose value fails type conversion is skipped with a
    /// warning; the remaining options still apply.
    fn build(&self) -> Result<Analyzer, ProviderError> {
        let ruleset = self.loader.load()?;
        let mut engine = Analyzer::new(ruleset);
        engine.reset_options();

        let snapshot = self.bridge.current_values()?;
        for (opt, raw) in &snapshot {
            if let Err(err) = engine.set_option(*opt, raw) {
                warn!("skipping option: {}", err);
            }
        }
        debug!(
            "engine configured with {} of {} stored options",
            engine.options().len(),
            snapshot.len()
        );
        Ok(engine)
    }
}
