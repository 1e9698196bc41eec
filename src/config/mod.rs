//! Match configuration: schema, loading pipeline, validation, and the
//! swappable settings snapshot served to the engine.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{LoadResult, load_file};
pub use schema::{DayCycle, MatchConfig, MatchSettings, SpreadMethod};

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::hooks::Settings;

/// Swappable settings snapshot implementing the [`Settings`] seam.
///
/// The engine resolves values lazily on every query, so swapping in a new
/// snapshot takes effect immediately — including for stages already
/// underway.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<MatchSettings>>,
}

impl SharedSettings {
    /// Wraps an initial snapshot.
    #[must_use]
    pub fn new(settings: MatchSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Replaces the snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn swap(&self, settings: MatchSettings) {
        *self.inner.write().expect("settings lock poisoned") = settings;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MatchSettings> {
        self.inner.read().expect("settings lock poisoned")
    }
}

impl Settings for SharedSettings {
    fn stage_length_override(&self, id: &str) -> Option<Duration> {
        self.read().intervals.get(id).copied()
    }

    fn boundary_override(&self, id: &str) -> Option<f64> {
        self.read().boundaries.get(id).copied()
    }

    fn grace_period(&self) -> Option<Duration> {
        self.read().grace_period
    }

    fn final_heal(&self) -> Option<Duration> {
        self.read().final_heal
    }

    fn day_cycle(&self) -> DayCycle {
        self.read().day_cycle
    }

    fn bonus_round(&self) -> bool {
        self.read().bonus_round
    }

    fn spread_method(&self) -> SpreadMethod {
        self.read().spread
    }
}
