//! The stage catalog.
//!
//! A [`StageTable`] is a structurally immutable, ordered list of
//! [`StageDef`]s. Durations and boundary targets are *defaults*: every query
//! re-resolves them through the [`Settings`] collaborator, so two queries of
//! the same stage may legitimately differ if settings changed in between.
//! Nothing here is cached.
//!
//! A stage whose resolved duration is zero is *inactive* and skipped by the
//! `nth_active`/`next_active`/`prev_active` traversal.

use std::time::Duration;

use crate::error::ConfigError;
use crate::hooks::Settings;

/// How long a stage runs before it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageLength {
    /// Fixed duration; zero disables the stage.
    Timed(Duration),
    /// Never auto-completes. Terminal stage only.
    Unbounded,
}

impl StageLength {
    /// Returns the duration for timed stages, `None` for unbounded ones.
    #[must_use]
    pub const fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Timed(d) => Some(d),
            Self::Unbounded => None,
        }
    }
}

/// How the containment boundary reaches a stage's target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryShift {
    /// Snaps to the target at stage entry.
    Snap,
    /// Ramps linearly toward the target over the stage's duration.
    Ramp,
}

/// Side effect dispatched to collaborators when a stage is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEffect {
    /// Remove hostile creatures and stop them respawning.
    PurgeHostiles,
    /// Build the enclosed showdown arena at the stage's boundary size.
    BuildArena,
    /// Re-scatter the surviving groups evenly inside the boundary.
    RescatterGroups,
}

/// One stage of the match.
///
/// Immutable once the table is built. `ordinal` is assigned by
/// [`StageTable::new`] from list position.
#[derive(Debug, Clone)]
pub struct StageDef {
    /// Stable identifier, used for settings lookups and logs.
    pub id: String,
    /// Position in the sequence; 0 is the first stage.
    pub ordinal: usize,
    /// Default length; the settings resolver may override it per id.
    pub length: StageLength,
    /// Default boundary diameter; the settings resolver may override it.
    pub boundary: f64,
    /// Snap or ramp toward the boundary target.
    pub shift: BoundaryShift,
    /// True only for the final, open-ended stage.
    pub terminal: bool,
    /// Effects dispatched on entry.
    pub entry_effects: Vec<StageEffect>,
}

impl StageDef {
    /// A timed stage with the given defaults.
    #[must_use]
    pub fn timed(id: &str, length: Duration, boundary: f64, shift: BoundaryShift) -> Self {
        Self {
            id: id.to_string(),
            ordinal: 0,
            length: StageLength::Timed(length),
            boundary,
            shift,
            terminal: false,
            entry_effects: Vec::new(),
        }
    }

    /// The terminal stage: unbounded, never auto-completes.
    #[must_use]
    pub fn terminal(id: &str, boundary: f64) -> Self {
        Self {
            id: id.to_string(),
            ordinal: 0,
            length: StageLength::Unbounded,
            boundary,
            shift: BoundaryShift::Snap,
            terminal: true,
            entry_effects: Vec::new(),
        }
    }

    /// Attaches entry effects.
    #[must_use]
    pub fn with_effects(mut self, effects: Vec<StageEffect>) -> Self {
        self.entry_effects = effects;
        self
    }
}

/// Immutable ordered catalog of stages.
#[derive(Debug, Clone)]
pub struct StageTable {
    defs: Vec<StageDef>,
}

impl StageTable {
    /// Builds a table from definitions, assigning ordinals from position.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] unless the list is non-empty
    /// and exactly the last stage is terminal.
    pub fn new(mut defs: Vec<StageDef>) -> Result<Self, ConfigError> {
        let invalid = |value: &str, expected: &str| ConfigError::InvalidValue {
            field: "stages".to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        };

        if defs.is_empty() {
            return Err(invalid("[]", "at least one stage"));
        }
        let terminal_count = defs.iter().filter(|d| d.terminal).count();
        if terminal_count != 1 {
            return Err(invalid(
                &format!("{terminal_count} terminal stages"),
                "exactly one terminal stage",
            ));
        }
        if !defs.last().is_some_and(|d| d.terminal) {
            return Err(invalid(
                "terminal stage not last",
                "the terminal stage in last position",
            ));
        }

        for (i, def) in defs.iter_mut().enumerate() {
            def.ordinal = i;
        }
        Ok(Self { defs })
    }

    /// The standard match progression: a long hold inside the full boundary,
    /// two collapse phases separated by a respite, a short final approach,
    /// and the open-ended showdown.
    #[must_use]
    pub fn standard() -> Self {
        let mins = |m: u64| Duration::from_secs(m * 60);
        Self::new(vec![
            StageDef::timed("boundary_hold", mins(60), 1200.0, BoundaryShift::Snap),
            StageDef::timed("first_collapse", mins(15), 25.0, BoundaryShift::Ramp),
            StageDef::timed("respite", mins(5), 25.0, BoundaryShift::Snap)
                .with_effects(vec![StageEffect::PurgeHostiles]),
            StageDef::timed("second_collapse", mins(10), 3.0, BoundaryShift::Ramp),
            StageDef::timed("final_approach", mins(5), 3.0, BoundaryShift::Snap),
            StageDef::terminal("showdown", 20.0)
                .with_effects(vec![StageEffect::BuildArena, StageEffect::RescatterGroups]),
        ])
        .expect("standard table is well-formed")
    }

    /// Number of stages, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the table holds no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Stage at `ordinal`, if any.
    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&StageDef> {
        self.defs.get(ordinal)
    }

    /// Whether a stage with the given id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id(id).is_some()
    }

    /// Stage with the given id, if any.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&StageDef> {
        self.defs.iter().find(|d| d.id == id)
    }

    /// Iterator over stage ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.defs.iter().map(|d| d.id.as_str())
    }

    /// Resolves a stage's length through settings; unbounded stages ignore
    /// overrides.
    #[must_use]
    pub fn resolved_length(&self, def: &StageDef, settings: &dyn Settings) -> StageLength {
        match def.length {
            StageLength::Unbounded => StageLength::Unbounded,
            StageLength::Timed(default) => StageLength::Timed(
                settings.stage_length_override(&def.id).unwrap_or(default),
            ),
        }
    }

    /// Resolves a stage's boundary diameter through settings.
    #[must_use]
    pub fn resolved_boundary(&self, def: &StageDef, settings: &dyn Settings) -> f64 {
        settings.boundary_override(&def.id).unwrap_or(def.boundary)
    }

    /// Whether the stage participates in traversal (non-zero resolved
    /// duration; unbounded counts as active).
    #[must_use]
    pub fn is_active(&self, def: &StageDef, settings: &dyn Settings) -> bool {
        match self.resolved_length(def, settings) {
            StageLength::Unbounded => true,
            StageLength::Timed(d) => !d.is_zero(),
        }
    }

    /// The n-th active stage, skipping inactive ones.
    #[must_use]
    pub fn nth_active(&self, n: usize, settings: &dyn Settings) -> Option<&StageDef> {
        self.defs
            .iter()
            .filter(|d| self.is_active(d, settings))
            .nth(n)
    }

    /// The next active stage after `ordinal`, or `None` at the end.
    #[must_use]
    pub fn next_active(&self, ordinal: usize, settings: &dyn Settings) -> Option<&StageDef> {
        self.defs
            .iter()
            .skip(ordinal + 1)
            .find(|d| self.is_active(d, settings))
    }

    /// The previous active stage before `ordinal`, or `None` at the start.
    #[must_use]
    pub fn prev_active(&self, ordinal: usize, settings: &dyn Settings) -> Option<&StageDef> {
        self.defs
            .iter()
            .take(ordinal)
            .rev()
            .find(|d| self.is_active(d, settings))
    }

    /// The last *timed* active stage, i.e. the one right before the terminal
    /// stage in a normal run. Used to warn that the showdown comes next.
    #[must_use]
    pub fn last_timed_active(&self, settings: &dyn Settings) -> Option<&StageDef> {
        self.defs
            .iter()
            .rev()
            .filter(|d| !d.terminal)
            .find(|d| self.is_active(d, settings))
    }
}
