//! Collaborator seams.
//!
//! The engine core never renders text, moves a boundary, or places a
//! participant itself — it issues intents through these traits. Production
//! embeddings implement them against a real game server; [`sim`] provides
//! in-memory implementations for the console binary and tests.
//!
//! All methods are synchronous and must not block: the driver task calls
//! them inline between ticks.

pub mod sim;

use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::{DayCycle, SpreadMethod};
use crate::error::HookError;
use crate::stage::{StageAnnouncement, StageEffect};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Newtype wrapper for group identifiers.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct GroupId(pub String);

impl GroupId {
    /// Creates a new `GroupId` from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for member identifiers.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct MemberId(pub String);

impl MemberId {
    /// Creates a new `MemberId` from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A group that still has at least one living member, with the members
/// currently reachable (a group can survive with every member disconnected,
/// in which case `online` is empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliveGroup {
    /// The group.
    pub id: GroupId,
    /// Living, reachable members.
    pub online: Vec<MemberId>,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Resolves named match settings.
///
/// Backed by live configuration: values may change between calls, which is
/// why the stage table never caches resolutions.
pub trait Settings: Send + Sync {
    /// Duration override for the stage with the given id, if configured.
    /// A zero override disables the stage.
    fn stage_length_override(&self, id: &str) -> Option<Duration>;

    /// Boundary diameter override for the stage with the given id.
    fn boundary_override(&self, id: &str) -> Option<f64>;

    /// Grace period from match start during which combat is disallowed.
    fn grace_period(&self) -> Option<Duration>;

    /// Delay from match start until every combatant is healed to full.
    fn final_heal(&self) -> Option<Duration>;

    /// Day/night cycle speed.
    fn day_cycle(&self) -> DayCycle;

    /// Whether the post-victory bonus round is enabled.
    fn bonus_round(&self) -> bool;

    /// How initial placement spacing is computed.
    fn spread_method(&self) -> SpreadMethod;
}

// ---------------------------------------------------------------------------
// Playfield
// ---------------------------------------------------------------------------

/// The play area: boundary control, world clock, stage entry effects.
pub trait Playfield: Send + Sync {
    /// Prepares the playing field before the first stage begins.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Playfield`] if the field cannot be prepared;
    /// the start procedure rolls back.
    fn prepare(&self) -> Result<(), HookError>;

    /// Moves the boundary to `diameter`, instantly when `ramp` is `None`,
    /// otherwise linearly over the given duration.
    fn set_boundary(&self, diameter: f64, ramp: Option<Duration>);

    /// Applies a stage entry effect at the stage's boundary size.
    fn apply_effect(&self, effect: StageEffect, diameter: f64);

    /// Advances the in-world clock by the given amount. Called once per tick
    /// with the day-cycle boost; never called with zero.
    fn boost_clock(&self, amount: u32);

    /// Spawns the bonus-round boss near the winners. Only called when the
    /// bonus round is enabled in settings, ten seconds after the victory.
    fn spawn_bonus_boss(&self);
}

// ---------------------------------------------------------------------------
// Announcer
// ---------------------------------------------------------------------------

/// Messages the engine wants shown to participants.
///
/// Opaque to the core: formatting, styling, and delivery belong to the
/// embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A new stage was entered.
    Stage(StageAnnouncement),
    /// The grace period is over; combat is now allowed.
    GracePeriodEnded,
    /// Every combatant was healed to full.
    FinalHeal,
    /// A single group remains; the match is decided.
    Victory {
        /// The winning group.
        group: GroupId,
        /// Its living, reachable members (possibly empty).
        members: Vec<MemberId>,
    },
    /// The bonus round is starting near the winners.
    BonusRound,
}

/// Sink for engine announcements.
pub trait Announcer: Send + Sync {
    /// Delivers a notice. Fire-and-forget.
    fn announce(&self, notice: Notice);
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Scatters and recalls participants.
pub trait Placement: Send + Sync {
    /// Randomly scatters participants within `max_spread`, keeping at least
    /// `min_spacing` between placement points.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Placement`] when placement fails; during the
    /// start procedure this rolls the session back.
    fn scatter(&self, max_spread: f64, min_spacing: f64) -> Result<(), HookError>;

    /// Returns every participant to the neutral area.
    fn recall(&self);
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Group membership and alive/eliminated status.
pub trait Roster: Send + Sync {
    /// Number of combatants not yet assigned to a group.
    fn unassigned_count(&self) -> usize;

    /// Number of competing groups.
    fn group_count(&self) -> usize;

    /// Number of combatants.
    fn member_count(&self) -> usize;

    /// Groups that still have at least one living member.
    fn alive_groups(&self) -> Vec<AliveGroup>;

    /// Heals every living combatant to full (final heal).
    fn heal_all(&self);

    /// Clears per-session status (alive flags, counters).
    fn reset(&self);
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The full set of collaborators handed to the engine.
#[derive(Clone)]
pub struct Hooks {
    /// Settings resolver.
    pub settings: Arc<dyn Settings>,
    /// Play area control.
    pub playfield: Arc<dyn Playfield>,
    /// Announcement sink.
    pub announcer: Arc<dyn Announcer>,
    /// Participant placement.
    pub placement: Arc<dyn Placement>,
    /// Group/alive status provider.
    pub roster: Arc<dyn Roster>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}
