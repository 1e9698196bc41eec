//! In-memory collaborator implementations.
//!
//! These back the console binary and the test suite: they log what a real
//! embedding would do and record enough state to assert against. None of
//! them block.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::config::schema::{DayCycle, SpreadMethod};
use crate::error::HookError;
use crate::stage::StageEffect;

use super::{AliveGroup, Announcer, GroupId, MemberId, Notice, Placement, Playfield, Roster, Settings};

// ---------------------------------------------------------------------------
// FixedSettings
// ---------------------------------------------------------------------------

/// Fixed settings built up with a fluent API. Handy in tests where the
/// resolver should not change underfoot.
#[derive(Debug, Clone, Default)]
pub struct FixedSettings {
    lengths: IndexMap<String, Duration>,
    boundaries: IndexMap<String, f64>,
    grace_period: Option<Duration>,
    final_heal: Option<Duration>,
    day_cycle: DayCycle,
    bonus_round: bool,
    spread: SpreadMethod,
}

impl FixedSettings {
    /// Overrides a stage's length.
    #[must_use]
    pub fn with_length(mut self, id: &str, length: Duration) -> Self {
        self.lengths.insert(id.to_string(), length);
        self
    }

    /// Overrides a stage's boundary diameter.
    #[must_use]
    pub fn with_boundary(mut self, id: &str, diameter: f64) -> Self {
        self.boundaries.insert(id.to_string(), diameter);
        self
    }

    /// Sets the grace period.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = Some(grace);
        self
    }

    /// Sets the final heal delay.
    #[must_use]
    pub const fn with_final_heal(mut self, delay: Duration) -> Self {
        self.final_heal = Some(delay);
        self
    }

    /// Sets the day cycle.
    #[must_use]
    pub const fn with_day_cycle(mut self, cycle: DayCycle) -> Self {
        self.day_cycle = cycle;
        self
    }

    /// Enables the bonus round.
    #[must_use]
    pub const fn with_bonus_round(mut self) -> Self {
        self.bonus_round = true;
        self
    }

    /// Sets the spread method.
    #[must_use]
    pub const fn with_spread(mut self, spread: SpreadMethod) -> Self {
        self.spread = spread;
        self
    }
}

impl Settings for FixedSettings {
    fn stage_length_override(&self, id: &str) -> Option<Duration> {
        self.lengths.get(id).copied()
    }

    fn boundary_override(&self, id: &str) -> Option<f64> {
        self.boundaries.get(id).copied()
    }

    fn grace_period(&self) -> Option<Duration> {
        self.grace_period
    }

    fn final_heal(&self) -> Option<Duration> {
        self.final_heal
    }

    fn day_cycle(&self) -> DayCycle {
        self.day_cycle
    }

    fn bonus_round(&self) -> bool {
        self.bonus_round
    }

    fn spread_method(&self) -> SpreadMethod {
        self.spread
    }
}

// ---------------------------------------------------------------------------
// SimPlayfield
// ---------------------------------------------------------------------------

/// Play area simulator: tracks the boundary, the world clock, and applied
/// effects.
#[derive(Debug, Default)]
pub struct SimPlayfield {
    state: Mutex<PlayfieldState>,
    clock: AtomicU64,
    bonus_bosses: AtomicU32,
    fail_prepare: AtomicBool,
}

#[derive(Debug, Default)]
struct PlayfieldState {
    boundary: Option<(f64, Option<Duration>)>,
    effects: Vec<StageEffect>,
}

impl SimPlayfield {
    /// Makes the next `prepare` call fail (rollback tests).
    pub fn fail_next_prepare(&self) {
        self.fail_prepare.store(true, Ordering::SeqCst);
    }

    /// Last boundary command issued, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn boundary(&self) -> Option<(f64, Option<Duration>)> {
        self.state.lock().expect("playfield lock poisoned").boundary
    }

    /// Effects applied so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn effects(&self) -> Vec<StageEffect> {
        self.state
            .lock()
            .expect("playfield lock poisoned")
            .effects
            .clone()
    }

    /// Current in-world clock value.
    #[must_use]
    pub fn clock(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    /// Number of bonus bosses spawned.
    #[must_use]
    pub fn bonus_bosses(&self) -> u32 {
        self.bonus_bosses.load(Ordering::SeqCst)
    }
}

impl Playfield for SimPlayfield {
    fn prepare(&self) -> Result<(), HookError> {
        if self.fail_prepare.swap(false, Ordering::SeqCst) {
            return Err(HookError::Playfield("simulated prepare failure".into()));
        }
        debug!("playfield prepared");
        Ok(())
    }

    fn set_boundary(&self, diameter: f64, ramp: Option<Duration>) {
        info!(diameter, ?ramp, "boundary command");
        self.state.lock().expect("playfield lock poisoned").boundary = Some((diameter, ramp));
    }

    fn apply_effect(&self, effect: StageEffect, diameter: f64) {
        info!(?effect, diameter, "stage effect");
        self.state
            .lock()
            .expect("playfield lock poisoned")
            .effects
            .push(effect);
    }

    fn boost_clock(&self, amount: u32) {
        self.clock.fetch_add(u64::from(amount), Ordering::SeqCst);
    }

    fn spawn_bonus_boss(&self) {
        info!("bonus boss spawned");
        self.bonus_bosses.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// RecordingAnnouncer
// ---------------------------------------------------------------------------

/// Announcer that logs and records every notice.
#[derive(Debug, Default)]
pub struct RecordingAnnouncer {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingAnnouncer {
    /// All notices announced so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("announcer lock poisoned").clone()
    }

    /// Drains and returns the recorded notices.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().expect("announcer lock poisoned"))
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, notice: Notice) {
        info!(?notice, "announcement");
        self.notices
            .lock()
            .expect("announcer lock poisoned")
            .push(notice);
    }
}

// ---------------------------------------------------------------------------
// SimPlacement
// ---------------------------------------------------------------------------

/// Placement simulator: records scatter parameters and recall calls.
#[derive(Debug, Default)]
pub struct SimPlacement {
    scatters: Mutex<Vec<(f64, f64)>>,
    recalls: AtomicU32,
    fail_scatter: AtomicBool,
}

impl SimPlacement {
    /// Makes the next `scatter` call fail (rollback tests).
    pub fn fail_next_scatter(&self) {
        self.fail_scatter.store(true, Ordering::SeqCst);
    }

    /// Scatter calls so far as `(max_spread, min_spacing)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn scatters(&self) -> Vec<(f64, f64)> {
        self.scatters.lock().expect("placement lock poisoned").clone()
    }

    /// Number of recall calls.
    #[must_use]
    pub fn recalls(&self) -> u32 {
        self.recalls.load(Ordering::SeqCst)
    }
}

impl Placement for SimPlacement {
    fn scatter(&self, max_spread: f64, min_spacing: f64) -> Result<(), HookError> {
        if self.fail_scatter.swap(false, Ordering::SeqCst) {
            return Err(HookError::Placement("simulated scatter failure".into()));
        }
        // A real embedding would sample random points here; the simulator
        // only needs a little jitter in its log line.
        let jitter: f64 = rand::random::<f64>() * min_spacing;
        info!(max_spread, min_spacing, jitter, "scatter");
        self.scatters
            .lock()
            .expect("placement lock poisoned")
            .push((max_spread, min_spacing));
        Ok(())
    }

    fn recall(&self) {
        info!("recall to neutral area");
        self.recalls.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// SimRoster
// ---------------------------------------------------------------------------

/// Roster simulator backed by a flat member map.
#[derive(Debug, Default)]
pub struct SimRoster {
    inner: Mutex<RosterState>,
    heals: AtomicU32,
}

#[derive(Debug, Default)]
struct RosterState {
    members: IndexMap<MemberId, MemberRecord>,
    unassigned: usize,
}

#[derive(Debug, Clone)]
struct MemberRecord {
    group: GroupId,
    alive: bool,
}

impl SimRoster {
    /// Adds a member to a group, alive.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn join(&self, member: MemberId, group: GroupId) {
        self.inner
            .lock()
            .expect("roster lock poisoned")
            .members
            .insert(member, MemberRecord { group, alive: true });
    }

    /// Registers combatants that have not picked a group yet.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_unassigned(&self, count: usize) {
        self.inner.lock().expect("roster lock poisoned").unassigned = count;
    }

    /// Marks a member dead. Returns false if the member is unknown.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn eliminate(&self, member: &MemberId) -> bool {
        self.inner
            .lock()
            .expect("roster lock poisoned")
            .members
            .get_mut(member)
            .map(|record| record.alive = false)
            .is_some()
    }

    /// Number of `heal_all` calls.
    #[must_use]
    pub fn heals(&self) -> u32 {
        self.heals.load(Ordering::SeqCst)
    }
}

impl Roster for SimRoster {
    fn unassigned_count(&self) -> usize {
        self.inner.lock().expect("roster lock poisoned").unassigned
    }

    fn group_count(&self) -> usize {
        let inner = self.inner.lock().expect("roster lock poisoned");
        let mut groups: Vec<&GroupId> = inner.members.values().map(|r| &r.group).collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        groups.dedup();
        groups.len()
    }

    fn member_count(&self) -> usize {
        self.inner.lock().expect("roster lock poisoned").members.len()
    }

    fn alive_groups(&self) -> Vec<AliveGroup> {
        let inner = self.inner.lock().expect("roster lock poisoned");
        let mut alive: IndexMap<GroupId, Vec<MemberId>> = IndexMap::new();
        for (member, record) in &inner.members {
            if record.alive {
                alive
                    .entry(record.group.clone())
                    .or_default()
                    .push(member.clone());
            }
        }
        alive
            .into_iter()
            .map(|(id, online)| AliveGroup { id, online })
            .collect()
    }

    fn heal_all(&self) {
        info!("healing all living combatants");
        self.heals.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&self) {
        let mut inner = self.inner.lock().expect("roster lock poisoned");
        for record in inner.members.values_mut() {
            record.alive = true;
        }
    }
}
