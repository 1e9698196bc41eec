//! Stage-progression state machine.
//!
//! The machine owns the [`StageTable`] and the transition rules; the
//! mutable position lives in [`Session`] and is passed in by the driver, so
//! the machine itself carries no hidden state. States are `NotStarted` plus
//! the active stages; the terminal stage is the last one and never
//! auto-completes.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::hooks::{Hooks, Notice};
use crate::session::state::Session;

use super::table::{BoundaryShift, StageDef, StageEffect, StageLength, StageTable};

/// Position in the stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePos {
    /// No session running.
    NotStarted,
    /// At the stage with this ordinal.
    At(usize),
}

/// Read-only view of the current stage, resolved at query time.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSnapshot {
    /// Stage id.
    pub id: String,
    /// Position in the table.
    pub ordinal: usize,
    /// Resolved length; `None` for the unbounded terminal stage.
    pub length: Option<Duration>,
    /// Resolved boundary diameter.
    pub boundary: f64,
    /// Whether this is the terminal stage.
    pub terminal: bool,
}

/// What the boundary is doing as a stage begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryOutlook {
    /// No movement this stage and none scheduled for the next.
    Holding,
    /// Ramping toward `target` over `over` during this stage.
    Closing {
        /// Final diameter.
        target: f64,
        /// Ramp duration.
        over: Duration,
    },
    /// Jumped to `target` at stage entry.
    Snapped {
        /// New diameter.
        target: f64,
    },
    /// Still this stage, but the next active stage moves it to `target` —
    /// an anticipatory warning.
    ClosingNext {
        /// The next stage's target diameter.
        target: f64,
    },
}

/// Stage-transition announcement handed to the announcer, unformatted.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAnnouncement {
    /// Entered stage id.
    pub stage: String,
    /// Resolved stage length; `None` for the terminal stage.
    pub length: Option<Duration>,
    /// Boundary outlook for participants.
    pub boundary: BoundaryOutlook,
    /// True when this is the last timed stage — the showdown comes next.
    pub final_stage_next: bool,
    /// True when the terminal stage itself was entered.
    pub terminal: bool,
}

/// The stage-progression state machine.
#[derive(Debug, Clone)]
pub struct StageMachine {
    table: StageTable,
}

impl StageMachine {
    /// Creates a machine over the given table.
    #[must_use]
    pub const fn new(table: StageTable) -> Self {
        Self { table }
    }

    /// The underlying stage catalog.
    #[must_use]
    pub const fn table(&self) -> &StageTable {
        &self.table
    }

    /// The current stage definition, if a session is running.
    #[must_use]
    pub fn current<'a>(&'a self, session: &Session) -> Option<&'a StageDef> {
        match session.stage_pos {
            StagePos::NotStarted => None,
            StagePos::At(ordinal) => self.table.get(ordinal),
        }
    }

    /// Resolved view of the current stage.
    #[must_use]
    pub fn snapshot(&self, session: &Session, hooks: &Hooks) -> Option<StageSnapshot> {
        let def = self.current(session)?;
        let settings = hooks.settings.as_ref();
        Some(StageSnapshot {
            id: def.id.clone(),
            ordinal: def.ordinal,
            length: self.table.resolved_length(def, settings).as_duration(),
            boundary: self.table.resolved_boundary(def, settings),
            terminal: def.terminal,
        })
    }

    /// Whether the current stage has run its course and should advance.
    ///
    /// Always false while a win is being resolved (the sequence freezes),
    /// in the terminal stage (unbounded length, no elapsed-time arithmetic),
    /// and when no session is running.
    #[must_use]
    pub fn is_complete(&self, session: &Session, now: Instant, hooks: &Hooks) -> bool {
        if session.win_latched {
            return false;
        }
        let Some(def) = self.current(session) else {
            return false;
        };
        let StageLength::Timed(length) = self.table.resolved_length(def, hooks.settings.as_ref())
        else {
            return false;
        };
        let Some(entered) = session.stage_entered_at else {
            return false;
        };
        now >= entered + length
    }

    /// Time left in the current stage; `None` when not started or in the
    /// terminal stage.
    #[must_use]
    pub fn remaining(&self, session: &Session, now: Instant, hooks: &Hooks) -> Option<Duration> {
        let def = self.current(session)?;
        let length = self
            .table
            .resolved_length(def, hooks.settings.as_ref())
            .as_duration()?;
        let entered = session.stage_entered_at?;
        Some((entered + length).saturating_duration_since(now))
    }

    /// `NotStarted -> stage[0]`: enters the first active stage.
    ///
    /// Returns the entered stage, or `None` if every stage is disabled.
    pub fn start<'a>(
        &'a self,
        session: &mut Session,
        now: Instant,
        hooks: &Hooks,
    ) -> Option<&'a StageDef> {
        let first = self.table.nth_active(0, hooks.settings.as_ref())?;
        session.started_at = Some(now);
        self.enter(session, first, None, now, hooks);
        Some(first)
    }

    /// `stage[i] -> stage[i+1]`: enters the next active stage.
    ///
    /// Intended to be called when [`Self::is_complete`] reports true (or on
    /// an admin skip). No-op in the terminal stage and when not started.
    pub fn advance<'a>(
        &'a self,
        session: &mut Session,
        now: Instant,
        hooks: &Hooks,
    ) -> Option<&'a StageDef> {
        let current = self.current(session)?;
        if current.terminal {
            warn!(stage = %current.id, "advance requested in terminal stage; ignoring");
            return None;
        }
        let settings = hooks.settings.as_ref();
        let Some(next) = self.table.next_active(current.ordinal, settings) else {
            warn!(stage = %current.id, "no active stage to advance to");
            return None;
        };
        let prev_boundary = self.table.resolved_boundary(current, settings);
        self.enter(session, next, Some(prev_boundary), now, hooks);
        Some(next)
    }

    /// Any state `-> NotStarted`.
    pub fn end(&self, session: &mut Session) {
        session.reset();
    }

    /// Applies a stage entry: position, timestamp, boundary command, entry
    /// effects, announcement.
    fn enter(
        &self,
        session: &mut Session,
        def: &StageDef,
        prev_boundary: Option<f64>,
        now: Instant,
        hooks: &Hooks,
    ) {
        let settings = hooks.settings.as_ref();
        let from = session.stage_pos;
        session.stage_pos = StagePos::At(def.ordinal);
        session.stage_entered_at = Some(now);

        let length = self.table.resolved_length(def, settings).as_duration();
        let target = self.table.resolved_boundary(def, settings);
        let changed = prev_boundary.is_none_or(|prev| (prev - target).abs() > f64::EPSILON);

        info!(?from, stage = %def.id, ordinal = def.ordinal, target, changed, "stage transition");

        // An unchanged target means the boundary is already where this stage
        // wants it; issuing another command would re-announce a move that
        // is not happening.
        if changed {
            let ramp = match def.shift {
                BoundaryShift::Snap => None,
                BoundaryShift::Ramp => length,
            };
            hooks.playfield.set_boundary(target, ramp);
        }

        for effect in &def.entry_effects {
            match effect {
                StageEffect::RescatterGroups => {
                    let spread = (target - 2.0).max(0.0);
                    if let Err(err) = hooks.placement.scatter(spread, 0.0) {
                        warn!(%err, stage = %def.id, "re-scatter failed");
                    }
                }
                other => hooks.playfield.apply_effect(*other, target),
            }
        }

        hooks
            .announcer
            .announce(Notice::Stage(self.compose_announcement(
                def,
                length,
                target,
                changed,
                settings,
            )));
    }

    /// Composes the stage announcement: a just-happened or ongoing boundary
    /// note when the target moved, otherwise an anticipatory one based on
    /// the next stage's target.
    fn compose_announcement(
        &self,
        def: &StageDef,
        length: Option<Duration>,
        target: f64,
        changed: bool,
        settings: &dyn crate::hooks::Settings,
    ) -> StageAnnouncement {
        let boundary = if changed {
            match (def.shift, length) {
                (BoundaryShift::Ramp, Some(over)) => BoundaryOutlook::Closing { target, over },
                _ => BoundaryOutlook::Snapped { target },
            }
        } else {
            match self.table.next_active(def.ordinal, settings) {
                Some(next) => {
                    let next_target = self.table.resolved_boundary(next, settings);
                    if (next_target - target).abs() > f64::EPSILON {
                        BoundaryOutlook::ClosingNext {
                            target: next_target,
                        }
                    } else {
                        BoundaryOutlook::Holding
                    }
                }
                None => BoundaryOutlook::Holding,
            }
        };

        let final_stage_next = !def.terminal
            && self
                .table
                .last_timed_active(settings)
                .is_some_and(|last| last.ordinal == def.ordinal);

        StageAnnouncement {
            stage: def.id.clone(),
            length,
            boundary,
            final_stage_next,
            terminal: def.terminal,
        }
    }
}
