//! Session start/end control.
//!
//! Both procedures follow the same discipline: evaluate preconditions
//! (unless forced), bookmark the transition-relevant state, run the
//! procedure, and on any failure restore the bookmark so the session is
//! back in its pre-attempt stage and a retry is possible. Failures are
//! logged and carried in the outcome — never propagated as `Err` to the
//! command layer.

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{SessionError, SessionOp, TransitionFailure};
use crate::hooks::Notice;

use super::driver::Engine;

/// A named precondition that failed.
///
/// Values, not errors: the caller decides whether to show all of them or
/// just the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// A session is already running.
    AlreadyStarted,
    /// No session is running.
    NotStarted,
    /// Combatants exist that are not assigned to any group.
    UnassignedMembers {
        /// How many.
        count: usize,
    },
}

impl std::fmt::Display for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyStarted => write!(f, "a session is already running"),
            Self::NotStarted => write!(f, "no session is running"),
            Self::UnassignedMembers { count } => {
                write!(f, "{count} combatant(s) are not assigned to a group")
            }
        }
    }
}

/// Result of a start attempt.
#[derive(Debug)]
pub enum StartOutcome {
    /// The session is running.
    Started,
    /// Preconditions failed; nothing happened.
    Blocked(Vec<Precondition>),
    /// The procedure failed partway and was rolled back.
    RolledBack(TransitionFailure),
}

/// Result of an end attempt.
#[derive(Debug)]
pub enum EndOutcome {
    /// The session is over.
    Ended,
    /// Preconditions failed; nothing happened.
    Blocked(Vec<Precondition>),
    /// The procedure failed partway and was rolled back.
    RolledBack(TransitionFailure),
}

impl Engine {
    /// Starts a session: preconditions, bookmark, procedure, rollback.
    pub(crate) fn start_session(&mut self, force: bool, now: Instant) -> StartOutcome {
        debug!(force, "session start requested");
        if force {
            debug!("preconditions skipped (forced)");
        } else {
            let failures = self.start_preconditions();
            if !failures.is_empty() {
                debug!(?failures, "session start blocked");
                return StartOutcome::Blocked(failures);
            }
        }

        let bookmark = self.session.bookmark();
        match self.run_start_procedure(now) {
            Ok(()) => {
                info!("session started");
                StartOutcome::Started
            }
            Err(source) => {
                self.session.restore(bookmark);
                self.timers.clear();
                let failure = TransitionFailure {
                    operation: SessionOp::Start,
                    source,
                };
                error!(%failure, "session start failed");
                StartOutcome::RolledBack(failure)
            }
        }
    }

    /// Ends the session: preconditions, bookmark, procedure, rollback.
    pub(crate) fn end_session(&mut self, force: bool) -> EndOutcome {
        debug!(force, "session end requested");
        if force {
            debug!("preconditions skipped (forced)");
        } else if !self.session.is_running() {
            debug!("session end blocked");
            return EndOutcome::Blocked(vec![Precondition::NotStarted]);
        }

        let bookmark = self.session.bookmark();
        match self.run_end_procedure() {
            Ok(()) => {
                info!("session ended");
                EndOutcome::Ended
            }
            Err(source) => {
                self.session.restore(bookmark);
                let failure = TransitionFailure {
                    operation: SessionOp::End,
                    source,
                };
                error!(%failure, "session end failed");
                EndOutcome::RolledBack(failure)
            }
        }
    }

    fn start_preconditions(&self) -> Vec<Precondition> {
        let mut failures = Vec::new();
        if self.session.is_running() {
            failures.push(Precondition::AlreadyStarted);
        }
        let unassigned = self.hooks.roster.unassigned_count();
        if unassigned > 0 {
            failures.push(Precondition::UnassignedMembers { count: unassigned });
        }
        failures
    }

    /// The start procedure proper. Any `Err` triggers a rollback.
    fn run_start_procedure(&mut self, now: Instant) -> Result<(), SessionError> {
        self.hooks.playfield.prepare()?;

        // Scatter within the first stage's boundary. The minimum spacing is
        // sized so the expected number of generated placement points covers
        // every group (or combatant) with margin.
        let settings = self.hooks.settings.as_ref();
        let first = self
            .machine
            .table()
            .nth_active(0, settings)
            .ok_or(SessionError::NoActiveStages)?;
        let spread = self.machine.table().resolved_boundary(first, settings);
        let spacing = settings.spread_method().min_spacing(
            spread,
            self.hooks.roster.group_count(),
            self.hooks.roster.member_count(),
        );
        self.hooks.placement.scatter(spread, spacing)?;

        self.timers.clear();
        self.session.win_latched = false;

        self.machine
            .start(&mut self.session, now, &self.hooks)
            .ok_or(SessionError::NoActiveStages)?;

        self.schedule_session_events(now);
        Ok(())
    }

    /// One-shot events tied to session start: grace-period end and the
    /// final heal, when configured.
    fn schedule_session_events(&mut self, now: Instant) {
        if let Some(grace) = self.hooks.settings.grace_period() {
            let registered = self.timers.register(
                now + grace,
                "grace-period-end",
                Box::new(|engine: &mut Engine| {
                    engine.hooks.announcer.announce(Notice::GracePeriodEnded);
                    Ok(())
                }),
            );
            if let Err(err) = registered {
                warn!(%err, "could not schedule grace-period end");
            }
        }

        if let Some(delay) = self.hooks.settings.final_heal() {
            let registered = self.timers.register(
                now + delay,
                "final-heal",
                Box::new(|engine: &mut Engine| {
                    engine.hooks.announcer.announce(Notice::FinalHeal);
                    engine.hooks.roster.heal_all();
                    Ok(())
                }),
            );
            if let Err(err) = registered {
                warn!(%err, "could not schedule final heal");
            }
        }
    }

    /// The end procedure proper. Any `Err` triggers a rollback.
    fn run_end_procedure(&mut self) -> Result<(), SessionError> {
        self.hooks.placement.recall();
        self.hooks.roster.reset();
        self.timers.clear();
        self.machine.end(&mut self.session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::sim::{
        FixedSettings, RecordingAnnouncer, SimPlacement, SimPlayfield, SimRoster,
    };
    use crate::hooks::Hooks;
    use crate::session::driver::MatchEngine;
    use crate::stage::table::{BoundaryShift, StageDef, StageTable};
    use std::sync::Arc;
    use std::time::Duration;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn test_table() -> StageTable {
        StageTable::new(vec![
            StageDef::timed("a", secs(10), 100.0, BoundaryShift::Snap),
            StageDef::terminal("final", 20.0),
        ])
        .unwrap()
    }

    struct Rig {
        hooks: Hooks,
        playfield: Arc<SimPlayfield>,
        announcer: Arc<RecordingAnnouncer>,
        placement: Arc<SimPlacement>,
        roster: Arc<SimRoster>,
    }

    fn rig(settings: FixedSettings) -> Rig {
        let playfield = Arc::new(SimPlayfield::default());
        let announcer = Arc::new(RecordingAnnouncer::default());
        let placement = Arc::new(SimPlacement::default());
        let roster = Arc::new(SimRoster::default());
        let hooks = Hooks {
            settings: Arc::new(settings),
            playfield: Arc::clone(&playfield) as _,
            announcer: Arc::clone(&announcer) as _,
            placement: Arc::clone(&placement) as _,
            roster: Arc::clone(&roster) as _,
        };
        Rig {
            hooks,
            playfield,
            announcer,
            placement,
            roster,
        }
    }

    #[test]
    fn precondition_display() {
        assert_eq!(
            Precondition::AlreadyStarted.to_string(),
            "a session is already running"
        );
        assert_eq!(
            Precondition::UnassignedMembers { count: 3 }.to_string(),
            "3 combatant(s) are not assigned to a group"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_start_lists_every_failure() {
        let rig = rig(FixedSettings::default());
        rig.roster.set_unassigned(2);
        let (handle, task) = MatchEngine::spawn(test_table(), rig.hooks.clone());

        handle.start(false).await.unwrap();
        let outcome = handle.start(false).await.unwrap();
        let StartOutcome::Blocked(failures) = outcome else {
            panic!("expected Blocked, got {outcome:?}");
        };
        assert_eq!(
            failures,
            vec![
                Precondition::AlreadyStarted,
                Precondition::UnassignedMembers { count: 2 }
            ]
        );

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_start_has_no_side_effects() {
        let rig = rig(FixedSettings::default());
        rig.roster.set_unassigned(1);
        let (handle, task) = MatchEngine::spawn(test_table(), rig.hooks.clone());

        let outcome = handle.start(false).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Blocked(_)));
        assert!(rig.placement.scatters().is_empty());
        assert!(rig.playfield.boundary().is_none());
        assert!(handle.current_stage().await.unwrap().is_none());

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn forced_start_skips_preconditions() {
        let rig = rig(FixedSettings::default());
        rig.roster.set_unassigned(5);
        let (handle, task) = MatchEngine::spawn(test_table(), rig.hooks.clone());

        let outcome = handle.start(true).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Started));

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_scatter_rolls_back() {
        let rig = rig(FixedSettings::default());
        rig.placement.fail_next_scatter();
        let (handle, task) = MatchEngine::spawn(test_table(), rig.hooks.clone());

        let outcome = handle.start(false).await.unwrap();
        let StartOutcome::RolledBack(failure) = outcome else {
            panic!("expected RolledBack, got {outcome:?}");
        };
        assert_eq!(failure.operation, SessionOp::Start);
        assert!(handle.current_stage().await.unwrap().is_none());
        assert!(handle.elapsed().await.unwrap().is_none());

        // A retry succeeds — the failure was not sticky.
        let outcome = handle.start(false).await.unwrap();
        assert!(matches!(outcome, StartOutcome::Started));

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_prepare_rolls_back() {
        let rig = rig(FixedSettings::default());
        rig.playfield.fail_next_prepare();
        let (handle, task) = MatchEngine::spawn(test_table(), rig.hooks.clone());

        let outcome = handle.start(false).await.unwrap();
        assert!(matches!(outcome, StartOutcome::RolledBack(_)));
        assert!(rig.placement.scatters().is_empty(), "scatter never reached");

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn end_requires_running_session() {
        let rig = rig(FixedSettings::default());
        let (handle, task) = MatchEngine::spawn(test_table(), rig.hooks.clone());

        let outcome = handle.end(false).await.unwrap();
        let EndOutcome::Blocked(failures) = outcome else {
            panic!("expected Blocked, got {outcome:?}");
        };
        assert_eq!(failures, vec![Precondition::NotStarted]);

        // Forced end on a not-started session still runs the procedure.
        let outcome = handle.end(true).await.unwrap();
        assert!(matches!(outcome, EndOutcome::Ended));

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn end_recalls_and_clears() {
        let settings = FixedSettings::default().with_grace_period(secs(600));
        let rig = rig(settings);
        let (handle, task) = MatchEngine::spawn(test_table(), rig.hooks.clone());

        handle.start(false).await.unwrap();
        let status = handle.status().await.unwrap();
        assert_eq!(status.pending_events, 1, "grace-period event pending");

        let outcome = handle.end(false).await.unwrap();
        assert!(matches!(outcome, EndOutcome::Ended));
        assert_eq!(rig.placement.recalls(), 1);
        assert!(handle.current_stage().await.unwrap().is_none());

        let status = handle.status().await.unwrap();
        assert_eq!(status.pending_events, 0, "pending events dropped");

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_schedules_grace_and_heal() {
        let settings = FixedSettings::default()
            .with_grace_period(secs(2))
            .with_final_heal(secs(4));
        let rig = rig(settings);
        let (handle, task) = MatchEngine::spawn(test_table(), rig.hooks.clone());
        handle.start(false).await.unwrap();

        tokio::time::sleep(secs(3)).await;
        assert!(rig.announcer.notices().contains(&Notice::GracePeriodEnded));
        assert_eq!(rig.roster.heals(), 0);

        tokio::time::sleep(secs(2)).await;
        assert!(rig.announcer.notices().contains(&Notice::FinalHeal));
        assert_eq!(rig.roster.heals(), 1);

        handle.shutdown();
        task.await.unwrap();
    }
}
