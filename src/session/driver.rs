//! The tick driver.
//!
//! One tokio task owns every piece of mutable session state. A 50 ms
//! interval drives stage progression and timed-event draining; everything
//! else — admin commands, elimination notifications, event registration,
//! queries — arrives as messages on the same task and is applied between
//! ticks. Nothing here takes a lock.
//!
//! The public surface is [`MatchHandle`]: a cheap clone wrapping the
//! command sender. Queries are answered over oneshot replies.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{EventError, RingmasterError, ScheduleError, SessionError};
use crate::hooks::{AliveGroup, Hooks, Notice};
use crate::session::controller::{EndOutcome, StartOutcome};
use crate::session::state::Session;
use crate::session::win::{Victory, WinEvaluator};
use crate::stage::{StageMachine, StageSnapshot, StageTable};
use crate::timer::{Action, EventHandle, MAX_DRAIN_PER_TICK, Scheduler};

/// Fixed tick cadence (20 Hz).
pub const TICK: Duration = Duration::from_millis(50);

/// Delay between the victory decision and the bonus round.
const BONUS_ROUND_DELAY: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Timed actions (public shape)
// ---------------------------------------------------------------------------

/// A caller-supplied timed action.
///
/// Runs on the driver task when due, with an [`EventScope`] for announcing
/// and follow-up scheduling. Returning an error logs it and continues the
/// drain.
pub type TimedAction =
    Box<dyn FnOnce(&mut EventScope<'_>) -> Result<(), EventError> + Send>;

/// What a timed action may touch while it runs.
pub struct EventScope<'a> {
    hooks: &'a Hooks,
    timers: &'a mut Scheduler<Engine>,
    now: Instant,
}

impl EventScope<'_> {
    /// The collaborator bundle.
    #[must_use]
    pub const fn hooks(&self) -> &Hooks {
        self.hooks
    }

    /// The drain pass's notion of now.
    #[must_use]
    pub const fn now(&self) -> Instant {
        self.now
    }

    /// Schedules a follow-up event at an absolute time. An `at` in the past
    /// is legal: the event is already due and the current drain pass will
    /// pick it up.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::DuplicateEvent`] on an occupied identity
    /// key (unreachable through this API).
    pub fn schedule(
        &mut self,
        at: Instant,
        label: impl Into<String>,
        action: TimedAction,
    ) -> Result<EventHandle, ScheduleError> {
        self.timers.register(at, label, wrap(action))
    }
}

/// Adapts a public [`TimedAction`] to the scheduler's engine-context shape.
fn wrap(action: TimedAction) -> Action<Engine> {
    Box::new(move |engine: &mut Engine| {
        let mut scope = EventScope {
            hooks: &engine.hooks,
            timers: &mut engine.timers,
            now: engine.clock,
        };
        action(&mut scope)
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub(crate) enum Command {
    Start {
        force: bool,
        reply: oneshot::Sender<StartOutcome>,
    },
    End {
        force: bool,
        reply: oneshot::Sender<EndOutcome>,
    },
    SkipStage {
        reply: oneshot::Sender<bool>,
    },
    Register {
        at: Instant,
        label: String,
        action: TimedAction,
        reply: oneshot::Sender<Result<EventHandle, ScheduleError>>,
    },
    Cancel {
        handle: EventHandle,
        reply: oneshot::Sender<bool>,
    },
    Eliminations {
        alive: Vec<AliveGroup>,
    },
    CurrentStage {
        reply: oneshot::Sender<Option<StageSnapshot>>,
    },
    Elapsed {
        reply: oneshot::Sender<Option<Duration>>,
    },
    Remaining {
        reply: oneshot::Sender<Option<Duration>>,
    },
    InGrace {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
}

/// Aggregate session status for dashboards and the admin console.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Current stage, if a session is running.
    pub stage: Option<StageSnapshot>,
    /// Time since session start.
    pub elapsed: Option<Duration>,
    /// Time left in the current stage.
    pub remaining: Option<Duration>,
    /// Pending timed events.
    pub pending_events: usize,
    /// Whether a win has been latched this session.
    pub win_latched: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The driver task's state bundle. Session-controller methods live in
/// [`controller`](crate::session::controller); tick and command handling
/// live here.
pub(crate) struct Engine {
    pub(crate) machine: StageMachine,
    pub(crate) session: Session,
    pub(crate) timers: Scheduler<Engine>,
    pub(crate) hooks: Hooks,
    pub(crate) win: WinEvaluator,
    /// The current pass's notion of now; refreshed per tick and per command.
    pub(crate) clock: Instant,
}

impl Engine {
    /// One tick: drain due events, advance the stage if complete, boost the
    /// world clock. No work while no session is running.
    fn tick(&mut self, now: Instant) {
        self.clock = now;
        if !self.session.is_running() {
            return;
        }

        self.drain_due(now);

        if self.machine.is_complete(&self.session, now, &self.hooks) {
            self.machine.advance(&mut self.session, now, &self.hooks);
        }

        let boost = self.hooks.settings.day_cycle().per_tick_boost();
        if boost != 0 {
            self.hooks.playfield.boost_clock(boost);
        }
    }

    /// Runs every due event in time order. Events registered mid-drain with
    /// past trigger times run in the same pass, up to the cap.
    fn drain_due(&mut self, now: Instant) {
        let mut fired = 0usize;
        while fired < MAX_DRAIN_PER_TICK {
            let Some(event) = self.timers.pop_due(now) else {
                break;
            };
            fired += 1;
            debug!(label = event.label(), "timed event due");
            if let Err(err) = event.run(self) {
                warn!(%err, "timed event failed; continuing drain");
            }
        }
        if fired == MAX_DRAIN_PER_TICK && self.timers.next_trigger().is_some_and(|t| t <= now) {
            warn!(fired, "drain cap reached; remainder deferred to next tick");
        }
    }

    fn handle(&mut self, command: Command) {
        self.clock = Instant::now();
        match command {
            Command::Start { force, reply } => {
                let _ = reply.send(self.start_session(force, self.clock));
            }
            Command::End { force, reply } => {
                let _ = reply.send(self.end_session(force));
            }
            Command::SkipStage { reply } => {
                let advanced = self.session.is_running()
                    && self
                        .machine
                        .advance(&mut self.session, self.clock, &self.hooks)
                        .is_some();
                let _ = reply.send(advanced);
            }
            Command::Register {
                at,
                label,
                action,
                reply,
            } => {
                let _ = reply.send(self.timers.register(at, label, wrap(action)));
            }
            Command::Cancel { handle, reply } => {
                let _ = reply.send(self.timers.cancel(&handle));
            }
            Command::Eliminations { alive } => self.on_eliminations(&alive),
            Command::CurrentStage { reply } => {
                let _ = reply.send(self.machine.snapshot(&self.session, &self.hooks));
            }
            Command::Elapsed { reply } => {
                let _ = reply.send(self.session.elapsed(self.clock));
            }
            Command::Remaining { reply } => {
                let _ = reply.send(self.machine.remaining(&self.session, self.clock, &self.hooks));
            }
            Command::InGrace { reply } => {
                let _ = reply.send(self.in_grace_period(self.clock));
            }
            Command::Status { reply } => {
                let _ = reply.send(StatusReport {
                    stage: self.machine.snapshot(&self.session, &self.hooks),
                    elapsed: self.session.elapsed(self.clock),
                    remaining: self.machine.remaining(&self.session, self.clock, &self.hooks),
                    pending_events: self.timers.len(),
                    win_latched: self.session.win_latched,
                });
            }
        }
    }

    /// Feeds the win evaluator; on a latch, schedules the victory sequence.
    fn on_eliminations(&mut self, alive: &[AliveGroup]) {
        if !self.session.is_running() {
            return;
        }
        let Some(victory) = self.win.evaluate(&mut self.session, alive) else {
            return;
        };
        self.schedule_victory_sequence(victory);
    }

    /// The victory announcement goes out one tick late so it renders after
    /// the elimination message that caused it; the bonus round follows ten
    /// seconds later when enabled.
    fn schedule_victory_sequence(&mut self, victory: Victory) {
        let announce = self.timers.register(
            self.clock + TICK,
            "victory-announce",
            Box::new(move |engine: &mut Engine| {
                engine.hooks.announcer.announce(Notice::Victory {
                    group: victory.group,
                    members: victory.members,
                });
                Ok(())
            }),
        );
        if let Err(err) = announce {
            warn!(%err, "could not schedule victory announcement");
        }

        if self.hooks.settings.bonus_round() {
            let bonus = self.timers.register(
                self.clock + BONUS_ROUND_DELAY,
                "bonus-round",
                Box::new(|engine: &mut Engine| {
                    engine.hooks.announcer.announce(Notice::BonusRound);
                    engine.hooks.playfield.spawn_bonus_boss();
                    Ok(())
                }),
            );
            if let Err(err) = bonus {
                warn!(%err, "could not schedule bonus round");
            }
        }
    }

    /// Whether the combat-free grace period is still in effect.
    pub(crate) fn in_grace_period(&self, now: Instant) -> bool {
        match (self.session.elapsed(now), self.hooks.settings.grace_period()) {
            (Some(elapsed), Some(grace)) => elapsed <= grace,
            _ => false,
        }
    }
}

async fn run(mut engine: Engine, mut rx: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("tick driver running");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => engine.handle(command),
                None => break,
            },
            _ = ticker.tick() => engine.tick(Instant::now()),
        }
    }

    info!("tick driver stopped");
}

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// Factory for the engine task.
pub struct MatchEngine;

impl MatchEngine {
    /// Spawns the driver task over the given stage table and collaborators.
    ///
    /// Returns the command handle and the task's join handle. The task
    /// stops on [`MatchHandle::shutdown`] or when every handle is dropped.
    #[must_use]
    pub fn spawn(table: StageTable, hooks: Hooks) -> (MatchHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let engine = Engine {
            machine: StageMachine::new(table),
            session: Session::new(),
            timers: Scheduler::new(),
            hooks,
            win: WinEvaluator,
            clock: Instant::now(),
        };
        let task = tokio::spawn(run(engine, rx, cancel.clone()));
        (MatchHandle { tx, cancel }, task)
    }
}

/// Cloneable handle to a running engine.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl MatchHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .map_err(|_| SessionError::EngineGone)?;
        rx.await.map_err(|_| SessionError::EngineGone)
    }

    /// Starts a session. `force` skips precondition checks.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn start(&self, force: bool) -> Result<StartOutcome, SessionError> {
        self.request(|reply| Command::Start { force, reply }).await
    }

    /// Ends the session. `force` skips precondition checks.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn end(&self, force: bool) -> Result<EndOutcome, SessionError> {
        self.request(|reply| Command::End { force, reply }).await
    }

    /// Admin skip: advances to the next stage regardless of completion.
    /// Returns whether a transition happened.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn skip_stage(&self) -> Result<bool, SessionError> {
        self.request(|reply| Command::SkipStage { reply }).await
    }

    /// Schedules a one-shot action at an absolute trigger time.
    ///
    /// # Errors
    ///
    /// [`SessionError::EngineGone`] if the driver has stopped, or a
    /// [`ScheduleError`] from registration.
    pub async fn register_event(
        &self,
        at: Instant,
        label: impl Into<String>,
        action: TimedAction,
    ) -> crate::error::Result<EventHandle> {
        let label = label.into();
        let registered = self
            .request(|reply| Command::Register {
                at,
                label,
                action,
                reply,
            })
            .await
            .map_err(RingmasterError::Session)?;
        registered.map_err(RingmasterError::Schedule)
    }

    /// Cancels a pending event. Returns whether it was found.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn cancel_event(&self, handle: EventHandle) -> Result<bool, SessionError> {
        self.request(|reply| Command::Cancel { handle, reply }).await
    }

    /// Reports the current alive-group state. Fire-and-forget; feeds the
    /// win evaluator.
    pub fn notify_elimination(&self, alive: Vec<AliveGroup>) {
        let _ = self.tx.send(Command::Eliminations { alive });
    }

    /// Resolved view of the current stage, or `None` while not started.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn current_stage(&self) -> Result<Option<StageSnapshot>, SessionError> {
        self.request(|reply| Command::CurrentStage { reply }).await
    }

    /// Time since session start, or `None` while not started.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn elapsed(&self) -> Result<Option<Duration>, SessionError> {
        self.request(|reply| Command::Elapsed { reply }).await
    }

    /// Time left in the current stage; `None` while not started or in the
    /// terminal stage.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn remaining_stage_time(&self) -> Result<Option<Duration>, SessionError> {
        self.request(|reply| Command::Remaining { reply }).await
    }

    /// Whether the combat-free grace period is still in effect.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn in_grace_period(&self) -> Result<bool, SessionError> {
        self.request(|reply| Command::InGrace { reply }).await
    }

    /// Aggregate status for dashboards and the admin console.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineGone`] if the driver task has stopped.
    pub async fn status(&self) -> Result<StatusReport, SessionError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Stops the driver task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
