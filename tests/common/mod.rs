//! Shared test harness: an engine wired to the in-memory simulators, with
//! every collaborator kept reachable for assertions.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use ringmaster::hooks::sim::{
    FixedSettings, RecordingAnnouncer, SimPlacement, SimPlayfield, SimRoster,
};
use ringmaster::hooks::{Announcer, Hooks, Notice, Placement, Playfield, Roster};
use ringmaster::session::{MatchEngine, MatchHandle};
use ringmaster::stage::{BoundaryShift, StageAnnouncement, StageDef, StageTable};

pub struct TestRig {
    pub handle: MatchHandle,
    pub task: JoinHandle<()>,
    pub playfield: Arc<SimPlayfield>,
    pub announcer: Arc<RecordingAnnouncer>,
    pub placement: Arc<SimPlacement>,
    pub roster: Arc<SimRoster>,
}

impl TestRig {
    /// Spawns an engine over the given table and settings.
    pub fn spawn(table: StageTable, settings: FixedSettings) -> Self {
        let playfield = Arc::new(SimPlayfield::default());
        let announcer = Arc::new(RecordingAnnouncer::default());
        let placement = Arc::new(SimPlacement::default());
        let roster = Arc::new(SimRoster::default());
        let hooks = Hooks {
            settings: Arc::new(settings),
            playfield: Arc::clone(&playfield) as Arc<dyn Playfield>,
            announcer: Arc::clone(&announcer) as Arc<dyn Announcer>,
            placement: Arc::clone(&placement) as Arc<dyn Placement>,
            roster: Arc::clone(&roster) as Arc<dyn Roster>,
        };
        let (handle, task) = MatchEngine::spawn(table, hooks);
        Self {
            handle,
            task,
            playfield,
            announcer,
            placement,
            roster,
        }
    }

    /// Stage announcements recorded so far, in order.
    pub fn stage_announcements(&self) -> Vec<StageAnnouncement> {
        self.announcer
            .notices()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::Stage(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Shuts the engine down and waits for the task.
    pub async fn shutdown(self) {
        self.handle.shutdown();
        self.task.await.expect("driver task panicked");
    }
}

/// The canonical three-stage scenario: a(10s, 100, snap), b(5s, 50, ramp),
/// open-ended final at 50.
pub fn scenario_table() -> StageTable {
    StageTable::new(vec![
        StageDef::timed("a", secs(10), 100.0, BoundaryShift::Snap),
        StageDef::timed("b", secs(5), 50.0, BoundaryShift::Ramp),
        StageDef::terminal("final", 50.0),
    ])
    .expect("scenario table is well-formed")
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}
