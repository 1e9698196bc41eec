//! Session start/end lifecycle: preconditions, rollback, recovery.

mod common;

use common::{TestRig, scenario_table, secs};
use ringmaster::hooks::sim::FixedSettings;
use ringmaster::hooks::{GroupId, MemberId, Roster};
use ringmaster::session::{EndOutcome, Precondition, StartOutcome};

#[tokio::test(start_paused = true)]
async fn start_end_start_cycle() {
    let rig = TestRig::spawn(scenario_table(), FixedSettings::default());

    assert!(matches!(
        rig.handle.start(false).await.unwrap(),
        StartOutcome::Started
    ));
    tokio::time::sleep(secs(3)).await;

    assert!(matches!(
        rig.handle.end(false).await.unwrap(),
        EndOutcome::Ended
    ));
    assert!(rig.handle.current_stage().await.unwrap().is_none());
    assert!(rig.handle.elapsed().await.unwrap().is_none());

    // A fresh session starts from stage a with a fresh clock.
    assert!(matches!(
        rig.handle.start(false).await.unwrap(),
        StartOutcome::Started
    ));
    let stage = rig.handle.current_stage().await.unwrap().unwrap();
    assert_eq!(stage.id, "a");
    let elapsed = rig.handle.elapsed().await.unwrap().unwrap();
    assert!(elapsed < secs(1), "elapsed={elapsed:?}");

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn double_start_is_blocked_not_fatal() {
    let rig = TestRig::spawn(scenario_table(), FixedSettings::default());
    rig.handle.start(false).await.unwrap();

    let outcome = rig.handle.start(false).await.unwrap();
    let StartOutcome::Blocked(failures) = outcome else {
        panic!("expected Blocked, got {outcome:?}");
    };
    assert_eq!(failures, vec![Precondition::AlreadyStarted]);

    // The running session is untouched.
    assert!(rig.handle.current_stage().await.unwrap().is_some());

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unassigned_members_block_start() {
    let rig = TestRig::spawn(scenario_table(), FixedSettings::default());
    rig.roster.set_unassigned(3);

    let outcome = rig.handle.start(false).await.unwrap();
    let StartOutcome::Blocked(failures) = outcome else {
        panic!("expected Blocked, got {outcome:?}");
    };
    assert_eq!(failures, vec![Precondition::UnassignedMembers { count: 3 }]);

    // Assigning everyone clears the block.
    rig.roster.set_unassigned(0);
    assert!(matches!(
        rig.handle.start(false).await.unwrap(),
        StartOutcome::Started
    ));

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scatter_failure_rolls_back_and_is_retryable() {
    let rig = TestRig::spawn(scenario_table(), FixedSettings::default());
    rig.placement.fail_next_scatter();

    let outcome = rig.handle.start(false).await.unwrap();
    assert!(matches!(outcome, StartOutcome::RolledBack(_)));

    // Rolled all the way back to the sentinel.
    assert!(rig.handle.current_stage().await.unwrap().is_none());
    assert!(rig.handle.elapsed().await.unwrap().is_none());
    let status = rig.handle.status().await.unwrap();
    assert_eq!(status.pending_events, 0);

    // Retry succeeds.
    assert!(matches!(
        rig.handle.start(false).await.unwrap(),
        StartOutcome::Started
    ));

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn forced_end_recovers_an_idle_engine() {
    let rig = TestRig::spawn(scenario_table(), FixedSettings::default());

    // Plain end is blocked with nothing running.
    let outcome = rig.handle.end(false).await.unwrap();
    assert!(matches!(outcome, EndOutcome::Blocked(_)));

    // Forced end still runs the procedure as a recovery hammer.
    assert!(matches!(
        rig.handle.end(true).await.unwrap(),
        EndOutcome::Ended
    ));
    assert_eq!(rig.placement.recalls(), 1);

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn scatter_parameters_follow_the_roster() {
    let rig = TestRig::spawn(scenario_table(), FixedSettings::default());
    for (member, group) in [("a1", "red"), ("a2", "red"), ("b1", "blue")] {
        rig.roster.join(MemberId::new(member), GroupId::new(group));
    }

    rig.handle.start(false).await.unwrap();

    let scatters = rig.placement.scatters();
    assert_eq!(scatters.len(), 1);
    let (max_spread, min_spacing) = scatters[0];
    assert!((max_spread - 100.0).abs() < f64::EPSILON, "first stage boundary");
    // by-groups spacing: 100 / sqrt(3 * 2 groups)
    let expected = 100.0 / (3.0 * 2.0_f64).sqrt();
    assert!(
        (min_spacing - expected).abs() < 1e-9,
        "min_spacing={min_spacing}, expected={expected}"
    );

    rig.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn end_resets_the_roster_and_recalls() {
    let rig = TestRig::spawn(scenario_table(), FixedSettings::default());
    rig.roster.join(MemberId::new("alex"), GroupId::new("red"));
    rig.roster.join(MemberId::new("casey"), GroupId::new("blue"));
    rig.handle.start(false).await.unwrap();

    rig.roster.eliminate(&MemberId::new("casey"));
    assert_eq!(rig.roster.alive_groups().len(), 1);

    rig.handle.end(false).await.unwrap();
    assert_eq!(rig.placement.recalls(), 1);
    assert_eq!(rig.roster.alive_groups().len(), 2, "alive flags reset");

    rig.shutdown().await;
}
