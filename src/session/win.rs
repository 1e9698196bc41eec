//! Win detection.
//!
//! Elimination events can arrive in rapid, overlapping succession — several
//! members of the losing group may fall in the same tick — so the evaluator
//! latches before returning a decision and is a no-op ever after.

use tracing::info;

use crate::hooks::{AliveGroup, GroupId, MemberId};
use crate::session::state::Session;

/// One-time victory decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Victory {
    /// The winning group.
    pub group: GroupId,
    /// Its living, reachable members. Empty when the sole survivor
    /// disconnected before the decision.
    pub members: Vec<MemberId>,
}

/// Inspects group-alive state and latches a victory exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinEvaluator;

impl WinEvaluator {
    /// Evaluates the current alive-group state.
    ///
    /// Returns a [`Victory`] exactly once per session: when the latch is
    /// not yet set and exactly one group remains. Zero or multiple groups
    /// leave the latch untouched. Idempotent under repeated invocation with
    /// the same input.
    pub fn evaluate(self, session: &mut Session, alive: &[AliveGroup]) -> Option<Victory> {
        if session.win_latched {
            return None;
        }
        let [winner] = alive else {
            return None;
        };

        session.win_latched = true;
        info!(group = %winner.id, members = winner.online.len(), "win condition latched");
        Some(Victory {
            group: winner.id.clone(),
            members: winner.online.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, members: &[&str]) -> AliveGroup {
        AliveGroup {
            id: GroupId::new(id),
            online: members.iter().map(|m| MemberId::new(*m)).collect(),
        }
    }

    #[test]
    fn latches_on_single_group() {
        let mut session = Session::new();
        let victory = WinEvaluator
            .evaluate(&mut session, &[group("red", &["alex", "brook"])])
            .unwrap();
        assert_eq!(victory.group, GroupId::new("red"));
        assert_eq!(victory.members.len(), 2);
        assert!(session.win_latched);
    }

    #[test]
    fn second_call_is_noop() {
        let mut session = Session::new();
        let alive = [group("red", &["alex"])];
        assert!(WinEvaluator.evaluate(&mut session, &alive).is_some());
        assert!(WinEvaluator.evaluate(&mut session, &alive).is_none());
        assert!(WinEvaluator.evaluate(&mut session, &alive).is_none());
    }

    #[test]
    fn no_decision_with_multiple_groups() {
        let mut session = Session::new();
        let alive = [group("red", &["alex"]), group("blue", &["casey"])];
        assert!(WinEvaluator.evaluate(&mut session, &alive).is_none());
        assert!(!session.win_latched);
    }

    #[test]
    fn no_decision_with_zero_groups() {
        let mut session = Session::new();
        assert!(WinEvaluator.evaluate(&mut session, &[]).is_none());
        assert!(!session.win_latched);
    }

    #[test]
    fn sole_survivor_may_be_offline() {
        let mut session = Session::new();
        let victory = WinEvaluator.evaluate(&mut session, &[group("red", &[])]).unwrap();
        assert_eq!(victory.group, GroupId::new("red"));
        assert!(victory.members.is_empty());
    }

    #[test]
    fn latch_survives_shrinking_input() {
        // A burst of notifications for the same elimination wave.
        let mut session = Session::new();
        let two = [group("red", &["alex"]), group("blue", &["casey"])];
        let one = [group("red", &["alex"])];
        assert!(WinEvaluator.evaluate(&mut session, &two).is_none());
        assert!(WinEvaluator.evaluate(&mut session, &one).is_some());
        assert!(WinEvaluator.evaluate(&mut session, &one).is_none());
        assert!(WinEvaluator.evaluate(&mut session, &two).is_none());
    }
}
