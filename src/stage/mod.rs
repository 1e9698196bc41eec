//! Stage catalog and stage-progression state machine.
//!
//! [`table`] holds the immutable ordered catalog of stage definitions with
//! lazy settings resolution; [`machine`] advances a session through it.

pub mod machine;
pub mod table;

pub use machine::{BoundaryOutlook, StageAnnouncement, StageMachine, StagePos, StageSnapshot};
pub use table::{BoundaryShift, StageDef, StageEffect, StageLength, StageTable};
