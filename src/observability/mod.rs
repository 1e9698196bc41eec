//! Observability: tracing setup and the typed JSONL event stream.

pub mod events;
pub mod logging;

pub use events::{EmittingAnnouncer, Event, EventEmitter};
pub use logging::{LogFormat, init_logging, verbosity_to_directive};
