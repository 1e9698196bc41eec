//! Structured event stream.
//!
//! Discrete, typed events emitted during engine operation. Events are
//! serialized as newline-delimited JSON (JSONL) and include a monotonically
//! increasing sequence number for ordering guarantees.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::hooks::{Announcer, Notice};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during engine operation.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The engine task has started.
    EngineStarted {
        /// When the engine started.
        timestamp: DateTime<Utc>,
        /// Number of stages in the table.
        stages: usize,
    },

    /// A session started.
    SessionStarted {
        /// When the session started.
        timestamp: DateTime<Utc>,
    },

    /// A session ended.
    SessionEnded {
        /// When the session ended.
        timestamp: DateTime<Utc>,
    },

    /// A new stage was entered.
    StageEntered {
        /// When the transition occurred.
        timestamp: DateTime<Utc>,
        /// Entered stage id.
        stage: String,
        /// Whether this is the terminal stage.
        terminal: bool,
    },

    /// The grace period ended.
    GracePeriodEnded {
        /// When it ended.
        timestamp: DateTime<Utc>,
    },

    /// The final heal fired.
    FinalHeal {
        /// When it fired.
        timestamp: DateTime<Utc>,
    },

    /// A win was declared.
    VictoryDeclared {
        /// When the decision latched.
        timestamp: DateTime<Utc>,
        /// Winning group.
        group: String,
        /// Living, reachable members of the winning group.
        members: Vec<String>,
    },

    /// The bonus round began.
    BonusRound {
        /// When it began.
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// Maps an engine announcement to its event form, stamped with `now`.
    #[must_use]
    pub fn from_notice(notice: &Notice, now: DateTime<Utc>) -> Self {
        match notice {
            Notice::Stage(announcement) => Self::StageEntered {
                timestamp: now,
                stage: announcement.stage.clone(),
                terminal: announcement.terminal,
            },
            Notice::GracePeriodEnded => Self::GracePeriodEnded { timestamp: now },
            Notice::FinalHeal => Self::FinalHeal { timestamp: now },
            Notice::Victory { group, members } => Self::VictoryDeclared {
                timestamp: now,
                group: group.to_string(),
                members: members.iter().map(ToString::to_string).collect(),
            },
            Notice::BonusRound => Self::BonusRound { timestamp: now },
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are silently dropped
/// because observability must never crash the engine.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Emits to an arbitrary writer.
    #[must_use]
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Emits to a file, created or truncated.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be created.
    pub fn to_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::to_writer(Box::new(file)))
    }

    /// Writes one event as a JSON line and flushes.
    pub fn emit(&self, event: Event) {
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            event,
        };
        let Ok(line) = serde_json::to_string(&envelope) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }
}

// ---------------------------------------------------------------------------
// Emitting announcer
// ---------------------------------------------------------------------------

/// Announcer decorator that mirrors every notice into the event stream
/// before forwarding it.
pub struct EmittingAnnouncer {
    inner: Arc<dyn Announcer>,
    emitter: Arc<EventEmitter>,
}

impl EmittingAnnouncer {
    /// Wraps an announcer with an event emitter.
    #[must_use]
    pub fn new(inner: Arc<dyn Announcer>, emitter: Arc<EventEmitter>) -> Self {
        Self { inner, emitter }
    }
}

impl Announcer for EmittingAnnouncer {
    fn announce(&self, notice: Notice) {
        self.emitter.emit(Event::from_notice(&notice, Utc::now()));
        self.inner.announce(notice);
    }
}

impl std::fmt::Debug for EmittingAnnouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmittingAnnouncer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::GroupId;
    use crate::hooks::sim::RecordingAnnouncer;
    use std::sync::mpsc;

    /// Writer that forwards lines through a channel for inspection.
    struct ChannelWriter(mpsc::Sender<Vec<u8>>);

    impl Write for ChannelWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let _ = self.0.send(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn emitter_with_channel() -> (EventEmitter, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        (EventEmitter::to_writer(Box::new(ChannelWriter(tx))), rx)
    }

    fn collect_lines(rx: &mpsc::Receiver<Vec<u8>>) -> Vec<serde_json::Value> {
        let mut bytes = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            bytes.extend(chunk);
        }
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn events_carry_increasing_sequence_numbers() {
        let (emitter, rx) = emitter_with_channel();
        emitter.emit(Event::SessionStarted {
            timestamp: Utc::now(),
        });
        emitter.emit(Event::SessionEnded {
            timestamp: Utc::now(),
        });

        let lines = collect_lines(&rx);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "SessionStarted");
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["type"], "SessionEnded");
    }

    #[test]
    fn notice_mapping_preserves_stage_fields() {
        let notice = Notice::Victory {
            group: GroupId::new("red"),
            members: vec![],
        };
        let event = Event::from_notice(&notice, Utc::now());
        let Event::VictoryDeclared { group, members, .. } = event else {
            panic!("wrong mapping");
        };
        assert_eq!(group, "red");
        assert!(members.is_empty());
    }

    #[test]
    fn emitting_announcer_mirrors_and_forwards() {
        let (emitter, rx) = emitter_with_channel();
        let inner = Arc::new(RecordingAnnouncer::default());
        let announcer = EmittingAnnouncer::new(
            Arc::clone(&inner) as Arc<dyn Announcer>,
            Arc::new(emitter),
        );

        announcer.announce(Notice::GracePeriodEnded);

        assert_eq!(inner.notices(), vec![Notice::GracePeriodEnded]);
        let lines = collect_lines(&rx);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "GracePeriodEnded");
    }
}
