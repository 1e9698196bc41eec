//! `ringmaster run` — the engine wired to in-memory simulators, driven by
//! a line-based admin console on stdin.
//!
//! Console commands:
//!
//! ```text
//! join <member> <group>     add a combatant to a group
//! unassigned <n>            pretend n combatants have no group yet
//! start [force]             start the session
//! end [force]               end the session
//! kill <member>             eliminate a combatant
//! skip                      force the next stage
//! status                    print session status
//! grace                     print whether the grace period is active
//! quit                      stop the engine and exit
//! ```

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::cli::args::RunArgs;
use crate::config::{self, SharedSettings};
use crate::error::RingmasterError;
use crate::hooks::sim::{SimPlacement, SimPlayfield, SimRoster};
use crate::hooks::{Announcer, GroupId, Hooks, MemberId, Notice, Roster};
use crate::observability::{EmittingAnnouncer, EventEmitter};
use crate::session::{EndOutcome, MatchEngine, MatchHandle, StartOutcome};
use crate::stage::{BoundaryOutlook, StageTable};

/// Announcer that renders notices for a terminal. This is the embedding's
/// half of the contract: the engine hands over structure, the console picks
/// the words.
struct ConsoleAnnouncer;

impl Announcer for ConsoleAnnouncer {
    fn announce(&self, notice: Notice) {
        match notice {
            Notice::Stage(a) => {
                let boundary = match a.boundary {
                    BoundaryOutlook::Holding => "boundary holding".to_string(),
                    BoundaryOutlook::Closing { target, over } => format!(
                        "boundary closing to {target} over {}",
                        humantime::format_duration(over)
                    ),
                    BoundaryOutlook::Snapped { target } => {
                        format!("boundary snapped to {target}")
                    }
                    BoundaryOutlook::ClosingNext { target } => {
                        format!("boundary closes to {target} next stage")
                    }
                };
                let length = a.length.map_or_else(
                    || "open-ended".to_string(),
                    |d| humantime::format_duration(d).to_string(),
                );
                let tail = if a.final_stage_next {
                    " — the showdown is next"
                } else {
                    ""
                };
                println!(">> stage '{}' ({length}); {boundary}{tail}", a.stage);
            }
            Notice::GracePeriodEnded => println!(">> the grace period is over"),
            Notice::FinalHeal => println!(">> final heal"),
            Notice::Victory { group, members } => {
                if members.is_empty() {
                    println!(">> {group} wins (no members reachable)");
                } else {
                    let names: Vec<String> = members.iter().map(ToString::to_string).collect();
                    println!(">> {group} wins: {}", names.join(", "));
                }
            }
            Notice::BonusRound => println!(">> bonus round!"),
        }
    }
}

/// Runs the engine with an admin console until `quit` or EOF.
///
/// # Errors
///
/// Returns configuration errors from `--config` loading, I/O errors from
/// the event stream file or stdin.
pub async fn run(args: &RunArgs) -> Result<(), RingmasterError> {
    let table = StageTable::standard();

    let settings = match &args.config {
        Some(path) => {
            let loaded = config::load_file(path, &table)?;
            for warning in &loaded.warnings {
                warn!(%warning, "configuration warning");
            }
            SharedSettings::new((*loaded.settings).clone())
        }
        None => SharedSettings::default(),
    };

    let console: Arc<dyn Announcer> = Arc::new(ConsoleAnnouncer);
    let announcer: Arc<dyn Announcer> = match &args.events {
        Some(path) => {
            let emitter = EventEmitter::to_file(path)?;
            Arc::new(EmittingAnnouncer::new(console, Arc::new(emitter)))
        }
        None => console,
    };

    let roster = Arc::new(SimRoster::default());
    let hooks = Hooks {
        settings: Arc::new(settings),
        playfield: Arc::new(SimPlayfield::default()),
        announcer,
        placement: Arc::new(SimPlacement::default()),
        roster: Arc::clone(&roster) as _,
    };

    let (handle, task) = MatchEngine::spawn(table, hooks);
    console_loop(&handle, &roster).await?;
    handle.shutdown();
    let _ = task.await;
    Ok(())
}

async fn console_loop(handle: &MatchHandle, roster: &Arc<SimRoster>) -> Result<(), RingmasterError> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    println!("ringmaster console — type 'help' for commands");
    while let Some(line) = lines.next_line().await? {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["help"] => print_help(),
            ["join", member, group] => {
                roster.join(MemberId::new(*member), GroupId::new(*group));
                println!("{member} joined {group}");
            }
            ["unassigned", n] => match n.parse::<usize>() {
                Ok(count) => {
                    roster.set_unassigned(count);
                    println!("{count} unassigned combatant(s)");
                }
                Err(_) => println!("usage: unassigned <n>"),
            },
            ["start", rest @ ..] => {
                let force = rest == ["force"];
                match handle.start(force).await {
                    Ok(StartOutcome::Started) => println!("session started"),
                    Ok(StartOutcome::Blocked(failures)) => {
                        for failure in failures {
                            println!("blocked: {failure}");
                        }
                    }
                    Ok(StartOutcome::RolledBack(failure)) => println!("{failure}"),
                    Err(err) => println!("error: {err}"),
                }
            }
            ["end", rest @ ..] => {
                let force = rest == ["force"];
                match handle.end(force).await {
                    Ok(EndOutcome::Ended) => println!("session ended"),
                    Ok(EndOutcome::Blocked(failures)) => {
                        for failure in failures {
                            println!("blocked: {failure}");
                        }
                    }
                    Ok(EndOutcome::RolledBack(failure)) => println!("{failure}"),
                    Err(err) => println!("error: {err}"),
                }
            }
            ["kill", member] => {
                let member = MemberId::new(*member);
                if roster.eliminate(&member) {
                    println!("{member} eliminated");
                    handle.notify_elimination(roster.alive_groups());
                } else {
                    println!("unknown member: {member}");
                }
            }
            ["skip"] => {
                if handle.skip_stage().await.unwrap_or(false) {
                    println!("stage skipped");
                } else {
                    println!("nothing to skip");
                }
            }
            ["status"] => match handle.status().await {
                Ok(status) => print_status(&status),
                Err(err) => println!("error: {err}"),
            },
            ["grace"] => {
                let active = handle.in_grace_period().await.unwrap_or(false);
                println!("grace period {}", if active { "active" } else { "inactive" });
            }
            ["quit" | "exit"] => break,
            other => println!("unknown command: {:?} (try 'help')", other.join(" ")),
        }
    }
    Ok(())
}

fn print_status(status: &crate::session::StatusReport) {
    match &status.stage {
        Some(stage) => {
            let length = stage.length.map_or_else(
                || "open-ended".to_string(),
                |d| humantime::format_duration(d).to_string(),
            );
            println!(
                "stage '{}' (#{}) — length {length}, boundary {}",
                stage.id, stage.ordinal, stage.boundary
            );
        }
        None => println!("no session running"),
    }
    if let Some(elapsed) = status.elapsed {
        println!("elapsed: {}", humantime::format_duration(elapsed));
    }
    if let Some(remaining) = status.remaining {
        println!("stage time left: {}", humantime::format_duration(remaining));
    }
    println!(
        "pending events: {}; win latched: {}",
        status.pending_events, status.win_latched
    );
}

fn print_help() {
    println!("  join <member> <group>   add a combatant to a group");
    println!("  unassigned <n>          pretend n combatants have no group");
    println!("  start [force]           start the session");
    println!("  end [force]             end the session");
    println!("  kill <member>           eliminate a combatant");
    println!("  skip                    force the next stage");
    println!("  status                  print session status");
    println!("  grace                   print grace-period state");
    println!("  quit                    stop the engine and exit");
}
