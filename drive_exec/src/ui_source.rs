//! # UI Event Sources
//!
//! Operator events come either from an interactive console running in its own thread, or from a
//! timed script. Either way they are collected on the control thread with [`UiSource::pending`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::ui::UiEvent;
use log::{error, info, warn};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};
use std::thread;
use util::script_interpreter::{PendingEvents, ScriptError, ScriptInterpreter};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "drive> ";

const HELP: &str = "keys: a/d turn, w/s speed, c centre, x toggle mode, z toggle recording, \
                    e emergency stop, q quit";

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Where operator events come from.
pub enum UiSource {
    /// Events typed at the console, received from the console thread.
    Console(Receiver<UiEvent>),

    /// Events read from a script, released as the session clock passes them.
    Script(ScriptInterpreter),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl UiSource {
    /// Start the console thread, queueing at most `bound` events.
    ///
    /// The thread is detached since it may be blocked reading a line when the executable exits.
    pub fn console(bound: usize) -> Self {
        let (tx, rx) = sync_channel(bound.max(1));

        thread::spawn(move || console_thread(tx));

        UiSource::Console(rx)
    }

    /// Load a script from `path`.
    pub fn script<P: AsRef<Path>>(path: P) -> Result<Self, ScriptError> {
        let si = ScriptInterpreter::new(path)?;

        info!(
            "Loaded script lasts {:.02} s and contains {} events",
            si.get_duration(),
            si.get_num_events()
        );

        Ok(UiSource::Script(si))
    }

    /// Collect every event that is due now.
    ///
    /// A `Quit` is produced when the console goes away or the script runs out.
    pub fn pending(&mut self) -> Vec<UiEvent> {
        match self {
            UiSource::Console(rx) => {
                let mut events = Vec::new();
                loop {
                    match rx.try_recv() {
                        Ok(e) => events.push(e),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            events.push(UiEvent::Quit);
                            break;
                        }
                    }
                }
                events
            }
            UiSource::Script(si) => match si.get_pending_events() {
                PendingEvents::None => vec![],
                PendingEvents::Some(events) => events,
                PendingEvents::EndOfScript => {
                    info!("End of script reached");
                    vec![UiEvent::Quit]
                }
            },
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn console_thread(tx: SyncSender<UiEvent>) {
    let mut rl = match DefaultEditor::new() {
        Ok(r) => r,
        Err(e) => {
            error!("Could not start the console: {}", e);
            return;
        }
    };

    println!("{}", HELP);

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                tx.send(UiEvent::Quit).ok();
                return;
            }
            Err(e) => {
                error!("Console error: {}", e);
                return;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        rl.add_history_entry(line.as_str()).ok();

        let events = match UiEvent::parse_line(&line) {
            Ok(e) => e,
            Err(e) => {
                warn!("{} ({})", e, HELP);
                continue;
            }
        };

        for event in events {
            // The control thread has exited
            if tx.send(event).is_err() {
                return;
            }
            if event == UiEvent::Quit {
                return;
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_console_channel() {
        let (tx, rx) = sync_channel(4);
        let mut source = UiSource::Console(rx);

        tx.send(UiEvent::TurnLeft).unwrap();
        tx.send(UiEvent::ToggleMode).unwrap();
        assert_eq!(
            source.pending(),
            vec![UiEvent::TurnLeft, UiEvent::ToggleMode]
        );
        assert_eq!(source.pending(), vec![]);

        drop(tx);
        assert_eq!(source.pending(), vec![UiEvent::Quit]);
    }
}
