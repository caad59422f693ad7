// src/console.rs
//
// Operator input for interactive manual sessions. Commands arrive without
// blocking the frame loop: the stdin console reads lines on its own thread
// and hands parsed commands over a channel.

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Pause,
    Resume,
    SendNow,
    Quit,
}

impl OperatorCommand {
    /// Accepts the single-letter shortcuts and the full words, any case.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(Self::Pause),
            "r" | "resume" => Some(Self::Resume),
            "s" | "send" | "send-now" => Some(Self::SendNow),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

pub trait OperatorConsole {
    /// Next pending command, without waiting.
    fn poll(&mut self) -> Option<OperatorCommand>;

    /// True once no further command can ever arrive.
    fn is_closed(&self) -> bool {
        false
    }
}

pub struct StdinConsole {
    rx: Receiver<OperatorCommand>,
    closed: bool,
}

impl StdinConsole {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name("operator-console".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    match OperatorCommand::parse(&line) {
                        Some(cmd) => {
                            if tx.send(cmd).is_err() {
                                break;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => warn!("Unknown command '{}' (p/r/s/q)", line.trim()),
                    }
                }
            });

        let closed = match spawned {
            Ok(_) => {
                info!("⌨️  Operator console: [p]ause, [r]esume, [s]end now, [q]uit");
                false
            }
            Err(e) => {
                warn!("⚠️  Operator console unavailable: {}", e);
                true
            }
        };

        Self { rx, closed }
    }
}

impl OperatorConsole for StdinConsole {
    fn poll(&mut self) -> Option<OperatorCommand> {
        if self.closed {
            return None;
        }
        match self.rx.try_recv() {
            Ok(cmd) => Some(cmd),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Replays a fixed sequence of poll results. `None` entries are polls that
/// find nothing; the console closes once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    script: VecDeque<Option<OperatorCommand>>,
}

impl ScriptedConsole {
    pub fn new(script: impl IntoIterator<Item = Option<OperatorCommand>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl OperatorConsole for ScriptedConsole {
    fn poll(&mut self) -> Option<OperatorCommand> {
        self.script.pop_front().flatten()
    }

    fn is_closed(&self) -> bool {
        self.script.is_empty()
    }
}
