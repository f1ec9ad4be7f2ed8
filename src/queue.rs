//! Commands deferred while a flush is in flight
//!
//! One FIFO per origin. Draining yields every config-origin command first,
//! then every state-origin command, each in arrival order.

use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandOrigin {
    /// Local web UI, `{event, data}` envelope
    Config,
    /// Remote pub/sub, flat object
    State,
}

impl fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOrigin::Config => write!(f, "config"),
            CommandOrigin::State => write!(f, "state"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub payload: String,
    pub origin: CommandOrigin,
    /// Arrival order across both queues
    pub sequence: u64,
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    config: VecDeque<PendingCommand>,
    state: VecDeque<PendingCommand>,
    next_sequence: u64,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, origin: CommandOrigin, payload: impl Into<String>) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let command = PendingCommand {
            payload: payload.into(),
            origin,
            sequence,
        };
        match origin {
            CommandOrigin::Config => self.config.push_back(command),
            CommandOrigin::State => self.state.push_back(command),
        }
        sequence
    }

    pub fn len(&self) -> usize {
        self.config.len() + self.state.len()
    }

    pub fn len_of(&self, origin: CommandOrigin) -> usize {
        match origin {
            CommandOrigin::Config => self.config.len(),
            CommandOrigin::State => self.state.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty() && self.state.is_empty()
    }

    /// Take everything: config queue fully, then state queue fully
    pub fn drain(&mut self) -> Vec<PendingCommand> {
        self.config.drain(..).chain(self.state.drain(..)).collect()
    }
}
