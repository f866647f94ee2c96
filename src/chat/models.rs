//! The core models for keeping a conversation with an LLM: who said
//! what, in which order, and what it reads as after any edits.
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ChatError;
use crate::anthropic;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    /// Notices generated locally by the client, e.g. errors. These
    /// are never sent to the model.
    #[serde(rename = "system")]
    System,
}

impl Role {
    /// Role as it is spoken to the model, `None` for local notices.
    pub fn wire(self) -> Option<anthropic::Role> {
        match self {
            Role::User => Some(anthropic::Role::User),
            Role::Assistant => Some(anthropic::Role::Assistant),
            Role::System => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Claude",
            Role::System => "System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Turn {
    pub role: Role,
    /// Text as originally appended.
    pub content: String,
    /// Text as currently shown, including edits.
    pub display_content: String,
}

impl Turn {
    pub fn new(role: Role, content: &str) -> Self {
        Turn {
            role,
            content: content.to_string(),
            display_content: content.to_string(),
        }
    }

    pub fn is_edited(&self) -> bool {
        self.content != self.display_content
    }
}

/// Identifies a turn in one particular incarnation of a transcript.
/// Handles taken before a reset or load go stale and edits made
/// through them are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnHandle {
    generation: u64,
    index: usize,
}

impl TurnHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Default, Debug)]
pub struct Transcript {
    turns: Vec<Turn>,
    generation: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            generation: 0,
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn)
    }

    pub fn get(&self, index: usize) -> Result<&Turn, ChatError> {
        self.turns.get(index).ok_or(ChatError::IndexOutOfRange {
            index,
            len: self.turns.len(),
        })
    }

    /// Overwrites what a turn reads as. Out of range indices are
    /// ignored: they come from views that no longer match the log.
    pub fn set_display_content(&mut self, index: usize, text: &str) {
        match self.turns.get_mut(index) {
            Some(turn) => turn.display_content = text.to_string(),
            None => tracing::debug!(
                "Ignoring edit of turn {} in a transcript of {} turns",
                index,
                self.turns.len()
            ),
        }
    }

    pub fn length(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn reset(&mut self) {
        self.turns.clear();
        self.generation += 1;
    }

    /// Swaps in a whole new log, e.g. one loaded from disk.
    pub fn replace(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handle(&self, index: usize) -> Option<TurnHandle> {
        (index < self.turns.len()).then_some(TurnHandle {
            generation: self.generation,
            index,
        })
    }

    /// Returns whether the edit was applied.
    pub fn edit(&mut self, handle: TurnHandle, text: &str) -> bool {
        if handle.generation != self.generation || handle.index >= self.turns.len() {
            tracing::debug!("Ignoring edit through stale handle {:?}", handle);
            return false;
        }
        self.set_display_content(handle.index, text);
        true
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}
