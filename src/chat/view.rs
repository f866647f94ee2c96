//! A render-ready snapshot of a session. Front ends draw this and
//! nothing else, so what they show can't drift from the transcript.
use super::context::{context_range, in_context};
use super::models::{Role, Transcript, TurnHandle};

#[derive(Clone, Debug, PartialEq)]
pub struct TurnView {
    pub index: usize,
    pub handle: TurnHandle,
    pub role: Role,
    pub label: &'static str,
    pub in_context: bool,
    pub edited: bool,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptView {
    pub turns: Vec<TurnView>,
    pub window_size: usize,
    /// First in-context index, equal to the length when none are.
    pub context_start: usize,
}

impl TranscriptView {
    pub fn build(transcript: &Transcript, window_size: usize) -> Self {
        let len = transcript.length();
        let turns = transcript
            .iter()
            .enumerate()
            .filter_map(|(index, turn)| {
                let handle = transcript.handle(index)?;
                Some(TurnView {
                    index,
                    handle,
                    role: turn.role,
                    label: turn.role.label(),
                    in_context: in_context(index, len, window_size),
                    edited: turn.is_edited(),
                    text: turn.display_content.clone(),
                })
            })
            .collect();

        Self {
            turns,
            window_size,
            context_start: context_range(len, window_size).start,
        }
    }

    pub fn in_context_count(&self) -> usize {
        self.turns.len() - self.context_start
    }

    /// One line describing how much of the conversation the model
    /// will see.
    pub fn summary(&self) -> String {
        let len = self.turns.len();
        match self.in_context_count() {
            0 if len == 0 => format!("No messages yet (context size {})", self.window_size),
            0 => format!(
                "No history in context, only the next message is sent ({} messages)",
                len
            ),
            n if n == len => format!("All {} messages in context", len),
            n => format!(
                "Messages {}-{} of {} in context, {} out of context",
                self.context_start + 1,
                len,
                len,
                len - n
            ),
        }
    }
}
