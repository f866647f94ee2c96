//! Deciding which turns are "in context" and building the request
//! that goes to the model.
//!
//! Membership is a pure function of the turn index, the transcript
//! length and the window size. It is recomputed from the transcript
//! every time rather than remembered by whatever is rendering it,
//! because the length and the window size change independently.
use std::ops::Range;

use super::models::{Transcript, Turn};
use super::settings::{Attachment, Sampling};
use crate::anthropic::{ContentPart, Message, MessagesRequest, Role};

/// Whether turn `index` of a transcript with `len` turns falls inside
/// a window of the last `window_size` turns.
pub fn in_context(index: usize, len: usize, window_size: usize) -> bool {
    index < len && index.saturating_add(window_size) >= len
}

/// The in-context suffix of `[0, len)` as a range.
pub fn context_range(len: usize, window_size: usize) -> Range<usize> {
    len.saturating_sub(window_size)..len
}

pub fn context_turns(transcript: &Transcript, window_size: usize) -> &[Turn] {
    &transcript.turns()[context_range(transcript.length(), window_size)]
}

/// Renders in-context turns as they currently read. Local notices take
/// up a slot in the window but are not something the model said or
/// was told, so they are left out.
pub fn context_messages(transcript: &Transcript, window_size: usize) -> Vec<Message> {
    context_turns(transcript, window_size)
        .iter()
        .filter_map(|turn| {
            turn.role
                .wire()
                .map(|role| Message::new(role, &turn.display_content))
        })
        .collect()
}

/// The new user message, carrying the attachment when there is one.
pub fn outgoing_message(text: &str, attachment: Option<&Attachment>) -> Message {
    match attachment {
        Some(attachment) => Message::new_with_parts(
            Role::User,
            vec![ContentPart::pdf(&attachment.data), ContentPart::text(text)],
        ),
        None => Message::new(Role::User, text),
    }
}

/// Builds the full request for sending `text` next. `transcript` must
/// not yet contain the new turn.
pub fn build_request(
    transcript: &Transcript,
    window_size: usize,
    text: &str,
    attachment: Option<&Attachment>,
    sampling: Sampling,
    system: Option<String>,
    model: &str,
) -> MessagesRequest {
    let mut messages = if window_size == 0 {
        Vec::new()
    } else {
        context_messages(transcript, window_size)
    };
    messages.push(outgoing_message(text, attachment));

    MessagesRequest {
        model: model.to_string(),
        max_tokens: sampling.max_tokens,
        temperature: sampling.temperature,
        messages,
        system,
    }
}
