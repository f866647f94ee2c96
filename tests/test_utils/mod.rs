//! Test utilities for integration tests
use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};

use ctxchat::anthropic::{ContentPart, MessageContent, MessagesRequest, ModelClient};
use ctxchat::chat::{ChatBuilder, ChatSession, Role, Turn};

/// A model client that remembers every request it was sent and
/// answers with a fixed reply, or fails when `reply` is `None`.
#[derive(Clone, Default)]
pub struct RecordingClient {
    pub requests: Arc<Mutex<Vec<MessagesRequest>>>,
    pub reply: Option<Value>,
}

impl RecordingClient {
    pub fn replying(text: &str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            reply: Some(json!({
                "id": "msg_test",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": text}]
            })),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> MessagesRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("No request was sent")
    }
}

#[async_trait]
impl ModelClient for RecordingClient {
    async fn send(&self, request: &MessagesRequest) -> Result<Value, Error> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("503 Service Unavailable overloaded"))
    }
}

/// A session over `n` alternating user/assistant turns named
/// "turn 0", "turn 1", ...
pub fn session_with_turns(client: &RecordingClient, n: usize) -> ChatSession {
    let turns = (0..n)
        .map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            Turn::new(role, &format!("turn {}", i))
        })
        .collect();

    ChatBuilder::new("claude-test")
        .client(Box::new(client.clone()))
        .transcript(turns)
        .build()
}

/// The text of every message in a request, with attachments shown
/// as `<pdf>`.
pub fn request_texts(request: &MessagesRequest) -> Vec<String> {
    request
        .messages
        .iter()
        .map(|m| match &m.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Document { .. } => String::from("<pdf>"),
                    ContentPart::Text { text } => text.clone(),
                })
                .collect::<Vec<_>>()
                .join("+"),
        })
        .collect()
}
