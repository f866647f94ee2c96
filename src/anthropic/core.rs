use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct DocumentSource {
    pub r#type: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "document")]
    Document { source: DocumentSource },
    #[serde(rename = "text")]
    Text { text: String },
}

impl ContentPart {
    /// A base64 encoded PDF document block.
    pub fn pdf(bytes: &[u8]) -> Self {
        ContentPart::Document {
            source: DocumentSource {
                r#type: String::from("base64"),
                media_type: String::from("application/pdf"),
                data: STANDARD.encode(bytes),
            },
        }
    }

    pub fn text(text: &str) -> Self {
        ContentPart::Text {
            text: text.to_string(),
        }
    }
}

// The API accepts either a bare string or a list of typed blocks for
// `content` so this serializes untagged to match.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: MessageContent::Text(content.to_string()),
        }
    }

    pub fn new_with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Message {
            role,
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// The seam between a chat session and whatever answers it. The
/// session only ever has one request outstanding.
#[async_trait]
pub trait ModelClient {
    async fn send(&self, request: &MessagesRequest) -> Result<Value, Error>;
}

pub type BoxedModelClient = Box<dyn ModelClient + Send + Sync + 'static>;

#[derive(Clone, Debug)]
pub struct AnthropicClient {
    api_hostname: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_hostname: &str, api_key: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn send(&self, request: &MessagesRequest) -> Result<Value, Error> {
        messages(request, &self.api_hostname, &self.api_key).await
    }
}

pub async fn messages(
    request: &MessagesRequest,
    api_hostname: &str,
    api_key: &str,
) -> Result<Value, Error> {
    let url = format!("{}/v1/messages", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 10))
        .json(request)
        .send()
        .await?;

    let status = response.status();
    let body: Value = response.json().await?;

    if !status.is_success() {
        // Error bodies look like {"type":"error","error":{"type":..,"message":..}}
        let reason = body["error"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        tracing::error!("Messages request failed with {}: {}", status, reason);
        return Err(anyhow!("{} {}", status, reason));
    }

    Ok(body)
}

/// Turns whatever the model replied with into displayable text.
///
/// A full response object is unwrapped to its `content` field first.
/// Never fails: when no text can be found anywhere the JSON of the
/// whole reply is returned.
pub fn decode_reply(reply: &Value) -> String {
    let content = match reply {
        Value::Object(obj) if obj.contains_key("content") => &reply["content"],
        _ => reply,
    };

    match content {
        Value::String(s) => return s.clone(),
        Value::Object(_) => {
            if let Some(text) = content["text"].as_str() {
                return text.to_string();
            }
        }
        Value::Array(blocks) => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter_map(|block| match block {
                    Value::String(s) => Some(s.as_str()),
                    _ => block["text"].as_str(),
                })
                .collect();
            if !texts.is_empty() {
                return texts.join(" ");
            }
        }
        _ => {}
    }

    reply.to_string()
}
