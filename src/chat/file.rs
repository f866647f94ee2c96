//! Saving and loading a conversation as JSON.
//!
//! ```json
//! {
//!   "history": [{"role": "user", "content": "..."}],
//!   "system_message": "...",
//!   "settings": {"temperature": "1.0", "max_tokens": "1024", "context_size": "10"},
//!   "pdf": {"path": "/path/to/doc.pdf", "data": "<base64>"}
//! }
//! ```
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::error::ChatError;
use super::models::{Role, Transcript, Turn};
use super::settings::{Attachment, ContextConfig};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

// Load defaults differ from `ContextConfig::default()`: a file with no
// saved temperature comes back at 0.7, not 1.0.
fn default_temperature() -> String {
    String::from("0.7")
}

fn default_max_tokens() -> String {
    String::from("1024")
}

fn default_context_size() -> String {
    String::from("10")
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SavedSettings {
    #[serde(default = "default_temperature")]
    pub temperature: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: String,
    #[serde(default = "default_context_size")]
    pub context_size: String,
}

impl Default for SavedSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            context_size: default_context_size(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SavedPdf {
    pub path: Option<String>,
    pub data: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ConversationFile {
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub system_message: String,
    #[serde(default)]
    pub settings: SavedSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<SavedPdf>,
}

impl ConversationFile {
    /// Snapshot of a session. History is written as it currently
    /// reads, edits included.
    pub fn capture(transcript: &Transcript, config: &ContextConfig) -> Self {
        let history = transcript
            .iter()
            .map(|turn| HistoryEntry {
                role: turn.role,
                content: turn.display_content.clone(),
            })
            .collect();
        let pdf = config.attachment.as_ref().map(|a| SavedPdf {
            path: a.path.as_ref().map(|p| p.display().to_string()),
            data: Some(STANDARD.encode(&a.data)),
        });

        Self {
            history,
            system_message: config.system_prompt.clone(),
            settings: SavedSettings {
                temperature: config.temperature.clone(),
                max_tokens: config.max_output_tokens.clone(),
                context_size: config.window_size.to_string(),
            },
            pdf,
        }
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.history
            .iter()
            .map(|entry| Turn::new(entry.role, &entry.content))
            .collect()
    }

    /// The saved attachment, but only if the file it came from is
    /// still on disk.
    pub fn attachment(&self) -> Result<Option<Attachment>, ChatError> {
        let Some(pdf) = &self.pdf else {
            return Ok(None);
        };
        let Some(path) = pdf.path.as_ref().map(PathBuf::from) else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::info!("Dropping attachment {}, file is gone", path.display());
            return Ok(None);
        }

        let data = match &pdf.data {
            Some(encoded) => STANDARD.decode(encoded)?,
            None => fs::read(&path)?,
        };

        Ok(Some(Attachment {
            path: Some(path),
            data,
        }))
    }
}

pub fn save(path: &Path, conversation: &ConversationFile) -> Result<(), ChatError> {
    let json = serde_json::to_string(conversation)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load(path: &Path) -> Result<ConversationFile, ChatError> {
    let json = fs::read_to_string(path)?;
    let conversation = serde_json::from_str(&json)?;
    Ok(conversation)
}
