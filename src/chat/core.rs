use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::context::build_request;
use super::file::{self, ConversationFile};
use super::models::{Role, Transcript, Turn, TurnHandle};
use super::settings::{Attachment, ContextConfig, parse_window_size};
use super::view::TranscriptView;
use crate::anthropic::{BoxedModelClient, decode_reply};
use crate::core::DEFAULT_API_KEY_PATH;

/// How long a first "new chat" press waits for its confirmation.
pub const NEW_CHAT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

const API_KEY_NEEDED: &str = "Anthropic API key needed! Paste your key into";
const API_KEY_CONSOLE_URL: &str = "https://console.anthropic.com/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewChat {
    /// First press, waiting for a second one.
    Armed,
    /// Second press inside the window, the session was cleared.
    Reset,
}

/// Two-step confirmation for throwing a conversation away.
#[derive(Debug, Clone)]
pub struct ResetGuard {
    armed_at: Option<Instant>,
    timeout: Duration,
}

impl ResetGuard {
    pub fn new(timeout: Duration) -> Self {
        Self {
            armed_at: None,
            timeout,
        }
    }

    pub fn press(&mut self, now: Instant) -> NewChat {
        match self.armed_at.take() {
            Some(at) if now.duration_since(at) <= self.timeout => NewChat::Reset,
            _ => {
                self.armed_at = Some(now);
                NewChat::Armed
            }
        }
    }

    pub fn is_armed(&self, now: Instant) -> bool {
        self.armed_at
            .is_some_and(|at| now.duration_since(at) <= self.timeout)
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }
}

impl Default for ResetGuard {
    fn default() -> Self {
        Self::new(NEW_CHAT_CONFIRM_TIMEOUT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send.
    Ignored,
    /// The model answered and the reply was appended.
    Replied,
    /// A diagnostic was appended instead of a reply.
    Failed,
}

/// One conversation with the model and everything that decides what
/// gets sent on the next turn.
///
/// Every mutation goes through `&mut self` so there is never more than
/// one request in flight and a view built afterwards always matches the
/// transcript.
///
/// Use `ChatBuilder` to construct a `ChatSession`.
pub struct ChatSession {
    id: Uuid,
    model: String,
    client: Option<BoxedModelClient>,
    api_key_path: PathBuf,
    transcript: Transcript,
    config: ContextConfig,
    reset_guard: ResetGuard,
    loaded_from: Option<PathBuf>,
}

impl ChatSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The conversation file this session was last loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    pub fn view(&self) -> TranscriptView {
        TranscriptView::build(&self.transcript, self.config.window_size)
    }

    /// Appends a local diagnostic turn.
    pub fn notice(&mut self, text: &str) {
        tracing::warn!(session_id = %self.id, "{}", text);
        self.transcript.append(Turn::new(Role::System, text));
    }

    /// Sends `text` as the next user turn and appends whatever comes
    /// back. Failures end up in the transcript, never as an error.
    pub async fn send(&mut self, text: &str) -> SendOutcome {
        if self.client.is_none() {
            let msg = format!(
                "Cannot send message: No valid API key found. Please add your API key to {}",
                self.api_key_path.display()
            );
            self.notice(&msg);
            return SendOutcome::Failed;
        }

        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        // The request is built from the log as it stood before this
        // turn, the new turn is added to it separately.
        let request = self.config.sampling().map(|sampling| {
            build_request(
                &self.transcript,
                self.config.window_size,
                text,
                self.config.attachment.as_ref(),
                sampling,
                self.config.system(),
                &self.model,
            )
        });

        // The user turn stays even when the settings turn out invalid
        // so it can be resent after fixing them.
        self.transcript.append(Turn::new(Role::User, text));

        let request = match request {
            Ok(request) => request,
            Err(e) => {
                self.notice(&format!("Error: {}", e));
                return SendOutcome::Failed;
            }
        };

        tracing::debug!(
            session_id = %self.id,
            messages = request.messages.len(),
            window_size = self.config.window_size,
            attachment = self.config.attachment.is_some(),
            "Sending messages request"
        );

        let result = match &self.client {
            Some(client) => client.send(&request).await,
            None => return SendOutcome::Failed,
        };

        match result {
            Ok(resp) => {
                let reply = decode_reply(&resp);
                self.transcript.append(Turn::new(Role::Assistant, &reply));
                SendOutcome::Replied
            }
            Err(e) => {
                self.notice(&format!("Error: {}", e));
                SendOutcome::Failed
            }
        }
    }

    /// Commits an edit to a turn's text. Out of range indices are
    /// ignored.
    pub fn edit(&mut self, index: usize, text: &str) {
        self.transcript.set_display_content(index, text.trim_end());
    }

    /// Commits an edit through a handle taken from a view. Returns
    /// false when the handle belongs to a transcript that has since
    /// been reset or replaced.
    pub fn edit_turn(&mut self, handle: TurnHandle, text: &str) -> bool {
        self.transcript.edit(handle, text.trim_end())
    }

    /// Returns false and appends a diagnostic when `value` isn't a
    /// number, leaving the window as it was.
    pub fn set_window_size(&mut self, value: &str) -> bool {
        match parse_window_size(value) {
            Ok(size) => {
                self.config.window_size = size;
                true
            }
            Err(e) => {
                self.notice(&format!("Error: {}", e));
                false
            }
        }
    }

    pub fn set_temperature(&mut self, value: &str) {
        self.config.temperature = value.trim().to_string();
    }

    pub fn set_max_tokens(&mut self, value: &str) {
        self.config.max_output_tokens = value.trim().to_string();
    }

    pub fn set_system_prompt(&mut self, value: &str) {
        self.config.system_prompt = value.to_string();
    }

    pub fn attach(&mut self, path: &Path) -> bool {
        match fs::read(path) {
            Ok(data) => {
                tracing::info!("Attached {} ({} bytes)", path.display(), data.len());
                self.config.attachment = Some(Attachment {
                    path: Some(path.to_path_buf()),
                    data,
                });
                true
            }
            Err(e) => {
                self.notice(&format!("Error attaching file {}: {}", path.display(), e));
                false
            }
        }
    }

    pub fn clear_attachment(&mut self) {
        self.config.attachment = None;
    }

    pub fn save(&mut self, path: &Path) -> bool {
        let conversation = ConversationFile::capture(&self.transcript, &self.config);
        match file::save(path, &conversation) {
            Ok(()) => {
                tracing::info!("Saved {} turns to {}", self.transcript.length(), path.display());
                true
            }
            Err(e) => {
                self.notice(&format!("Error saving file: {}", e));
                false
            }
        }
    }

    /// Replaces the whole session with a saved conversation. The file
    /// is parsed in full first so a bad file leaves things as they were.
    pub fn load(&mut self, path: &Path) -> bool {
        let conversation = match file::load(path) {
            Ok(conversation) => conversation,
            Err(e) => {
                self.notice(&format!("Error loading file: {}", e));
                return false;
            }
        };

        let attachment = conversation.attachment().unwrap_or_else(|e| {
            tracing::warn!("Dropping saved attachment: {}", e);
            None
        });

        self.reset_guard.disarm();
        self.transcript.replace(conversation.turns());
        self.config = ContextConfig {
            temperature: conversation.settings.temperature.clone(),
            max_output_tokens: conversation.settings.max_tokens.clone(),
            system_prompt: conversation.system_message.clone(),
            attachment,
            ..ContextConfig::default()
        };
        self.set_window_size(&conversation.settings.context_size);
        self.loaded_from = Some(path.to_path_buf());

        tracing::info!(
            session_id = %self.id,
            "Loaded {} turns from {}",
            self.transcript.length(),
            path.display()
        );
        true
    }

    /// First call arms a confirmation, a second call within
    /// `NEW_CHAT_CONFIRM_TIMEOUT` clears the conversation, the system
    /// prompt, the attachment and all settings.
    pub fn request_new_chat(&mut self, now: Instant) -> NewChat {
        let outcome = self.reset_guard.press(now);
        if outcome == NewChat::Reset {
            self.transcript.reset();
            self.config = ContextConfig::default();
            self.loaded_from = None;
            self.id = Uuid::new_v4();
            tracing::info!(session_id = %self.id, "Started a new chat");
        }
        outcome
    }

    pub fn new_chat_pending(&self, now: Instant) -> bool {
        self.reset_guard.is_armed(now)
    }
}

pub struct ChatBuilder {
    model: String,
    client: Option<BoxedModelClient>,
    api_key_path: PathBuf,
    transcript: Transcript,
    config: ContextConfig,
    confirm_timeout: Duration,
}

impl ChatBuilder {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            client: None,
            api_key_path: PathBuf::from(DEFAULT_API_KEY_PATH),
            transcript: Transcript::new(),
            config: ContextConfig::default(),
            confirm_timeout: NEW_CHAT_CONFIRM_TIMEOUT,
        }
    }

    pub fn client(mut self, client: BoxedModelClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Where the API key is expected, used in diagnostics when there
    /// is no client.
    pub fn api_key_path(mut self, path: &Path) -> Self {
        self.api_key_path = path.to_path_buf();
        self
    }

    pub fn transcript(mut self, turns: Vec<Turn>) -> Self {
        self.transcript = Transcript::new_with_turns(turns);
        self
    }

    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    pub fn confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn build(self) -> ChatSession {
        let mut session = ChatSession {
            id: Uuid::new_v4(),
            model: self.model,
            client: self.client,
            api_key_path: self.api_key_path,
            transcript: self.transcript,
            config: self.config,
            reset_guard: ResetGuard::new(self.confirm_timeout),
            loaded_from: None,
        };

        if session.client.is_none() {
            let msg = format!(
                "{} {} in the same directory as this program, or generate one first at {}",
                API_KEY_NEEDED,
                session.api_key_path.display(),
                API_KEY_CONSOLE_URL
            );
            session.notice(&msg);
        }

        session
    }
}
