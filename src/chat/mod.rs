pub mod context;
pub mod core;
pub mod error;
pub mod file;
pub mod models;
pub mod settings;
pub mod view;

pub use self::core::{ChatBuilder, ChatSession, NewChat, ResetGuard, SendOutcome};
pub use error::ChatError;
pub use models::{Role, Transcript, Turn, TurnHandle};
pub use settings::{Attachment, ContextConfig, Sampling};
pub use view::{TranscriptView, TurnView};
