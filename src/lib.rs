pub mod anthropic;
pub mod chat;
pub mod cli;
pub mod core;
