use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_KEY_PATH: &str = "api_key.txt";
pub const DEFAULT_API_HOST: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_key_path: PathBuf,
    pub anthropic_api_hostname: String,
    pub anthropic_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api_key_path = env::var("CTXCHAT_API_KEY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_API_KEY_PATH));
        let anthropic_api_hostname =
            env::var("CTXCHAT_API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());
        let anthropic_model =
            env::var("CTXCHAT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self {
            api_key_path,
            anthropic_api_hostname,
            anthropic_model,
        }
    }
}

/// Reads the API key from `path`.
///
/// A missing or blank file is (re)created empty so the user has
/// somewhere to paste a key, and `Ok(None)` is returned. A file that
/// exists but can't be read is left alone. Only failures to create
/// the file surface as errors.
pub fn load_api_key(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let key = contents.trim();
            if !key.is_empty() {
                return Ok(Some(key.to_string()));
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!("Unable to read API key file {}: {}", path.display(), e);
            return Ok(None);
        }
    }

    fs::write(path, "")?;
    Ok(None)
}
