use std::path::PathBuf;

use super::error::ChatError;

pub const DEFAULT_TEMPERATURE: &str = "1.0";
pub const DEFAULT_MAX_TOKENS: &str = "1024";
pub const DEFAULT_CONTEXT_SIZE: usize = 10;

/// A PDF staged to go out with the next message. The bytes live here,
/// never in the transcript.
#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub path: Option<PathBuf>,
    pub data: Vec<u8>,
}

/// Knobs that shape the next request. Temperature and max tokens are
/// kept as the user typed them and only validated when a message is
/// sent, so a bad value surfaces in the transcript at that point.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextConfig {
    pub window_size: usize,
    pub temperature: String,
    pub max_output_tokens: String,
    pub system_prompt: String,
    pub attachment: Option<Attachment>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_CONTEXT_SIZE,
            temperature: DEFAULT_TEMPERATURE.to_string(),
            max_output_tokens: DEFAULT_MAX_TOKENS.to_string(),
            system_prompt: String::new(),
            attachment: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ContextConfig {
    pub fn sampling(&self) -> Result<Sampling, ChatError> {
        Ok(Sampling {
            temperature: parse_temperature(&self.temperature)?,
            max_tokens: parse_max_tokens(&self.max_output_tokens)?,
        })
    }

    /// The system prompt to send, if there is anything in it.
    pub fn system(&self) -> Option<String> {
        let system = self.system_prompt.trim();
        (!system.is_empty()).then(|| system.to_string())
    }
}

pub fn parse_temperature(value: &str) -> Result<f32, ChatError> {
    match value.trim().parse::<f32>() {
        Ok(t) if (0.0..=1.0).contains(&t) => Ok(t),
        _ => Err(ChatError::InvalidTemperature(value.to_string())),
    }
}

pub fn parse_max_tokens(value: &str) -> Result<u32, ChatError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ChatError::InvalidMaxTokens(value.to_string())),
    }
}

/// Negative sizes clamp to zero, which means "no history".
pub fn parse_window_size(value: &str) -> Result<usize, ChatError> {
    value
        .trim()
        .parse::<i64>()
        .map(|n| n.max(0) as usize)
        .map_err(|_| ChatError::InvalidWindowSize(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::default();
        assert_eq!(config.window_size, 10);
        assert_eq!(
            config.sampling().unwrap(),
            Sampling {
                temperature: 1.0,
                max_tokens: 1024
            }
        );
        assert_eq!(config.system(), None);
        assert!(config.attachment.is_none());
    }

    #[test]
    fn test_parse_temperature() {
        assert_eq!(parse_temperature("0.7").unwrap(), 0.7);
        assert_eq!(parse_temperature(" 0 ").unwrap(), 0.0);
        assert!(matches!(
            parse_temperature("abc"),
            Err(ChatError::InvalidTemperature(v)) if v == "abc"
        ));
        assert!(parse_temperature("1.5").is_err());
        assert!(parse_temperature("-0.1").is_err());
        assert!(parse_temperature("NaN").is_err());
    }

    #[test]
    fn test_parse_max_tokens() {
        assert_eq!(parse_max_tokens("4096").unwrap(), 4096);
        assert!(parse_max_tokens("0").is_err());
        assert!(parse_max_tokens("-5").is_err());
        assert!(parse_max_tokens("1.5").is_err());
    }

    #[test]
    fn test_parse_window_size() {
        assert_eq!(parse_window_size("3").unwrap(), 3);
        assert_eq!(parse_window_size("-4").unwrap(), 0);
        assert_eq!(parse_window_size("0").unwrap(), 0);
        assert!(parse_window_size("ten").is_err());
        assert!(parse_window_size("").is_err());
    }

    #[test]
    fn test_system_trims_and_skips_blank() {
        let mut config = ContextConfig::default();
        config.system_prompt = "   \n".to_string();
        assert_eq!(config.system(), None);

        config.system_prompt = "  Be terse.\n".to_string();
        assert_eq!(config.system(), Some("Be terse.".to_string()));
    }
}
