use regex::{Captures, Regex};
use std::fmt;

/// Redacts credentials from text before it reaches a log line.
///
/// Collaborator error bodies and request echoes pass through here, since an
/// upstream error can quote the headers it received.
#[derive(Clone)]
pub struct SecretScrubber {
    api_key_pattern: Regex,
    field_pattern: Regex,
    bearer_pattern: Regex,
}

impl SecretScrubber {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // Anthropic keys: sk-ant-api03-...
            api_key_pattern: Regex::new(r"sk-ant-[a-zA-Z0-9_-]{8,}")?,
            // "x-api-key": "...", api_key=..., token: ...
            field_pattern: Regex::new(
                r#"(?i)(["']?(?:x-api-key|api_key|apikey|token|secret|password)["']?\s*[:=]\s*)["']?[^"'\s,}]+["']?"#,
            )?,
            bearer_pattern: Regex::new(r"Bearer\s+[a-zA-Z0-9._~+/=-]+")?,
        })
    }

    pub fn scrub(&self, message: &str) -> String {
        let scrubbed = self
            .api_key_pattern
            .replace_all(message, "[API_KEY_REDACTED]");
        let scrubbed = self
            .bearer_pattern
            .replace_all(&scrubbed, "Bearer [TOKEN_REDACTED]");
        self.field_pattern
            .replace_all(&scrubbed, |caps: &Captures| format!("{}[REDACTED]", &caps[1]))
            .into_owned()
    }
}

impl fmt::Debug for SecretScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretScrubber").finish()
    }
}
