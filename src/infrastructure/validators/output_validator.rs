//! Validation of collaborator replies before they reach the game.
//!
//! Decision replies must end with an `ACTION: <name>` line naming a legal action.
//! Both decision replies and generated prompt variants are screened for
//! prompt-injection phrasing and stripped of control characters.

use regex::Regex;
use thiserror::Error;

use crate::domain::models::ActionKey;

/// Replies are cut to this many characters before parsing.
pub const MAX_REPLY_CHARS: usize = 1200;

const INJECTION_PATTERNS: [&str; 14] = [
    r"ignore\s+(previous|all|above|prior)\s+instructions?",
    r"system\s*prompt",
    r"you\s+are\s+now",
    r"pretend\s+(to\s+be|you('re|\s+are))",
    r"override\s+(your|all|safety)",
    r"jailbreak",
    r"disregard\s+(your|all|any)",
    r"new\s+instruction",
    r"from\s+now\s+on\s+(you|ignore|act)",
    r"<\s*script",
    r"<\s*iframe",
    r"javascript\s*:",
    r"data\s*:\s*text",
    r"base64\s*,",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("reply is empty")]
    Empty,

    #[error("reply matched a blocked pattern: {0}")]
    Blocked(String),

    #[error("reply has no ACTION line")]
    MissingAction,

    #[error("{0} is not one of the available actions")]
    IllegalAction(ActionKey),
}

/// Text screening shared by decision replies and generated variants.
#[derive(Debug, Clone)]
pub struct ContentGuard {
    patterns: Vec<Regex>,
    act_as: Regex,
}

impl ContentGuard {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = INJECTION_PATTERNS
            .iter()
            .map(|pattern| Regex::new(&format!("(?is){pattern}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            act_as: Regex::new(r"(?i)\bact\s+as\s+")?,
        })
    }

    /// Truncate to `max_chars`, reject injection phrasing, drop control characters.
    pub fn sanitize(&self, text: &str, max_chars: usize) -> Result<String, ValidationError> {
        let truncated: String = text.chars().take(max_chars).collect();

        if let Some(pattern) = self.patterns.iter().find(|p| p.is_match(&truncated)) {
            return Err(ValidationError::Blocked(pattern.as_str().to_string()));
        }
        // "act as" is allowed when it stays in character.
        if let Some(found) = self.act_as.find(&truncated) {
            if !truncated[found.end()..].to_lowercase().contains("character") {
                return Err(ValidationError::Blocked(self.act_as.as_str().to_string()));
            }
        }

        let cleaned: String = truncated
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
            .collect();
        Ok(cleaned.trim().to_string())
    }
}

/// A decision reply split into its action and the narration around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDecision {
    pub action: ActionKey,
    pub narration: String,
}

/// Parses `ACTION: <name>` replies from the decision model.
#[derive(Debug, Clone)]
pub struct ActionOutputValidator {
    guard: ContentGuard,
    action_line: Regex,
    whitespace: Regex,
    max_narration_chars: usize,
}

impl ActionOutputValidator {
    pub fn new(max_narration_chars: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            guard: ContentGuard::new()?,
            // Multi-word names run to the end of the line; ActionKey folds the separators.
            action_line: Regex::new(r"(?i)ACTION:[ \t]*(\w[\w\- \t]*)")?,
            whitespace: Regex::new(r"\s+")?,
            max_narration_chars,
        })
    }

    /// Extract the action and narration from a raw reply.
    ///
    /// The last `ACTION:` marker wins, since models sometimes restate the
    /// instruction before answering.
    pub fn parse(
        &self,
        raw: &str,
        legal_actions: &[ActionKey],
        agent_name: &str,
    ) -> Result<ParsedDecision, ValidationError> {
        let safe = self.guard.sanitize(raw, MAX_REPLY_CHARS)?;
        if safe.is_empty() {
            return Err(ValidationError::Empty);
        }

        let action = self
            .action_line
            .captures_iter(&safe)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| ActionKey::new(m.as_str()))
            .ok_or(ValidationError::MissingAction)?;

        if !legal_actions.contains(&action) {
            return Err(ValidationError::IllegalAction(action));
        }

        Ok(ParsedDecision {
            action,
            narration: self.narration(&safe, agent_name),
        })
    }

    fn narration(&self, reply: &str, agent_name: &str) -> String {
        let without_action = self.action_line.replace_all(reply, "");
        let collapsed = self.whitespace.replace_all(&without_action, " ");
        let narration: String = collapsed.trim().chars().take(self.max_narration_chars).collect();
        if narration.is_empty() {
            format!("{agent_name} moves.")
        } else {
            narration
        }
    }
}
