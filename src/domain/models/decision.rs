//! The assembled context handed to the decision maker for one turn.

use serde::{Deserialize, Serialize};

use super::action::ActionKey;
use super::prompt::VariantId;

/// Everything the decision maker sees for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub agent_name: String,
    /// Text of the selected prompt variant, used as the system prompt.
    pub system_prompt: String,
    pub variant_id: VariantId,
    pub situation: String,
    pub legal_actions: Vec<ActionKey>,
    /// Best action by observed mean reward, when any action has been tried.
    pub advisory_action: Option<ActionKey>,
    /// Compact ranking such as `Data: attack(0.62), defend(0.40)`.
    pub action_summary: Option<String>,
    pub opponent_insight: Option<String>,
    /// Natural-language summaries of similar past episodes, most similar first.
    pub recalled: Vec<String>,
    /// Set on a retry after a malformed reply.
    pub correction: Option<String>,
}

impl DecisionContext {
    /// Renders the user turn of the decision request.
    pub fn user_message(&self) -> String {
        let mut lines = vec![self.situation.clone(), String::new()];

        if let Some(insight) = &self.opponent_insight {
            lines.push(format!("Known from past fights: {insight}"));
        }
        if !self.recalled.is_empty() {
            lines.push(format!("Memory: {}.", self.recalled.join("; ")));
        }
        if let Some(summary) = &self.action_summary {
            lines.push(summary.clone());
        }
        if let Some(best) = &self.advisory_action {
            lines.push(format!("Your data says {best} has the highest expected value."));
        }

        let legal = self
            .legal_actions
            .iter()
            .map(ActionKey::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("ACTIONS: {legal}"));
        lines.push(String::new());
        lines.push(
            "What do you do? Think briefly, then act. End with: ACTION: <action_name>".to_string(),
        );

        if let Some(correction) = &self.correction {
            lines.push(String::new());
            lines.push(correction.clone());
        }

        lines.join("\n")
    }

    pub fn with_correction(&self, correction: impl Into<String>) -> Self {
        Self {
            correction: Some(correction.into()),
            ..self.clone()
        }
    }

    pub fn is_legal(&self, action: &ActionKey) -> bool {
        self.legal_actions.contains(action)
    }
}
