//! Decision context assembly and seed prompt construction.

use super::stat_tracker::StatTracker;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    standard_actions, ActionKey, AgentProfile, BattleRecord, DecisionContext, OpponentModel,
    PromptVariant, RetrievedEpisode, TurnObservation,
};

/// Arms listed in the `Data:` summary line.
const SUMMARY_WIDTH: usize = 4;

/// Actions listed as hard-won tendencies in a seed prompt.
const TENDENCY_WIDTH: usize = 3;

/// `Data: attack(0.62), defend(0.40)` over the best tried actions, or `None`
/// before anything has been tried.
pub fn action_summary(actions: &StatTracker<ActionKey>) -> Option<String> {
    let ranked = actions.ranked();
    if ranked.is_empty() {
        return None;
    }
    let parts: Vec<String> = ranked
        .iter()
        .take(SUMMARY_WIDTH)
        .map(|stat| format!("{}({:.2})", stat.key, stat.mean_reward()))
        .collect();
    Some(format!("Data: {}", parts.join(", ")))
}

/// Assembles the per-turn [`DecisionContext`].
#[derive(Debug, Clone)]
pub struct DecisionContextBuilder {
    agent_name: String,
}

impl DecisionContextBuilder {
    pub fn new(profile: &AgentProfile) -> Self {
        Self {
            agent_name: profile.name.clone(),
        }
    }

    /// Build the context for one turn.
    ///
    /// `recalled` is expected most similar first and is rendered in that order.
    pub fn build(
        &self,
        variant: &PromptVariant,
        observation: &TurnObservation,
        actions: &StatTracker<ActionKey>,
        recalled: &[RetrievedEpisode],
        opponents: &OpponentModel,
    ) -> DomainResult<DecisionContext> {
        if observation.legal_actions.is_empty() {
            return Err(DomainError::NoCandidateActions);
        }

        Ok(DecisionContext {
            agent_name: self.agent_name.clone(),
            system_prompt: variant.text.clone(),
            variant_id: variant.id.clone(),
            situation: observation.state.situation(),
            legal_actions: observation.legal_actions.clone(),
            advisory_action: actions.best(&observation.legal_actions),
            action_summary: action_summary(actions),
            opponent_insight: opponents.insight(&observation.state.opponent_id),
            recalled: recalled.iter().map(RetrievedEpisode::summary).collect(),
            correction: None,
        })
    }
}

/// Most seed prompts [`seed_prompts`] can build without repeating itself.
pub const MAX_SEED_PROMPTS: usize = EMPHASES.len() * EMPHASES.len();

const EMPHASES: [&str; 6] = [
    "Your instinct is pressure. Hit first, hit often, and never give them a breath to reset.",
    "You win by outlasting. Guard when the blows come heavy, and punish the moment they overreach.",
    "You watch before you commit. Read their habits, then strike at the gap they keep leaving.",
    "You fight with your head. Spend magic and items when they swing the fight, never out of panic.",
    "You play mind games. A taunt or a feint can open a guard faster than a blade.",
    "You know when a fight is lost and when it can still be turned. Survive first, then win.",
];

fn mood(record: &BattleRecord) -> &'static str {
    let win_rate = record.win_rate();
    if win_rate > 0.65 {
        "You carry yourself with quiet confidence, not arrogance. \
         Just the certainty of someone who has been here before and walked away."
    } else if win_rate < 0.38 && record.games() > 2 {
        "You have lost more than you have won lately. \
         There is an edge to you now, something to prove."
    } else {
        "You are unpredictable. That is your edge. \
         Every fight gets your complete attention. No assumptions."
    }
}

/// The first `EMPHASES.len()` seeds carry one emphasis each; later ones pair it
/// with a second, offset by how many times the list has wrapped.
fn emphasis(index: usize) -> String {
    let primary = index % EMPHASES.len();
    let wraps = index / EMPHASES.len();
    if wraps == 0 {
        EMPHASES[primary].to_string()
    } else {
        let secondary = (primary + wraps) % EMPHASES.len();
        format!("{} {}", EMPHASES[primary], EMPHASES[secondary])
    }
}

/// Build `count` seed prompts for a fresh or re-seeded agent.
///
/// Every seed shares the agent's identity, record, and statistics, and differs
/// in its strategic emphasis. Texts are distinct up to [`MAX_SEED_PROMPTS`].
pub fn seed_prompts(
    profile: &AgentProfile,
    record: &BattleRecord,
    actions: &StatTracker<ActionKey>,
    count: usize,
) -> Vec<String> {
    let tendencies: Vec<String> = actions
        .ranked()
        .iter()
        .take(TENDENCY_WIDTH)
        .map(|stat| stat.key.to_string())
        .collect();
    let tendencies = if tendencies.is_empty() {
        "reading every situation fresh".to_string()
    } else {
        tendencies.join(", ")
    };
    let data = action_summary(actions).unwrap_or_default();
    let action_list = standard_actions()
        .iter()
        .map(ActionKey::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    (0..count)
        .map(|i| {
            let emphasis = emphasis(i);
            format!(
                "You are {name}, a {class} locked in a fight for survival.\n\n\
                 {mood}\n{emphasis}\n\n\
                 Hard-won tendencies: {tendencies}\n\
                 {data}\n\
                 Record: {wins}W / {losses}L\n\n\
                 You think and speak like a person in danger, not a game controller. \
                 One or two sentences of real in-the-moment thought before you act.\n\n\
                 ACTIONS: {action_list}\n\n\
                 End every response with: ACTION: <action_name>",
                name = profile.name,
                class = profile.class,
                mood = mood(record),
                wins = record.wins,
                losses = record.losses,
            )
        })
        .collect()
}
