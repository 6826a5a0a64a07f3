//! Runs a series of battles for one agent, one at a time or several at once,
//! persisting the agent after every battle.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::agent::Agent;
use super::battle_session::{AbortSignal, BattleSummary};
use crate::domain::errors::DomainResult;
use crate::domain::models::BattleOutcome;
use crate::domain::ports::{AgentStateRepository, BattleEnvironment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMode {
    Sequential,
    /// Up to `max_concurrent` battles share the agent at once.
    Parallel { max_concurrent: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesReport {
    pub battles: Vec<BattleSummary>,
    /// `(battle index, error)` for battles that ended in an error.
    pub errors: Vec<(usize, String)>,
    pub aborted: bool,
}

impl SeriesReport {
    pub fn count(&self, outcome: BattleOutcome) -> usize {
        self.battles
            .iter()
            .filter(|summary| summary.outcome == Some(outcome))
            .count()
    }

    pub fn completed(&self) -> usize {
        self.battles.iter().filter(|summary| !summary.aborted()).count()
    }
}

pub struct SeriesRunner<'a> {
    agent: &'a Agent,
    repository: Option<Arc<dyn AgentStateRepository>>,
    mode: SeriesMode,
    abort: AbortSignal,
    save_lock: Mutex<()>,
}

impl<'a> SeriesRunner<'a> {
    pub fn new(agent: &'a Agent) -> Self {
        Self {
            agent,
            repository: None,
            mode: SeriesMode::Sequential,
            abort: AbortSignal::never(),
            save_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_repository(mut self, repository: Arc<dyn AgentStateRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SeriesMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Play `battles` battles, building each environment with `make_env`.
    ///
    /// A battle that errors is reported and the series continues. A failed
    /// save stops the series and is returned as the error.
    pub async fn run<E, F>(&self, battles: usize, mut make_env: F) -> DomainResult<SeriesReport>
    where
        E: BattleEnvironment,
        F: FnMut(usize) -> E,
    {
        let mut report = SeriesReport::default();
        let envs: Vec<(usize, E)> = (0..battles).map(|index| (index, make_env(index))).collect();

        match self.mode {
            SeriesMode::Sequential => {
                for (index, mut env) in envs {
                    if self.abort.is_aborted() {
                        break;
                    }
                    let result = self.agent.run_battle(&mut env, &self.abort).await;
                    self.settle(&mut report, index, result).await?;
                }
            }
            SeriesMode::Parallel { max_concurrent } => {
                let mut results = stream::iter(envs)
                    .map(|(index, mut env)| async move {
                        let result = self.agent.run_battle(&mut env, &self.abort).await;
                        (index, result)
                    })
                    .buffer_unordered(max_concurrent.max(1));

                while let Some((index, result)) = results.next().await {
                    self.settle(&mut report, index, result).await?;
                }
            }
        }

        report.aborted = self.abort.is_aborted();
        tracing::info!(
            agent_id = %self.agent.profile().agent_id,
            completed = report.completed(),
            won = report.count(BattleOutcome::Won),
            lost = report.count(BattleOutcome::Lost),
            drawn = report.count(BattleOutcome::Draw),
            errors = report.errors.len(),
            aborted = report.aborted,
            "battle series finished"
        );
        Ok(report)
    }

    async fn settle(
        &self,
        report: &mut SeriesReport,
        index: usize,
        result: DomainResult<BattleSummary>,
    ) -> DomainResult<()> {
        match result {
            Ok(summary) => report.battles.push(summary),
            Err(err) => {
                tracing::error!(battle = index, error = %err, "battle failed");
                report.errors.push((index, err.to_string()));
            }
        }
        self.persist().await
    }

    /// Snapshot and save under one lock so saves land in snapshot order.
    async fn persist(&self) -> DomainResult<()> {
        let Some(repository) = &self.repository else {
            return Ok(());
        };
        let _guard = self.save_lock.lock().await;
        let snapshot = self.agent.snapshot().await;
        repository.save(&snapshot).await
    }
}
