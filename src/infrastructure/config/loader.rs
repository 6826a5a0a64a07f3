use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::services::MAX_SEED_PROMPTS;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid exploration_constant: {0}. Must be finite and non-negative")]
    InvalidExplorationConstant(f64),

    #[error("Invalid min_pool_size: {0}. Must be at least 1")]
    InvalidMinPoolSize(usize),

    #[error("Invalid seed_variants: {seed_variants}. Must be at least min_pool_size ({min_pool_size})")]
    TooFewSeedVariants {
        seed_variants: usize,
        min_pool_size: usize,
    },

    #[error("Invalid seed_variants: {seed_variants}. At most {max} distinct seed prompts can be built")]
    TooManySeedVariants { seed_variants: usize, max: usize },

    #[error("Invalid evolve_every_games: 0. Must be at least 1")]
    InvalidEvolutionInterval,

    #[error("Invalid replacement_quota: 0. Must be at least 1")]
    InvalidReplacementQuota,

    #[error("Invalid embedding_dimensions: 0. Must be at least 1")]
    InvalidEmbeddingDimensions,

    #[error("Invalid max_episodes: 0. Use a positive capacity or leave it unset")]
    InvalidMaxEpisodes,

    #[error("Invalid min_similarity: {0}. Must be between 0 and 1")]
    InvalidMinSimilarity(f32),

    #[error("Invalid damage_scale: {0}. Must be positive and finite")]
    InvalidDamageScale(f64),

    #[error("Invalid decision_timeout_secs: 0. Must be at least 1")]
    InvalidDecisionTimeout,

    #[error("Invalid decisions_per_minute: 0. Must be at least 1")]
    InvalidRateLimit,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .tactician/config.yaml
    /// 3. .tactician/local.yaml (optional local overrides)
    /// 4. Environment variables (TACTICIAN_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`Self::load`] with the `.tactician/` directory under `root`.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let project = root.as_ref().join(".tactician");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project.join("config.yaml")))
            .merge(Yaml::file(project.join("local.yaml")))
            .merge(Env::prefixed("TACTICIAN_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let c = config.bandit.exploration_constant;
        if !c.is_finite() || c < 0.0 {
            return Err(ConfigError::InvalidExplorationConstant(c));
        }

        let pool = &config.prompt_pool;
        if pool.min_pool_size == 0 {
            return Err(ConfigError::InvalidMinPoolSize(pool.min_pool_size));
        }
        if pool.seed_variants < pool.min_pool_size {
            return Err(ConfigError::TooFewSeedVariants {
                seed_variants: pool.seed_variants,
                min_pool_size: pool.min_pool_size,
            });
        }
        if pool.seed_variants > MAX_SEED_PROMPTS {
            return Err(ConfigError::TooManySeedVariants {
                seed_variants: pool.seed_variants,
                max: MAX_SEED_PROMPTS,
            });
        }
        if pool.evolve_every_games == 0 {
            return Err(ConfigError::InvalidEvolutionInterval);
        }
        if pool.replacement_quota == 0 {
            return Err(ConfigError::InvalidReplacementQuota);
        }

        let memory = &config.memory;
        if memory.embedding_dimensions == 0 {
            return Err(ConfigError::InvalidEmbeddingDimensions);
        }
        if memory.max_episodes == Some(0) {
            return Err(ConfigError::InvalidMaxEpisodes);
        }
        if !(0.0..=1.0).contains(&memory.min_similarity) {
            return Err(ConfigError::InvalidMinSimilarity(memory.min_similarity));
        }

        let scale = config.reward.damage_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::InvalidDamageScale(scale));
        }

        if config.agent.decision_timeout_secs == 0 {
            return Err(ConfigError::InvalidDecisionTimeout);
        }
        if config.rate_limit.decisions_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit);
        }

        if config.llm.initial_backoff_ms >= config.llm.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.llm.initial_backoff_ms,
                config.llm.max_backoff_ms,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
