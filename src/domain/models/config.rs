use serde::{Deserialize, Serialize};

/// Main configuration structure for Tactician
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Action-selection bandit configuration
    #[serde(default)]
    pub bandit: BanditConfig,

    /// Prompt pool evolution configuration
    #[serde(default)]
    pub prompt_pool: PromptPoolConfig,

    /// Episodic memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Reward shaping configuration
    #[serde(default)]
    pub reward: RewardConfig,

    /// Per-turn decision configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Decision rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Decision circuit breaker configuration
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// LLM collaborator configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// UCB1 bandit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BanditConfig {
    /// Exploration constant `c` in `mean + c * sqrt(ln N / n)`
    #[serde(default = "default_exploration_constant")]
    pub exploration_constant: f64,
}

const fn default_exploration_constant() -> f64 {
    std::f64::consts::SQRT_2
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            exploration_constant: default_exploration_constant(),
        }
    }
}

/// Prompt pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PromptPoolConfig {
    /// The pool never shrinks below this many variants
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: usize,

    /// Number of seed variants built for a fresh agent
    #[serde(default = "default_seed_variants")]
    pub seed_variants: usize,

    /// Completed games between evolution cycles
    #[serde(default = "default_evolve_every_games")]
    pub evolve_every_games: u32,

    /// Pulls a variant needs before it can be culled
    #[serde(default = "default_min_samples_for_culling")]
    pub min_samples_for_culling: u64,

    /// Maximum variants replaced per evolution cycle
    #[serde(default = "default_replacement_quota")]
    pub replacement_quota: usize,

    /// Timeout for one variant generation call, in seconds
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Generated variants shorter than this are rejected
    #[serde(default = "default_min_variant_chars")]
    pub min_variant_chars: usize,

    /// Generated variants are truncated to this many characters
    #[serde(default = "default_max_variant_chars")]
    pub max_variant_chars: usize,
}

const fn default_min_pool_size() -> usize {
    3
}

const fn default_seed_variants() -> usize {
    4
}

const fn default_evolve_every_games() -> u32 {
    5
}

const fn default_min_samples_for_culling() -> u64 {
    3
}

const fn default_replacement_quota() -> usize {
    1
}

const fn default_generation_timeout_secs() -> u64 {
    60
}

const fn default_min_variant_chars() -> usize {
    80
}

const fn default_max_variant_chars() -> usize {
    4000
}

impl Default for PromptPoolConfig {
    fn default() -> Self {
        Self {
            min_pool_size: default_min_pool_size(),
            seed_variants: default_seed_variants(),
            evolve_every_games: default_evolve_every_games(),
            min_samples_for_culling: default_min_samples_for_culling(),
            replacement_quota: default_replacement_quota(),
            generation_timeout_secs: default_generation_timeout_secs(),
            min_variant_chars: default_min_variant_chars(),
            max_variant_chars: default_max_variant_chars(),
        }
    }
}

/// Episodic memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Dimension of hashed state embeddings
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Only the first this-many tokens of a state contribute to its embedding
    #[serde(default = "default_max_embedded_tokens")]
    pub max_embedded_tokens: usize,

    /// Capacity; the oldest episodes are evicted first. `None` keeps everything.
    #[serde(default = "default_max_episodes")]
    pub max_episodes: Option<usize>,

    /// Episodes below this cosine similarity are never recalled
    #[serde(default)]
    pub min_similarity: f32,

    /// Only the most recent this-many episodes are scanned. `None` scans all.
    #[serde(default)]
    pub scan_window: Option<usize>,

    /// Episodes recalled into each decision context
    #[serde(default = "default_recall_top_k")]
    pub recall_top_k: usize,
}

const fn default_embedding_dimensions() -> usize {
    64
}

const fn default_max_embedded_tokens() -> usize {
    64
}

const fn default_max_episodes() -> Option<usize> {
    Some(500)
}

const fn default_recall_top_k() -> usize {
    2
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dimensions: default_embedding_dimensions(),
            max_embedded_tokens: default_max_embedded_tokens(),
            max_episodes: default_max_episodes(),
            min_similarity: 0.0,
            scan_window: None,
            recall_top_k: default_recall_top_k(),
        }
    }
}

/// Reward shaping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RewardConfig {
    /// Damage that earns a full per-turn reward of 1.0
    #[serde(default = "default_damage_scale")]
    pub damage_scale: f64,
}

const fn default_damage_scale() -> f64 {
    30.0
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            damage_scale: default_damage_scale(),
        }
    }
}

/// Per-turn decision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Upper bound on one decision call, in seconds
    #[serde(default = "default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,

    /// Corrective retries after a malformed decision before falling back
    #[serde(default = "default_max_decision_retries")]
    pub max_decision_retries: u32,

    /// Narration is trimmed to this many characters
    #[serde(default = "default_max_narration_chars")]
    pub max_narration_chars: usize,
}

const fn default_decision_timeout_secs() -> u64 {
    60
}

const fn default_max_decision_retries() -> u32 {
    1
}

const fn default_max_narration_chars() -> usize {
    450
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            decision_timeout_secs: default_decision_timeout_secs(),
            max_decision_retries: default_max_decision_retries(),
            max_narration_chars: default_max_narration_chars(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Decision calls allowed per agent per minute
    #[serde(default = "default_decisions_per_minute")]
    pub decisions_per_minute: u32,
}

const fn default_decisions_per_minute() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            decisions_per_minute: default_decisions_per_minute(),
        }
    }
}

/// Circuit breaker configuration for the decision collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a trial call
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,

    /// Successful trial calls needed to close the circuit again
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_open_timeout_secs() -> u64 {
    30
}

const fn default_success_threshold() -> u32 {
    1
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_timeout_secs: default_open_timeout_secs(),
            success_threshold: default_success_threshold(),
        }
    }
}

/// LLM collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Base URL of the Messages API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum retries on transient errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Token budget for a turn decision
    #[serde(default = "default_decision_max_tokens")]
    pub decision_max_tokens: u32,

    /// Sampling temperature for a turn decision
    #[serde(default = "default_decision_temperature")]
    pub decision_temperature: f32,

    /// Token budget for a variant generation
    #[serde(default = "default_variant_max_tokens")]
    pub variant_max_tokens: u32,

    /// Sampling temperature for a variant generation
    #[serde(default = "default_variant_temperature")]
    pub variant_temperature: f32,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    60
}

const fn default_max_retries() -> u32 {
    4
}

const fn default_initial_backoff_ms() -> u64 {
    1200
}

const fn default_max_backoff_ms() -> u64 {
    20_000
}

const fn default_decision_max_tokens() -> u32 {
    350
}

const fn default_decision_temperature() -> f32 {
    0.87
}

const fn default_variant_max_tokens() -> u32 {
    2200
}

const fn default_variant_temperature() -> f32 {
    0.93
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            decision_max_tokens: default_decision_max_tokens(),
            decision_temperature: default_decision_temperature(),
            variant_max_tokens: default_variant_max_tokens(),
            variant_temperature: default_variant_temperature(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".tactician/tactician.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Whether to also log to stdout
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_enable_stdout() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_stdout: default_enable_stdout(),
        }
    }
}
