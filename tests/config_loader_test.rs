//! Layered configuration: defaults, project YAML, local overrides, environment.

use std::fs;
use std::path::Path;

use tactician::infrastructure::config::{ConfigError, ConfigLoader};

fn write_project_file(root: &Path, name: &str, contents: &str) {
    let dir = root.join(".tactician");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_defaults_without_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = temp_env::with_vars_unset(
        ["TACTICIAN_PROMPT_POOL__EVOLVE_EVERY_GAMES", "TACTICIAN_MEMORY__RECALL_TOP_K"],
        || ConfigLoader::load_from_dir(dir.path()).unwrap(),
    );

    assert_eq!(config.prompt_pool.evolve_every_games, 5);
    assert_eq!(config.prompt_pool.min_pool_size, 3);
    assert_eq!(config.memory.recall_top_k, 2);
    assert_eq!(config.memory.max_episodes, Some(500));
    assert!((config.bandit.exploration_constant - std::f64::consts::SQRT_2).abs() < 1e-12);
    assert!((config.reward.damage_scale - 30.0).abs() < 1e-12);
    assert_eq!(config.agent.max_decision_retries, 1);
}

#[test]
fn test_local_yaml_overrides_project_yaml() {
    let dir = tempfile::tempdir().unwrap();
    write_project_file(
        dir.path(),
        "config.yaml",
        "prompt_pool:\n  evolve_every_games: 8\n  replacement_quota: 2\nmemory:\n  recall_top_k: 4\n",
    );
    write_project_file(dir.path(), "local.yaml", "memory:\n  recall_top_k: 6\n");

    let config = temp_env::with_vars_unset(
        ["TACTICIAN_PROMPT_POOL__EVOLVE_EVERY_GAMES", "TACTICIAN_MEMORY__RECALL_TOP_K"],
        || ConfigLoader::load_from_dir(dir.path()).unwrap(),
    );

    assert_eq!(config.prompt_pool.evolve_every_games, 8);
    assert_eq!(config.prompt_pool.replacement_quota, 2);
    assert_eq!(config.memory.recall_top_k, 6);
    assert_eq!(config.memory.embedding_dimensions, 64);
}

#[test]
fn test_environment_wins_over_files() {
    let dir = tempfile::tempdir().unwrap();
    write_project_file(dir.path(), "config.yaml", "prompt_pool:\n  evolve_every_games: 8\n");

    let config = temp_env::with_vars(
        [
            ("TACTICIAN_PROMPT_POOL__EVOLVE_EVERY_GAMES", Some("12")),
            ("TACTICIAN_MEMORY__RECALL_TOP_K", Some("5")),
        ],
        || ConfigLoader::load_from_dir(dir.path()).unwrap(),
    );

    assert_eq!(config.prompt_pool.evolve_every_games, 12);
    assert_eq!(config.memory.recall_top_k, 5);
}

#[test]
fn test_invalid_file_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_project_file(dir.path(), "config.yaml", "prompt_pool:\n  evolve_every_games: 0\n");

    let err = temp_env::with_vars_unset(["TACTICIAN_PROMPT_POOL__EVOLVE_EVERY_GAMES"], || {
        ConfigLoader::load_from_dir(dir.path()).unwrap_err()
    });

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidEvolutionInterval)
    ));
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tuned.yaml");
    fs::write(
        &path,
        "bandit:\n  exploration_constant: 0.5\nlogging:\n  level: debug\n  format: pretty\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();

    assert!((config.bandit.exploration_constant - 0.5).abs() < 1e-12);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "pretty");
}

#[test]
fn test_malformed_yaml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "memory:\n  recall_top_k: [not, a, number]\n").unwrap();

    assert!(ConfigLoader::load_from_file(&path).is_err());
}
