//! Runtime configuration loaded from the environment.

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Engine configuration loaded from environment variables (with `.env`
/// support via dotenvy).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory for save files
    pub saves_dir: PathBuf,
    /// Item registry JSON file
    pub items_path: PathBuf,
    /// Social outcomes JSON file
    pub social_outcomes_path: PathBuf,
    /// Directory of outcome consequence tables (YAML/JSON)
    pub outcome_tables_dir: PathBuf,
    /// Maximum steps accepted from a single plan
    pub max_plan_steps: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            saves_dir: PathBuf::from("saves"),
            items_path: PathBuf::from("data/items.json"),
            social_outcomes_path: PathBuf::from("data/social_outcomes.json"),
            outcome_tables_dir: PathBuf::from("data/outcome_tables"),
            max_plan_steps: 5,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Best effort: a missing .env file is fine
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Ok(Self {
            saves_dir: env_path("TALEFORGE_SAVES_DIR", defaults.saves_dir),
            items_path: env_path("TALEFORGE_ITEMS_PATH", defaults.items_path),
            social_outcomes_path: env_path(
                "TALEFORGE_SOCIAL_OUTCOMES_PATH",
                defaults.social_outcomes_path,
            ),
            outcome_tables_dir: env_path("TALEFORGE_OUTCOME_TABLES_DIR", defaults.outcome_tables_dir),
            max_plan_steps: env::var("TALEFORGE_MAX_PLAN_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_plan_steps),
        })
    }

    /// Install the global tracing subscriber honoring `RUST_LOG`.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or(default)
}
