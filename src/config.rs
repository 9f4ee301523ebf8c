//! Configuration management for the contest solver.
//!
//! Configuration is read from environment variables:
//! - `GEMINI_API_KEY` - Required. Key for the generative API.
//! - `GEMINI_API_BASE` - Optional. Endpoint base. Defaults to the public v1beta endpoint.
//! - `SOLVER_MODELS` - Optional. Comma-separated static model priority list (fastest first).
//! - `SOLVER_DEFAULT_MODEL` - Optional. Last-resort model identifier.
//! - `SOLVER_MAX_ATTEMPTS` - Optional. Attempt budget per generation. Defaults to `8`.
//! - `SOLVER_PROMPT_MAX_CHARS` - Optional. Problem text is truncated to this many characters.
//! - `SOLVER_SCRATCH_DIR` - Optional. Scratch compilation directory. Defaults to `./scratch`.
//! - `SOLVER_PROGRAM_FILE` / `SOLVER_PROBLEM_FILE` - Optional. File names inside the scratch dir.
//! - `SOLVER_BUILD_COMMAND` / `SOLVER_RUN_COMMAND` - Optional. Shell commands run in the scratch dir.
//! - `SOLVER_BUILD_TIMEOUT_SECS` / `SOLVER_RUN_TIMEOUT_SECS` - Optional. Wall-clock bounds.
//! - `SOLVER_BUILD_WITHOUT_SAMPLES` - Optional. Compile even when a task has no samples. Defaults to `true`.
//! - `SOLVER_HEURISTIC_MARKER` - Optional. URL marker of heuristic contests. Defaults to `ahc`.
//! - `SOLVER_FENCE_TAG` - Optional. Code fence tag of the target language. Defaults to `rust`.
//! - `SOLVER_TASKS_FILE` - Optional. Task manifest path. Defaults to `tasks.json`.
//! - `SOLVER_SUBMIT_DIR` - Optional. Submission drop directory. Defaults to `./submissions`.
//! - `SOLVER_AUTO_SUBMIT` - Optional. Submit tasks that pass all samples. Defaults to `true`.
//! - `SOLVER_SUBMIT_ACK_TIMEOUT_SECS` - Optional. Wait this long for a `<task>.ack` file after a drop. `0` disables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::util::{env_var_bool, split_list};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings for the model failover orchestrator.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Static priority order, fastest/cheapest first.
    pub preferred_models: Vec<String>,
    /// Used when neither the priority list nor the family filter yields a model.
    pub default_model: String,
    /// Substring identifying an acceptable model family during discovery.
    pub family_hint: String,
    /// Method a model must advertise to be eligible.
    pub required_method: String,
    /// Total attempts across all classifications.
    pub max_attempts: u32,
    /// Wait applied when a rate-limit body carries no usable hint.
    pub default_rate_limit_wait: Duration,
    /// Padding added on top of a parsed wait hint.
    pub rate_limit_padding: Duration,
    /// Upper bound for any rate-limit wait.
    pub max_rate_limit_wait: Duration,
    /// Pause after a model is excluded before the next request.
    pub settle_pause: Duration,
    /// Delay before retrying the same model after a transport error.
    pub transport_retry_delay: Duration,
    /// Fence tag of the target language (```rust).
    pub fence_tag: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            preferred_models: vec![
                "gemini-2.0-flash-lite".to_string(),
                "gemini-2.0-flash".to_string(),
                "gemini-1.5-flash".to_string(),
                "gemini-1.5-pro".to_string(),
            ],
            default_model: "gemini-1.5-flash".to_string(),
            family_hint: "flash".to_string(),
            required_method: "generateContent".to_string(),
            max_attempts: 8,
            default_rate_limit_wait: Duration::from_secs(5),
            rate_limit_padding: Duration::from_secs(2),
            max_rate_limit_wait: Duration::from_secs(60),
            settle_pause: Duration::from_secs(1),
            transport_retry_delay: Duration::from_secs(3),
            fence_tag: "rust".to_string(),
        }
    }
}

/// Settings for the local verification harness.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub scratch_dir: PathBuf,
    pub program_file: String,
    pub problem_file: String,
    pub build_command: String,
    pub run_command: String,
    pub build_timeout: Duration,
    pub run_timeout: Duration,
    /// Run the build as a compile-only sanity check when a task has no samples.
    pub build_without_samples: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("scratch"),
            program_file: "main.rs".to_string(),
            problem_file: "problem.md".to_string(),
            build_command: "rustc -O -o main main.rs".to_string(),
            run_command: "./main".to_string(),
            build_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_secs(10),
            build_without_samples: true,
        }
    }
}

/// Solver configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Generative API key
    pub api_key: String,

    /// Generative API base URL (no trailing slash)
    pub api_base: String,

    pub generation: GenerationConfig,

    pub harness: HarnessConfig,

    /// Problem text is truncated to this many characters before prompting
    pub prompt_max_chars: usize,

    /// Marker in a task URL that identifies a heuristic contest
    pub heuristic_marker: String,

    /// Task manifest read by the local problem source
    pub tasks_file: PathBuf,

    /// Directory the local submission sink writes into
    pub submit_dir: PathBuf,

    /// Whether tasks that pass every sample are handed to the submission sink
    pub auto_submit: bool,

    /// How long the drop-directory sink waits for an acknowledgment file
    pub submit_ack_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set and
    /// `ConfigError::InvalidValue` for unparseable numbers.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let api_base = std::env::var("GEMINI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let mut generation = GenerationConfig::default();
        if let Ok(models) = std::env::var("SOLVER_MODELS") {
            let models = split_list(&models);
            if !models.is_empty() {
                generation.preferred_models = models;
            }
        }
        if let Ok(model) = std::env::var("SOLVER_DEFAULT_MODEL") {
            generation.default_model = model;
        }
        generation.max_attempts = parse_env("SOLVER_MAX_ATTEMPTS", generation.max_attempts)?;
        if generation.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "SOLVER_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if let Ok(tag) = std::env::var("SOLVER_FENCE_TAG") {
            generation.fence_tag = tag;
        }

        let mut harness = HarnessConfig::default();
        if let Ok(dir) = std::env::var("SOLVER_SCRATCH_DIR") {
            harness.scratch_dir = PathBuf::from(dir);
        }
        if let Ok(file) = std::env::var("SOLVER_PROGRAM_FILE") {
            harness.program_file = file;
        }
        if let Ok(file) = std::env::var("SOLVER_PROBLEM_FILE") {
            harness.problem_file = file;
        }
        if let Ok(cmd) = std::env::var("SOLVER_BUILD_COMMAND") {
            harness.build_command = cmd;
        }
        if let Ok(cmd) = std::env::var("SOLVER_RUN_COMMAND") {
            harness.run_command = cmd;
        }
        harness.build_timeout = Duration::from_secs(parse_env(
            "SOLVER_BUILD_TIMEOUT_SECS",
            harness.build_timeout.as_secs(),
        )?);
        harness.run_timeout = Duration::from_secs(parse_env(
            "SOLVER_RUN_TIMEOUT_SECS",
            harness.run_timeout.as_secs(),
        )?);
        harness.build_without_samples =
            env_var_bool("SOLVER_BUILD_WITHOUT_SAMPLES", harness.build_without_samples);

        let prompt_max_chars = parse_env("SOLVER_PROMPT_MAX_CHARS", 12_000usize)?;

        let heuristic_marker =
            std::env::var("SOLVER_HEURISTIC_MARKER").unwrap_or_else(|_| "ahc".to_string());

        let tasks_file = std::env::var("SOLVER_TASKS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("tasks.json"));

        let submit_dir = std::env::var("SOLVER_SUBMIT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("submissions"));

        let auto_submit = env_var_bool("SOLVER_AUTO_SUBMIT", true);

        let submit_ack_timeout = match parse_env("SOLVER_SUBMIT_ACK_TIMEOUT_SECS", 0u64)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            api_key,
            api_base,
            generation,
            harness,
            prompt_max_chars,
            heuristic_marker,
            tasks_file,
            submit_dir,
            auto_submit,
            submit_ack_timeout,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, scratch_dir: PathBuf) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            generation: GenerationConfig::default(),
            harness: HarnessConfig {
                scratch_dir,
                ..HarnessConfig::default()
            },
            prompt_max_chars: 12_000,
            heuristic_marker: "ahc".to_string(),
            tasks_file: PathBuf::from("tasks.json"),
            submit_dir: PathBuf::from("submissions"),
            auto_submit: true,
            submit_ack_timeout: None,
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
