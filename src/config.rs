//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `LESSON_HUB_WORK_DIR` and `LESSON_HUB_LOG_LEVEL` env overrides.
//! The LLM API key only ever comes from `LLM_API_KEY`.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

/// Where artifacts and progress documents live on disk.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of the topic folders (`{lessons_dir}/{topic}/...`).
    pub lessons_dir: PathBuf,
    /// Directory holding one progress document per user.
    pub progress_dir: PathBuf,
}

/// Specialist invocation settings.
#[derive(Debug, Clone)]
pub struct SpecialistsConfig {
    /// Per-invocation timeout; `None` waits as long as the backend does.
    pub timeout_seconds: Option<u64>,
    /// Register the notifier specialist.
    pub notifications: bool,
    /// Ask the tracker specialist for commentary on progress queries.
    pub progress_commentary: bool,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Fully-resolved hub configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Identity the progress ledger is keyed by.
    pub user_id: String,
    pub storage: StorageConfig,
    pub specialists: SpecialistsConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY`; `None` for keyless local models.
    pub llm_api_key: Option<String>,
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    hub: RawHub,
    #[serde(default)]
    storage: RawStorage,
    #[serde(default)]
    specialists: RawSpecialists,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawHub {
    #[serde(default = "default_name")]
    name: String,
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_user_id")]
    user_id: String,
}

#[derive(Deserialize)]
struct RawStorage {
    #[serde(default = "default_lessons_dir")]
    lessons_dir: String,
    #[serde(default = "default_progress_dir")]
    progress_dir: String,
}

impl Default for RawStorage {
    fn default() -> Self {
        Self {
            lessons_dir: default_lessons_dir(),
            progress_dir: default_progress_dir(),
        }
    }
}

#[derive(Deserialize)]
struct RawSpecialists {
    #[serde(default)]
    timeout_seconds: Option<u64>,
    #[serde(default = "default_true")]
    notifications: bool,
    #[serde(default = "default_true")]
    progress_commentary: bool,
}

impl Default for RawSpecialists {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            notifications: true,
            progress_commentary: true,
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

fn default_name() -> String { "lesson-hub".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_user_id() -> String { "learner_001".to_string() }
fn default_lessons_dir() -> String { "lessons".to_string() }
fn default_progress_dir() -> String { "progress".to_string() }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.4 }
fn default_openai_timeout_seconds() -> u64 { 120 }

fn default_true() -> bool {
    true
}

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("LESSON_HUB_WORK_DIR").ok();
    let log_level_override = env::var("LESSON_HUB_LOG_LEVEL").ok();
    let mut config = load_from(
        Path::new(path.unwrap_or("config/default.toml")),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )?;
    config.llm_api_key = env::var("LLM_API_KEY").ok().filter(|k| !k.trim().is_empty());
    Ok(config)
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let hub = parsed.hub;

    let work_dir = expand_home(work_dir_override.unwrap_or(&hub.work_dir));
    let log_level = log_level_override.unwrap_or(&hub.log_level).to_string();

    logger::parse_filter(&log_level).map_err(|e| AppError::Config(format!("[hub].log_level: {e}")))?;
    if hub.user_id.trim().is_empty() {
        return Err(AppError::Config("[hub].user_id must not be empty".into()));
    }
    if parsed.specialists.timeout_seconds == Some(0) {
        return Err(AppError::Config("[specialists].timeout_seconds must be positive".into()));
    }

    let storage = StorageConfig {
        lessons_dir: resolve_under(&work_dir, &parsed.storage.lessons_dir),
        progress_dir: resolve_under(&work_dir, &parsed.storage.progress_dir),
    };

    Ok(Config {
        name: hub.name,
        work_dir,
        log_level,
        user_id: hub.user_id,
        storage,
        specialists: SpecialistsConfig {
            timeout_seconds: parsed.specialists.timeout_seconds,
            notifications: parsed.specialists.notifications,
            progress_commentary: parsed.specialists.progress_commentary,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: None,
    })
}

/// Resolve a storage path: `~` expands, absolute stays, relative joins `work_dir`.
fn resolve_under(work_dir: &Path, raw: &str) -> PathBuf {
    let path = expand_home(raw);
    if path.is_absolute() {
        path
    } else {
        work_dir.join(path)
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
