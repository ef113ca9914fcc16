use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use lurehive_provider::ProviderConfig;
use serde::{Deserialize, Serialize};

use super::persona::PersonaProfile;

pub const CONFIG_FILE_NAME: &str = "lurehive.yaml";

pub const DEFAULT_CALLBACK_URL: &str = "https://hackathon.guvi.in/api/updateHoneyPotFinalResult";

fn default_max_turns() -> u32 {
    15
}

fn default_min_intelligence_threshold() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Hard cap on engaged turns per conversation
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_min_intelligence_threshold")]
    pub min_intelligence_threshold: usize,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            min_intelligence_threshold: default_min_intelligence_threshold(),
        }
    }
}

fn default_callback_url() -> String {
    DEFAULT_CALLBACK_URL.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_reporter_timeout_secs() -> u64 {
    15
}

fn default_backoff_base_secs() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default = "default_callback_url")]
    pub callback_url: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_reporter_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// When false, final results are only logged
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            callback_url: default_callback_url(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_reporter_timeout_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            enabled: true,
        }
    }
}

fn default_generator_model() -> String {
    "llama3-70b-8192".to_string()
}

fn default_generator_timeout_secs() -> u64 {
    10
}

fn default_generator_max_tokens() -> u32 {
    150
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_generator_model")]
    pub model: String,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_generator_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: ProviderConfig::default(),
            model: default_generator_model(),
            timeout_secs: default_generator_timeout_secs(),
            max_tokens: default_generator_max_tokens(),
        }
    }
}

fn default_max_age_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age_hours(),
            max_concurrent: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LurehiveConfig {
    #[serde(default)]
    pub engagement: EngagementConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub persona: PersonaProfile,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `<root>/lurehive.yaml`. A missing file yields the defaults.
pub fn load_config(root: &Path) -> Result<LurehiveConfig> {
    let path = root.join(CONFIG_FILE_NAME);
    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        parse_config(&content)
            .with_context(|| format!("failed to parse yaml file: {}", path.display()))?
    } else {
        tracing::info!("No config at {}, using defaults", path.display());
        LurehiveConfig::default()
    };

    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<LurehiveConfig> {
    if content.trim().is_empty() {
        return Ok(LurehiveConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

pub fn validate_config(config: &LurehiveConfig) -> Result<()> {
    if config.engagement.max_turns == 0 {
        return Err(anyhow!("engagement.max_turns must be at least 1"));
    }

    if config.reporter.max_attempts == 0 {
        return Err(anyhow!("reporter.max_attempts must be at least 1"));
    }

    if config.reporter.timeout_secs == 0 {
        return Err(anyhow!("reporter.timeout_secs must be at least 1"));
    }

    if config.reporter.enabled && config.reporter.callback_url.trim().is_empty() {
        return Err(anyhow!("reporter.callback_url is empty"));
    }

    if config.generator.enabled && config.generator.model.trim().is_empty() {
        return Err(anyhow!("generator is enabled but generator.model is empty"));
    }

    if config.generator.enabled && config.generator.timeout_secs == 0 {
        return Err(anyhow!("generator.timeout_secs must be at least 1"));
    }

    let empty = config.persona.pools.empty_pools();
    if !empty.is_empty() {
        return Err(anyhow!("persona pools are empty: {}", empty.join(", ")));
    }

    if config.sessions.max_age_hours <= 0 {
        return Err(anyhow!("sessions.max_age_hours must be positive"));
    }

    Ok(())
}

fn resolve_config_env(config: &mut LurehiveConfig) {
    config.reporter.callback_url = resolve_env_var(&config.reporter.callback_url);

    let provider = &mut config.generator.provider;
    if let Some(key) = &mut provider.api_key {
        *key = resolve_env_var(key);
    }
    if let Some(base) = &mut provider.base_url {
        *base = resolve_env_var(base);
    }
    config.generator.model = resolve_env_var(&config.generator.model);

    config.persona.id = resolve_env_var(&config.persona.id);
    config.persona.display_name = resolve_env_var(&config.persona.display_name);
}
