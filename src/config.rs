use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    pub collections: CollectionsConfig,
    #[serde(default)]
    pub properties: PropertiesConfig,
    #[serde(default)]
    pub lexicon: LexiconConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_api_base")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Host of user-facing links. The `www.` prefix makes the desktop
    /// client open links itself instead of handing them to a browser.
    #[serde(default = "default_link_base")]
    pub link_base: String,
    #[serde(default = "default_view_param")]
    pub view_param: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            api_version: default_api_version(),
            token_env: default_token_env(),
            link_base: default_link_base(),
            view_param: default_view_param(),
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.notion.com/v1".to_string()
}
fn default_api_version() -> String {
    "2022-06-28".to_string()
}
fn default_token_env() -> String {
    "NOTION_KEY".to_string()
}
fn default_link_base() -> String {
    "https://www.notion.so".to_string()
}
fn default_view_param() -> String {
    "pvs=4".to_string()
}
fn default_page_size() -> u32 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionsConfig {
    /// Database whose rows tagged as contexts are the sync roots.
    pub contexts: String,
    pub words: String,
    pub expressions: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PropertiesConfig {
    #[serde(default = "default_title_property")]
    pub title: String,
    #[serde(default = "default_context_tag_property")]
    pub context_tag_property: String,
    #[serde(default = "default_context_tag")]
    pub context_tag: String,
    #[serde(default = "default_last_extracted")]
    pub last_extracted: String,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        Self {
            title: default_title_property(),
            context_tag_property: default_context_tag_property(),
            context_tag: default_context_tag(),
            last_extracted: default_last_extracted(),
        }
    }
}

fn default_title_property() -> String {
    "Name".to_string()
}
fn default_context_tag_property() -> String {
    "type".to_string()
}
fn default_context_tag() -> String {
    "Contexts".to_string()
}
fn default_last_extracted() -> String {
    "Last extracted time".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LexiconConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_lexicon_base")]
    pub base_url: String,
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default = "default_audio_base")]
    pub audio_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_lexicon_base(),
            key_env: default_key_env(),
            audio_base: default_audio_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_lexicon_base() -> String {
    "https://www.dictionaryapi.com/api/v3/references/collegiate/json".to_string()
}
fn default_key_env() -> String {
    "MERRIAM_WEBSTER_KEY".to_string()
}
fn default_audio_base() -> String {
    "https://media.merriam-webster.com/audio/prons/en/us/mp3".to_string()
}

impl LexiconConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate collections
    for (key, value) in [
        ("collections.contexts", &config.collections.contexts),
        ("collections.words", &config.collections.words),
        ("collections.expressions", &config.collections.expressions),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{} must not be empty", key);
        }
    }
    if crate::models::normalize_id(&config.collections.words)
        == crate::models::normalize_id(&config.collections.expressions)
    {
        anyhow::bail!("collections.words and collections.expressions must be different databases");
    }

    // Validate workspace
    if !(1..=100).contains(&config.workspace.page_size) {
        anyhow::bail!("workspace.page_size must be in [1, 100]");
    }
    if config.workspace.link_base.ends_with('/') {
        anyhow::bail!("workspace.link_base must not end with '/'");
    }

    match config.lexicon.provider.as_str() {
        "disabled" | "merriam-webster" => {}
        other => anyhow::bail!(
            "Unknown lexicon provider: '{}'. Must be disabled or merriam-webster.",
            other
        ),
    }

    Ok(config)
}
