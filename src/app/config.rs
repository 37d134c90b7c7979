use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MAX_TOKENS, DEFAULT_GEMINI_MODEL, DEFAULT_OLLAMA_MAX_TOKENS,
    DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MAX_TOKENS,
    DEFAULT_OPENAI_MODEL, DEFAULT_TEMPERATURE, CLI_PULL_TIMEOUT_SECS, GOOGLE_KEY_FILE, OPENAI_KEY_FILE,
};
use crate::models::{ProviderConfig, ProviderKind};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Prefer the local Ollama model when a request names no provider
    #[serde(default)]
    pub use_ollama: bool,

    /// Sampling temperature shared by every provider
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "CloudConfig::openai")]
    pub openai: CloudConfig,

    #[serde(default = "CloudConfig::gemini")]
    pub gemini: CloudConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub projects: ProjectsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_ollama: false,
            temperature: DEFAULT_TEMPERATURE,
            openai: CloudConfig::openai(),
            gemini: CloudConfig::gemini(),
            ollama: OllamaConfig::default(),
            projects: ProjectsConfig::default(),
        }
    }
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Settings for a hosted provider (OpenAI, Gemini)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// API key; a non-empty key file takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// File holding the API key, relative to the working directory
    pub api_key_file: PathBuf,
    pub base_url: String,
    pub model: String,
    pub max_tokens: usize,
}

impl CloudConfig {
    fn openai() -> Self {
        Self {
            api_key: None,
            api_key_file: PathBuf::from(OPENAI_KEY_FILE),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            max_tokens: DEFAULT_OPENAI_MAX_TOKENS,
        }
    }

    fn gemini() -> Self {
        Self {
            api_key: None,
            api_key_file: PathBuf::from(GOOGLE_KEY_FILE),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            max_tokens: DEFAULT_GEMINI_MAX_TOKENS,
        }
    }

    /// Resolve the API key: key file first, then the configured value
    pub fn resolve_api_key(&self) -> Option<String> {
        match std::fs::read_to_string(&self.api_key_file) {
            Ok(contents) if !contents.trim().is_empty() => {
                debug!("Loaded API key from {}", self.api_key_file.display());
                return Some(contents.trim().to_string());
            },
            Ok(_) => {},
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
            Err(err) => warn!("Could not read key file {}: {}", self.api_key_file.display(), err),
        }
        self.api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// Ollama configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server
    pub url: String,
    pub model: String,
    pub max_tokens: usize,
    /// Upper bound for `ollama pull` when the CLI fallback is used
    pub pull_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            max_tokens: DEFAULT_OLLAMA_MAX_TOKENS,
            pull_timeout_secs: CLI_PULL_TIMEOUT_SECS,
        }
    }
}

/// Project store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectsConfig {
    /// Directory holding all projects; defaults to the user data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl Config {
    /// Build the immutable per-provider settings, resolving API keys once
    pub fn provider(&self, kind: ProviderKind) -> ProviderConfig {
        match kind {
            ProviderKind::OpenAI => ProviderConfig::new(
                kind,
                &self.openai.base_url,
                self.openai.resolve_api_key(),
                &self.openai.model,
                self.openai.max_tokens,
                self.temperature,
            ),
            ProviderKind::Gemini => ProviderConfig::new(
                kind,
                &self.gemini.base_url,
                self.gemini.resolve_api_key(),
                &self.gemini.model,
                self.gemini.max_tokens,
                self.temperature,
            ),
            ProviderKind::Ollama => ProviderConfig::new(
                kind,
                &self.ollama.url,
                None,
                &self.ollama.model,
                self.ollama.max_tokens,
                self.temperature,
            ),
        }
    }

    /// Provider used when a request does not name one
    pub fn default_provider(&self) -> ProviderKind {
        if self.use_ollama {
            ProviderKind::Ollama
        } else {
            ProviderKind::OpenAI
        }
    }

    /// Default model of the default provider
    pub fn default_model(&self) -> &str {
        match self.default_provider() {
            ProviderKind::Ollama => &self.ollama.model,
            _ => &self.openai.model,
        }
    }

    /// Root directory of the project store
    pub fn projects_root(&self) -> Result<PathBuf> {
        match &self.projects.root {
            Some(root) => Ok(root.clone()),
            None => Ok(get_data_dir()?.join("projects")),
        }
    }
}

/// Plain environment variables understood without the `PROMPTGATE_` prefix
fn plain_env() -> Env {
    Env::raw().filter_map(|key| {
        let mapped = match key.as_str().to_ascii_uppercase().as_str() {
            "OPENAI_API_KEY" => "openai.api_key",
            "OPENAI_MODEL" => "openai.model",
            "OPENAI_MAX_TOKENS" => "openai.max_tokens",
            "GOOGLE_API_KEY" => "gemini.api_key",
            "GEMINI_MODEL" => "gemini.model",
            "GEMINI_MAX_TOKENS" => "gemini.max_tokens",
            "OLLAMA_API_URL" => "ollama.url",
            "OLLAMA_MODEL" => "ollama.model",
            "OLLAMA_MAX_TOKENS" => "ollama.max_tokens",
            "TEMPERATURE" => "temperature",
            "USE_OLLAMA" => "use_ollama",
            _ => return None,
        };
        Some(mapped.into())
    })
}

/// Assemble every configuration source in precedence order (last wins)
pub fn figment(explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(global_config) = config_dir().map(|dir| dir.join("config.toml")) {
        if global_config.exists() {
            figment = figment.merge(Toml::file(global_config));
        }
    }

    let local_config = PathBuf::from(".promptgate/config.toml");
    if local_config.exists() {
        figment = figment.merge(Toml::file(local_config));
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(plain_env())
        .merge(Env::prefixed("PROMPTGATE_").split("__"))
}

/// Load configuration from multiple sources
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
    }

    figment(explicit)
        .extract()
        .context("Failed to load configuration")
}

fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "promptgate").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the configuration directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = match config_dir() {
        Some(dir) => dir,
        None => {
            // Fallback to home directory
            let home = std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .context("Could not determine home directory")?;
            PathBuf::from(home).join(".config").join("promptgate")
        },
    };
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Get the data directory, creating it if needed
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = ProjectDirs::from("", "", "promptgate")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("Could not determine data directory")?;
    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir)
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p,
        None => get_config_dir()?.join("config.toml"),
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(path)
}

/// Create a default configuration file if it doesn't exist.
/// Returns the path and whether a new file was written.
pub fn init_config() -> Result<(PathBuf, bool)> {
    let config_file = get_config_dir()?.join("config.toml");
    if config_file.exists() {
        return Ok((config_file, false));
    }
    let path = save_config(&Config::default(), Some(config_file))?;
    Ok((path, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ollama.url, "http://localhost:11434");
        assert_eq!(config.ollama.max_tokens, 32768);
        assert_eq!(config.openai.max_tokens, 4096);
        assert_eq!(config.default_provider(), ProviderKind::OpenAI);
        assert_eq!(config.default_model(), "gpt-4o");
    }

    #[test]
    fn test_plain_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                temperature = 0.2
                [ollama]
                url = "http://127.0.0.1:11434"
                model = "mistral"
                max_tokens = 1024
                pull_timeout_secs = 60
                "#,
            )?;
            jail.set_env("OLLAMA_MODEL", "llama3");
            jail.set_env("USE_OLLAMA", "true");
            jail.set_env("OPENAI_MAX_TOKENS", "2048");

            let config = load_config(Some(Path::new("custom.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.ollama.url, "http://127.0.0.1:11434");
            assert_eq!(config.ollama.model, "llama3");
            assert_eq!(config.ollama.max_tokens, 1024);
            assert_eq!(config.openai.max_tokens, 2048);
            assert!((config.temperature - 0.2).abs() < f32::EPSILON);
            assert!(config.use_ollama);
            assert_eq!(config.default_model(), "llama3");
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_nesting() {
        Jail::expect_with(|jail| {
            jail.set_env("PROMPTGATE_GEMINI__MODEL", "gemini-1.5-flash");
            let config = load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(config.gemini.model, "gemini-1.5-flash");
            Ok(())
        });
    }

    #[test]
    fn test_key_file_wins_over_env() {
        Jail::expect_with(|jail| {
            jail.set_env("OPENAI_API_KEY", "sk-from-env");
            jail.set_env("GOOGLE_API_KEY", "g-from-env");
            jail.create_file("openai-api-key.txt", "  sk-from-file \n")?;

            let config = load_config(None).map_err(|e| e.to_string())?;
            let openai = config.provider(ProviderKind::OpenAI);
            assert_eq!(openai.api_key.as_deref(), Some("sk-from-file"));
            let gemini = config.provider(ProviderKind::Gemini);
            assert_eq!(gemini.api_key.as_deref(), Some("g-from-env"));
            assert!(gemini.api_key_present);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        Jail::expect_with(|_jail| {
            assert!(load_config(Some(Path::new("nope.toml"))).is_err());
            Ok(())
        });
    }
}
