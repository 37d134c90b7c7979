/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";

// Timeouts
pub const PROBE_TIMEOUT_MS: u64 = 3000;
pub const CATALOG_TIMEOUT_MS: u64 = 5000;
pub const CONNECT_TIMEOUT_SECS: u64 = 10;
pub const CLI_LIST_TIMEOUT_SECS: u64 = 30;
pub const CLI_PULL_TIMEOUT_SECS: u64 = 1800;

// Default Model Configuration
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
pub const DEFAULT_OLLAMA_MODEL: &str = "codellama";
pub const DEFAULT_OPENAI_MAX_TOKENS: usize = 4096;
pub const DEFAULT_GEMINI_MAX_TOKENS: usize = 4096;
pub const DEFAULT_OLLAMA_MAX_TOKENS: usize = 32768;
pub const GEMINI_TOP_P: f32 = 0.95;
pub const GEMINI_TOP_K: u32 = 64;

// Key files
pub const OPENAI_KEY_FILE: &str = "openai-api-key.txt";
pub const GOOGLE_KEY_FILE: &str = "google-api-key.txt";

// Ollama CLI
pub const OLLAMA_BINARY: &str = "ollama";

#[cfg(target_os = "windows")]
pub const OLLAMA_PLATFORM_PATH: &str = r"C:\Program Files\Ollama\ollama.exe";
#[cfg(target_os = "macos")]
pub const OLLAMA_PLATFORM_PATH: &str = "/Applications/Ollama.app/Contents/Resources/ollama";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const OLLAMA_PLATFORM_PATH: &str = "/usr/local/bin/ollama";

// Static catalogs used when discovery is unavailable
pub const DEFAULT_OPENAI_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
    "gpt-4-vision",
    "gpt-4-turbo-preview",
    "gpt-4-32k",
    "gpt-3.5-turbo-16k",
];

pub const DEFAULT_GEMINI_MODELS: &[&str] = &[
    "gemini-pro",
    "gemini-pro-vision",
    "gemini-ultra",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-1.0-pro",
    "gemini-pro-code",
    "gemini-1.5-pro-latest",
    "gemini-1.5-flash-latest",
];

pub const DEFAULT_OLLAMA_MODELS: &[&str] = &[
    "codellama",
    "llama3",
    "mistral",
    "gemma",
    "phi",
    "mixtral",
    "llama2",
    "llama2-uncensored",
    "llama3-8b",
    "llama3-70b",
    "deepseek-coder",
    "neural-chat",
    "wizard-math",
    "falcon",
    "orca-mini",
    "stable-code",
    "qwen",
    "yi",
];

// Project store
pub const PROJECT_METADATA_FILE: &str = "project.json";
pub const GIT_SIGNATURE_NAME: &str = "promptgate";
pub const GIT_SIGNATURE_EMAIL: &str = "promptgate@local";

/// Convert a static list into an owned catalog
pub fn owned_list(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
