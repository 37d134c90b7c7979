/// How to get a local Ollama server running on this OS
pub fn start_hint() -> String {
    let install = if cfg!(target_os = "macos") {
        "brew install ollama, or download from https://ollama.com/download/mac"
    } else if cfg!(target_os = "windows") {
        "download from https://ollama.com/download/windows"
    } else {
        "curl -fsSL https://ollama.com/install.sh | sh"
    };

    format!(
        "Start it with `ollama serve` and try again. To install Ollama: {}",
        install
    )
}
