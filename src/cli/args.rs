use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::models::ProviderKind;

#[derive(Parser, Debug)]
#[command(name = "promptgate")]
#[command(version)]
#[command(about = "One prompt interface for OpenAI, Google Gemini and local Ollama models", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show configured providers and whether Ollama is reachable
    Info,
    /// List available models
    Models {
        /// Only list models of this provider (openai, gemini, ollama)
        #[arg(short, long)]
        provider: Option<ProviderKind>,
    },
    /// Send a single prompt
    Ask {
        /// Provider to use (defaults to Ollama when use_ollama is set, otherwise OpenAI)
        #[arg(short, long)]
        provider: Option<ProviderKind>,

        /// Model name or alias
        #[arg(short, long)]
        model: Option<String>,

        /// Image file to attach
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Prompt text
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Download an Ollama model unless it is already installed
    Pull {
        /// Model name, e.g. llama3 or mistral:7b
        model: String,
    },
    /// Initialize configuration
    Init,
    /// Manage git-versioned projects
    #[command(subcommand)]
    Project(ProjectCommand),
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project, optionally seeded with local files
    Create {
        name: String,

        /// Local files to copy into the project
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },
    /// List projects
    List,
    /// Show project metadata and files
    Show { id: String },
    /// Print a project file
    Read { id: String, path: String },
    /// Replace a project file's content (reads stdin when no content is given)
    Write {
        id: String,
        path: String,
        content: Option<String>,
    },
    /// Copy a local file into a project
    Upload {
        id: String,
        file: PathBuf,

        /// Name inside the project (defaults to the local file name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Show the commit history of a project
    History { id: String },
    /// Print a file as it was at a given commit
    Version { id: String, hash: String, path: String },
    /// Export a project's files as a zip archive
    Download {
        id: String,

        /// Archive path (defaults to the project name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "promptgate", "ask", "--provider", "google", "-m", "gemini-1.5-pro", "describe", "this",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask { provider, model, image, prompt } => {
                assert_eq!(provider, Some(ProviderKind::Gemini));
                assert_eq!(model.as_deref(), Some("gemini-1.5-pro"));
                assert!(image.is_none());
                assert_eq!(prompt, vec!["describe", "this"]);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["promptgate", "models", "--output-format", "json", "-v"]).unwrap();
        assert_eq!(cli.output_format, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_project_download() {
        let cli = Cli::try_parse_from(["promptgate", "project", "download", "abc", "-o", "out.zip"]).unwrap();
        match cli.command {
            Commands::Project(ProjectCommand::Download { id, output }) => {
                assert_eq!(id, "abc");
                assert_eq!(output, Some(PathBuf::from("out.zip")));
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(Cli::try_parse_from(["promptgate", "models", "--provider", "anthropic"]).is_err());
    }
}
