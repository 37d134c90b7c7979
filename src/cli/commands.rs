use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use colored::Colorize;
use serde::Serialize;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::{
    app::{init_config, Config},
    models::{GenerationRequest, ProviderKind, ProviderResolver},
    ollama::start_hint,
    projects::{FileUpload, ProjectStore},
};

use super::{Cli, Commands, OutputFormat, ProjectCommand};

/// Handle CLI subcommands
pub async fn handle_command(cli: &Cli, config: &Config) -> Result<()> {
    let format = cli.output_format;
    match &cli.command {
        Commands::Init => init(format),
        Commands::Info => show_info(&ProviderResolver::new(config), format).await,
        Commands::Models { provider } => list_models(&ProviderResolver::new(config), *provider, format).await,
        Commands::Ask {
            provider,
            model,
            image,
            prompt,
        } => {
            let mut request = GenerationRequest::new(prompt.join(" "));
            if let Some(model) = model {
                request = request.with_model(model.as_str());
            }
            if let Some(image) = image {
                request = request.with_image(image_data_url(image)?);
            }
            ask(&ProviderResolver::new(config), *provider, &request, format).await
        },
        Commands::Pull { model } => pull(&ProviderResolver::new(config), model, format).await,
        Commands::Project(command) => {
            let store = ProjectStore::new(config.projects_root()?);
            handle_project(&store, command, format)
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn check(ok: bool) -> colored::ColoredString {
    if ok {
        "[OK]".green()
    } else {
        "[--]".yellow()
    }
}

fn init(format: OutputFormat) -> Result<()> {
    let (path, created) = init_config()?;
    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({ "path": path, "created": created }));
    }
    if created {
        println!("Configuration written to {}", path.display().to_string().green());
    } else {
        println!("Configuration already exists at {}", path.display());
    }
    Ok(())
}

/// Show provider configuration and Ollama status
async fn show_info(resolver: &ProviderResolver, format: OutputFormat) -> Result<()> {
    let info = resolver.system_info().await;
    if format == OutputFormat::Json {
        return print_json(&info);
    }

    println!("{}", "Providers:".bold());
    println!("  {} OpenAI API key", check(info.openai_key_present));
    println!("  {} Google API key", check(info.gemini_key_present));
    if info.ollama_running {
        println!(
            "  {} Ollama: running at {} ({} models installed)",
            check(true),
            info.ollama_url,
            info.ollama_models.len()
        );
        for model in info.ollama_models.iter().take(3) {
            println!("      • {}", model);
        }
        if info.ollama_models.len() > 3 {
            println!("      ... and {} more", info.ollama_models.len() - 3);
        }
    } else {
        println!("  {} Ollama: not reachable at {}", check(false), info.ollama_url);
    }
    println!("  {} Ollama CLI installed", check(info.ollama_cli_installed));

    println!();
    println!("Default: {} / {}", resolver.default_provider(), info.default_model.cyan());
    println!("Temperature: {}", info.temperature);
    Ok(())
}

/// List available models, either for every provider or just one
async fn list_models(resolver: &ProviderResolver, provider: Option<ProviderKind>, format: OutputFormat) -> Result<()> {
    if let Some(kind) = provider {
        let models = resolver.list_provider_models(kind).await;
        if format == OutputFormat::Json {
            return print_json(&models);
        }
        print_group(kind, &models);
        return Ok(());
    }

    let catalog = resolver.list_models().await;
    if format == OutputFormat::Json {
        return print_json(&catalog);
    }

    print_group(ProviderKind::OpenAI, &catalog.openai);
    print_group(ProviderKind::Gemini, &catalog.gemini);
    print_group(ProviderKind::Ollama, &catalog.ollama);
    println!("Default model: {}", catalog.default_model.cyan());
    Ok(())
}

fn print_group(kind: ProviderKind, models: &[String]) {
    println!("{}:", kind.to_string().bold());
    if models.is_empty() {
        println!("  (none, API key not configured)");
    }
    for model in models {
        println!("  • {}", model.green());
    }
}

async fn ask(
    resolver: &ProviderResolver,
    provider: Option<ProviderKind>,
    request: &GenerationRequest,
    format: OutputFormat,
) -> Result<()> {
    let kind = provider.unwrap_or_else(|| resolver.default_provider());

    let result = match resolver.generate(kind, request).await {
        Ok(result) => result,
        Err(err) => {
            if err.is_retryable() && kind.is_local() {
                eprintln!("{}", start_hint().yellow());
            }
            return Err(err).with_context(|| format!("{} request failed", kind));
        },
    };

    if format == OutputFormat::Json {
        return print_json(&result);
    }

    if result.pulled {
        eprintln!("{}", format!("Pulled model '{}' before answering", result.model_used).dimmed());
    }
    println!("{}", result.text);
    if let Some(usage) = &result.usage {
        eprintln!(
            "{}",
            format!(
                "[{}] {} prompt + {} completion tokens",
                result.model_used, usage.prompt_tokens, usage.completion_tokens
            )
            .dimmed()
        );
    }
    Ok(())
}

async fn pull(resolver: &ProviderResolver, model: &str, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Text {
        println!("Checking model '{}'...", model);
    }
    let outcome = resolver.pull_model(model).await?;
    if format == OutputFormat::Json {
        return print_json(&outcome);
    }
    println!("{}", outcome.message.green());
    Ok(())
}

fn handle_project(store: &ProjectStore, command: &ProjectCommand, format: OutputFormat) -> Result<()> {
    match command {
        ProjectCommand::Create { name, files } => {
            let uploads = files
                .iter()
                .map(|path| read_upload(path, None))
                .collect::<Result<Vec<_>>>()?;
            let project = store.create(name, &uploads)?;
            if format == OutputFormat::Json {
                return print_json(&project);
            }
            println!("Created project {} ({})", project.name.green(), project.id);
        },
        ProjectCommand::List => {
            let projects = store.list()?;
            if format == OutputFormat::Json {
                return print_json(&projects);
            }
            if projects.is_empty() {
                println!("No projects in {}", store.root().display());
            }
            for project in projects {
                println!(
                    "  {}  {}  (updated {})",
                    project.id.dimmed(),
                    project.name.green(),
                    project.updated.format("%Y-%m-%d %H:%M")
                );
            }
        },
        ProjectCommand::Show { id } => {
            let details = store.show(id)?;
            if format == OutputFormat::Json {
                return print_json(&details);
            }
            println!("{} ({})", details.metadata.name.bold(), details.metadata.id);
            println!("Created: {}", details.metadata.created.to_rfc3339());
            println!("Updated: {}", details.metadata.updated.to_rfc3339());
            for file in details.files {
                println!("  • {} ({} bytes)", file.path, file.size);
            }
        },
        ProjectCommand::Read { id, path } => {
            let content = store.read_file(id, path)?;
            if format == OutputFormat::Json {
                return print_json(&serde_json::json!({ "path": path, "content": content }));
            }
            print!("{}", content);
        },
        ProjectCommand::Write { id, path, content } => {
            let content = match content {
                Some(content) => content.clone(),
                None => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("Failed to read content from stdin")?;
                    buffer
                },
            };
            let project = store.write_file(id, path, &content)?;
            if format == OutputFormat::Json {
                return print_json(&project);
            }
            println!("Updated {} in {}", path.green(), project.name);
        },
        ProjectCommand::Upload { id, file, name } => {
            let upload = read_upload(file, name.as_deref())?;
            let stored = store.upload_file(id, &upload.name, &upload.content)?;
            if format == OutputFormat::Json {
                return print_json(&stored);
            }
            println!("Uploaded {} ({} bytes)", stored.path.green(), stored.size);
        },
        ProjectCommand::History { id } => {
            let history = store.history(id)?;
            if format == OutputFormat::Json {
                return print_json(&history);
            }
            for commit in history {
                println!(
                    "{} {} {} {}",
                    commit.hash.chars().take(8).collect::<String>().yellow(),
                    commit.date.format("%Y-%m-%d %H:%M"),
                    commit.author.dimmed(),
                    commit.message
                );
            }
        },
        ProjectCommand::Download { id, output } => {
            let mut buffer = Cursor::new(Vec::new());
            let archive_name = store.export_zip(id, &mut buffer)?;
            let target = output.clone().unwrap_or_else(|| PathBuf::from(&archive_name));
            std::fs::write(&target, buffer.into_inner())
                .with_context(|| format!("Failed to write {}", target.display()))?;
            if format == OutputFormat::Json {
                return print_json(&serde_json::json!({ "id": id, "path": target }));
            }
            println!("Exported project to {}", target.display().to_string().green());
        },
        ProjectCommand::Version { id, hash, path } => {
            let content = store.file_at_version(id, hash, path)?;
            if format == OutputFormat::Json {
                return print_json(&serde_json::json!({ "hash": hash, "path": path, "content": content }));
            }
            print!("{}", content);
        },
    }
    Ok(())
}

fn read_upload(path: &Path, name: Option<&str>) -> Result<FileUpload> {
    let content = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("No file name in {}", path.display()))?,
    };
    Ok(FileUpload::new(name, content))
}

/// Read an image file into a `data:` URL
pub fn image_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(format!("data:{};base64,{}", image_mime(path), STANDARD.encode(bytes)))
}

fn image_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}
