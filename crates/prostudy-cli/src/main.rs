//! Pro-Study CLI
//!
//! Serves the study session over HTTP and WebSocket, or generates a single
//! lesson and writes it to disk.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use prostudy_orchestrator::{
    create_router, piercing_atlas, seed_curriculum, AppState, Completion, Config, GeminiClient,
    GenerateRequest, LessonService, RequestState, Session, StudyController, StudyError, TopicNode,
};
use prostudy_report::json::JsonGenerator;
use prostudy_report::{ExportFormat, LessonDocument, MarkdownGenerator};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Piercer's Pro-Study - curriculum study engine
///
/// Browses a piercing curriculum and generates structured lessons through
/// the Gemini API.
#[derive(Parser, Debug)]
#[command(name = "prostudy")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory containing prostudy.json (default: current directory)
    #[arg(short, long, value_name = "DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and WebSocket server
    Serve {
        /// Interface to bind (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate one lesson and write it to the output directory
    Lesson {
        /// Lesson title, e.g. "Daith"
        #[arg(value_name = "TITLE")]
        title: String,

        /// Request the full deep-dive field set
        #[arg(short, long)]
        deep_dive: bool,

        /// Export format: markdown or json
        #[arg(short, long, default_value = "markdown")]
        format: String,

        /// Output directory (overrides the config file)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<String>,
    },

    /// Print the seed curriculum tree
    Tree,

    /// Print the piercing atlas
    Atlas,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!(config_dir = ?args.config_dir, "Config directory");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Exit status for a failed run: 2 when the process could not start, 1 otherwise.
fn exit_code(error: &anyhow::Error) -> u8 {
    if error
        .downcast_ref::<StudyError>()
        .is_some_and(StudyError::is_fatal)
    {
        2
    } else {
        1
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Serve { host, port } => {
            let mut config = load_config(args.config_dir.as_deref())?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            config.validate()?;
            serve(config).await
        }
        Command::Lesson {
            title,
            deep_dive,
            format,
            output_dir,
        } => {
            let mut config = load_config(args.config_dir.as_deref())?;
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            config.validate()?;

            let format = ExportFormat::parse(&format).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown export format '{format}'\n\nSuggestion: Use --format markdown or --format json"
                )
            })?;
            generate_lesson(&config, GenerateRequest::new(title, deep_dive), format).await
        }
        Command::Tree => {
            print_tree(&seed_curriculum());
            Ok(())
        }
        Command::Atlas => {
            print_atlas();
            Ok(())
        }
    }
}

/// Loads `prostudy.json` from the given directory or the working directory.
fn load_config(config_dir: Option<&Path>) -> anyhow::Result<Config> {
    match config_dir {
        Some(dir) => {
            if !dir.is_dir() {
                anyhow::bail!(
                    "Config directory not found: '{}'\n\nSuggestion: Check the path or remove the --config-dir flag to use the current directory",
                    dir.display()
                );
            }
            Ok(Config::load_from_dir(dir)?)
        }
        None => Ok(Config::load()?),
    }
}

fn build_client(config: &Config) -> anyhow::Result<GeminiClient> {
    let api_key = config.resolve_api_key()?;
    Ok(GeminiClient::new(config, api_key))
}

/// Runs the HTTP server until Ctrl+C.
async fn serve(config: Config) -> anyhow::Result<()> {
    let client = build_client(&config)?;
    let controller = StudyController::new(Arc::new(client));

    let addr = config.bind_address();
    print_config(&config);

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    let router = create_router(AppState::new(controller));

    println!();
    println!("Pro-Study API running on http://{addr}");
    println!("WebSocket events on ws://{addr}/ws");
    println!("Press Ctrl+C to stop");
    tracing::info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

/// Generates one lesson through a throwaway session and exports it.
async fn generate_lesson(
    config: &Config,
    request: GenerateRequest,
    format: ExportFormat,
) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let mut session = Session::new();
    let ticket = session.begin_lesson(request)?;

    println!(
        "Generating {}lesson: {}",
        if ticket.request.deep_dive { "deep-dive " } else { "" },
        ticket.request.title
    );

    let result = client
        .generate_lesson(&ticket.request.title, ticket.request.deep_dive)
        .await;

    if session.complete_lesson(&ticket, result) != Completion::Succeeded {
        let message = match session.lesson_state() {
            RequestState::Error { message } => message.clone(),
            other => format!("lesson ended in state '{}'", other.name()),
        };
        anyhow::bail!("{message}");
    }

    let document = session.lesson_document(chrono::Utc::now())?;
    let path = write_lesson(&document, format, Path::new(&config.output_dir))?;

    println!("  Lesson written: {}", path.display());
    Ok(())
}

/// Writes the document into `output_dir`, creating the directory if needed.
fn write_lesson(
    document: &LessonDocument,
    format: ExportFormat,
    output_dir: &Path,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(document.file_name(format));

    match format {
        ExportFormat::Json => JsonGenerator::new(document).write_to_file(&path, true)?,
        ExportFormat::Markdown => {
            std::fs::write(&path, MarkdownGenerator::new(document).generate())?;
        }
    }

    Ok(path)
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  API base URL: {}", config.api_base_url);
    println!("  Lesson model: {}", config.lesson_model);
    println!("  Suggestion model: {}", config.suggestion_model);
    println!("  Lesson temperature: {}", config.lesson_temperature);
    println!("  Output directory: {}", config.output_dir);
}

fn print_tree(roots: &[TopicNode]) {
    fn walk(node: &TopicNode, depth: usize) {
        println!("{}{} [{}]", "  ".repeat(depth), node.title, node.id);
        for child in &node.subtopics {
            walk(child, depth + 1);
        }
    }

    for root in roots {
        walk(root, 0);
    }
}

fn print_atlas() {
    for category in piercing_atlas().categories {
        println!("{}", category.category);
        for piercing in &category.piercings {
            println!("  - {piercing}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn document() -> LessonDocument {
        LessonDocument::builder()
            .title("Daith")
            .section("Aftercare", "Saline twice daily")
            .build()
            .unwrap()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("prostudy-cli-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_write_lesson_json_creates_directory() {
        let dir = scratch_dir("json");
        let path = write_lesson(&document(), ExportFormat::Json, &dir.join("nested")).unwrap();

        assert_eq!(path.file_name().unwrap(), "daith.json");
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("\"title\": \"Daith\""));
        assert!(body.contains("Saline twice daily"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_lesson_markdown() {
        let dir = scratch_dir("markdown");
        let path = write_lesson(&document(), ExportFormat::Markdown, &dir).unwrap();

        assert_eq!(path.file_name().unwrap(), "daith.md");
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Daith"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_exit_code_for_fatal_config_error() {
        let invalid_config = anyhow::Error::from(StudyError::config_validation(
            "port must not be zero",
            "Set a port between 1 and 65535",
        ));
        assert_eq!(exit_code(&invalid_config), 2);

        let generation = anyhow::Error::from(StudyError::generation("Daith", "quota exhausted"));
        assert_eq!(exit_code(&generation), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("bind failed")), 1);
    }
}
