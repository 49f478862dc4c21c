//! YoAnalyst - data-analysis question answering
//!
//! Routes a free-text question (plus optional attached files) to the runner
//! that knows its dataset, and returns a JSON answer within a wall-clock
//! budget. Runs once from the command line or as an HTTP service.
//!
//! Exit codes:
//!   0 - An answer was produced (possibly an error answer)
//!   1 - Startup error (arguments, config, unreadable input, bind failure)

mod analysis;
mod artifact;
mod budget;
mod cli;
mod config;
mod error;
mod handler;
mod models;
mod runners;
mod server;
mod sources;
mod table;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use handler::RequestHandler;
use models::{FileSet, Question};
use runners::Dispatcher;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();

    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("YoAnalyst v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = if args.serve {
        run_server(&args).await
    } else {
        run_once(&args, start).await
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default .yoanalyst.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the budget, plot limits, and data sources.");
    Ok(())
}

/// Initialize logging based on verbosity settings. Logs go to stderr so
/// stdout carries only the answer.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        Config::load(config_path)?
    } else {
        match Config::load_default() {
            Ok(Some(config)) => {
                info!("Loaded default config from {}", CONFIG_FILE_NAME);
                config
            }
            Ok(None) => {
                debug!("No config file found, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!("Failed to load config: {}", e);
                Config::default()
            }
        }
    };

    config.merge_with_args(args);
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

/// Build the handler. Constructing the HTTP client blocks, so this runs
/// off the async runtime.
async fn build_handler(config: Config) -> Result<RequestHandler> {
    tokio::task::spawn_blocking(move || -> Result<RequestHandler> {
        let dispatcher = Dispatcher::standard(&config)?;
        debug!("Runners: {:?}", dispatcher.runner_names());
        Ok(RequestHandler::new(dispatcher, config.budget.ceiling()))
    })
    .await
    .context("Handler setup task failed")?
}

/// Read the question and attachments from disk.
fn read_inputs(args: &Args) -> Result<(Question, FileSet)> {
    let question = match args.questions {
        Some(ref path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read questions: {}", path.display()))?;
            Question::from_bytes(&bytes)
        }
        None => Question::new(""),
    };

    let mut files = FileSet::new();
    for path in &args.file {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read attachment: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Attached {} ({} bytes)", name, bytes.len());
        files.insert(name, bytes);
    }

    Ok((question, files))
}

/// Answer one question and print or save the JSON.
async fn run_once(args: &Args, start: Instant) -> Result<()> {
    let config = load_config(args)?;
    let (question, files) = read_inputs(args)?;
    let handler = build_handler(config).await?;

    let answer = tokio::task::spawn_blocking(move || handler.handle(&question, &files, start))
        .await
        .context("Analysis task failed")?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&answer)?
    } else {
        serde_json::to_string(&answer)?
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write answer to {}", path.display()))?;
            info!("Answer saved to {}", path.display());
        }
        None => println!("{}", json),
    }

    info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Serve the HTTP API.
async fn run_server(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let server_config = config.server.clone();
    let handler = build_handler(config).await?;
    server::run(handler, &server_config).await
}
