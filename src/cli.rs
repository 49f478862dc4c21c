//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// YoAnalyst - answers data-analysis questions within a time budget
///
/// Routes a question to the Wikipedia films runner, the Indian high court
/// dataset runner, or a generic analysis of an attached CSV/Parquet file,
/// and prints the answer as JSON.
///
/// Examples:
///   yoanalyst --questions questions.txt
///   yoanalyst --questions questions.txt --file data.csv --output answer.json
///   yoanalyst --serve --bind 0.0.0.0:8000
///   yoanalyst --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// File holding the question text
    #[arg(
        short = 'Q',
        long,
        value_name = "FILE",
        required_unless_present_any = ["serve", "init_config"]
    )]
    pub questions: Option<PathBuf>,

    /// Attach a data file (repeatable)
    #[arg(short, long, value_name = "FILE")]
    pub file: Vec<PathBuf>,

    /// Write the answer JSON here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pretty-print the answer JSON
    #[arg(long)]
    pub pretty: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .yoanalyst.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Serve the HTTP API instead of answering one question
    #[arg(long, conflicts_with = "questions")]
    pub serve: bool,

    /// Address the HTTP server listens on
    #[arg(long, value_name = "ADDR", env = "YOANALYST_BIND")]
    pub bind: Option<String>,

    /// Seconds a request may keep starting new work
    #[arg(long, value_name = "SECS", env = "YOANALYST_BUDGET")]
    pub budget: Option<u64>,

    /// Byte ceiling for each encoded plot
    #[arg(long, value_name = "BYTES")]
    pub max_image_bytes: Option<usize>,

    /// First DPI tried when rendering plots
    #[arg(long, value_name = "DPI")]
    pub dpi: Option<u32>,

    /// Override the highest-grossing films page
    #[arg(long, value_name = "URL")]
    pub wiki_url: Option<String>,

    /// Generate a default .yoanalyst.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref questions) = self.questions {
            if !questions.is_file() {
                return Err(format!(
                    "Questions file does not exist: {}",
                    questions.display()
                ));
            }
        }

        for file in &self.file {
            if !file.is_file() {
                return Err(format!("Attached file does not exist: {}", file.display()));
            }
        }

        if self.serve && (!self.file.is_empty() || self.output.is_some()) {
            return Err("--file and --output cannot be used with --serve".to_string());
        }

        if self.budget == Some(0) {
            return Err("Budget must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
