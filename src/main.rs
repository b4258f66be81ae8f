//! coldreach - personalized cold outreach drafts from a prospect list.
//!
//! Researches each prospect's company, matches it against the sender profile,
//! writes and checks an email, and saves it as a draft for review.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coldreach::core::LlmProviderKind;
use coldreach::pipeline::ValidationReport;
use coldreach::{load_prospects, App, CancelToken, Config, Credentials, RunMode, RunReport};

/// Researched, personalized cold outreach drafts
#[derive(Parser)]
#[command(name = "coldreach")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to .coldreach.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Sender profile YAML (overrides profile.path)
    #[arg(short, long, global = true)]
    profile: Option<PathBuf>,

    /// LLM provider for research and the LLM writer
    #[arg(long, global = true, value_enum)]
    llm: Option<LlmProviderKind>,

    /// Where to write the JSON audit log
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose and quality-check drafts without saving them
    Preview {
        /// Prospect file (.csv, .tsv, .xlsx, .xls or .ods)
        #[arg(short, long)]
        input: PathBuf,

        /// Process at most this many rows
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Compose, check, and save drafts for review
    Draft {
        /// Prospect file (.csv, .tsv, .xlsx, .xls or .ods)
        #[arg(short, long)]
        input: PathBuf,

        /// Process at most this many rows
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Check the input file and sender profile without contacting any service
    Validate {
        /// Prospect file (.csv, .tsv, .xlsx, .xls or .ods)
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(provider) = cli.llm {
        config.llm.provider = provider;
    }
    let app = App::new(config, Credentials::load(None));

    match &cli.command {
        Commands::Preview { input, limit } => cmd_run(&app, &cli, RunMode::Preview, input, *limit),
        Commands::Draft { input, limit } => cmd_run(&app, &cli, RunMode::Draft, input, *limit),
        Commands::Validate { input } => cmd_validate(&app, &cli, input),
    }
}

/// Run the pipeline over the input file.
fn cmd_run(app: &App, cli: &Cli, mode: RunMode, input: &Path, limit: Option<usize>) -> Result<()> {
    let profile = app.load_profile(cli.profile.as_deref())?;
    let rows = load_prospects(input, limit)?;
    let pipeline = app.build_pipeline(profile, mode);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling: finishing prospects in flight, skipping the rest...");
        handler_token.cancel();
    })?;

    let started_at = chrono::Utc::now();
    let rt = tokio::runtime::Runtime::new()?;
    let results = rt.block_on(pipeline.run(rows, &cancel));

    let report = RunReport::new(mode, started_at, results);
    print!("{}", report.render());

    let path = app.output_path(mode, cli.output.as_deref());
    report.write_json(&path)?;
    println!("\nResults saved to {}", path.display());
    Ok(())
}

/// Validate the sender profile and input rows.
fn cmd_validate(app: &App, cli: &Cli, input: &Path) -> Result<()> {
    let profile = app.load_profile(cli.profile.as_deref())?;
    let rows = load_prospects(input, None)?;

    let report = ValidationReport::from_rows(&rows);
    println!(
        "Sender profile: {} ({} skills, {} achievements)",
        profile.name,
        profile.skills.len(),
        profile.achievements.len()
    );
    print!("{}", report.render());

    if let Some(path) = &cli.output {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("\nResults saved to {}", path.display());
    }
    Ok(())
}
