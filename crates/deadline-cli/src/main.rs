#![forbid(unsafe_code)]

mod cmd;
mod output;
mod resolve;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::{GlobalArgs, RunContext};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "dl: pace new review items so a backlog is finished by its deadline",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, value_enum, global = true)]
    format: Option<OutputMode>,

    /// Emit JSON output (alias for `--format json`).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Profile whose deadlines are used (overrides DEADLINE_PROFILE).
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Settings file (overrides DEADLINE_CONFIG).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Review collection database (overrides `collection` in settings).
    #[arg(long, global = true, value_name = "PATH")]
    collection: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn globals(&self) -> GlobalArgs<'_> {
        GlobalArgs {
            profile: self.profile.as_deref(),
            config: self.config.clone(),
            collection: self.collection.clone(),
            format: self.format,
            json: self.json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Deadlines",
        about = "Set a deadline for a group",
        long_about = "Set or replace the target date for a group in the active profile and give \
                      the group its own daily limits in the collection.",
        after_help = "EXAMPLES:\n    # Finish the Spanish deck by the end of the year\n    dl add Spanish 2026-12-31\n\n    # Apply one date to every sub-deck of Lang\n    dl add Lang 2027-03-01 --recursive"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Deadlines",
        about = "Remove a group's deadline",
        after_help = "EXAMPLES:\n    dl remove Spanish"
    )]
    Remove(cmd::remove::RemoveArgs),

    #[command(
        next_help_heading = "Deadlines",
        about = "List deadlines for the active profile",
        after_help = "EXAMPLES:\n    dl list\n\n    # Machine-readable output\n    dl list --format json"
    )]
    List,

    #[command(
        next_help_heading = "Deadlines",
        about = "Recompute and apply daily quotas",
        long_about = "Recompute the daily new-item quota for every group with a deadline in the \
                      active profile and write it to the collection.",
        after_help = "EXAMPLES:\n    # Manual run with a report\n    dl process\n\n    # Startup run without output\n    dl process --silent"
    )]
    Process(cmd::process::ProcessArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Show settings or change the report mode"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    dl completions bash > ~/.local/share/bash-completion/completions/dl"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("DEADLINE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "deadline=debug,info"
        } else {
            "deadline=info,warn"
        })
    });

    let format = env::var("DEADLINE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let ctx = RunContext::resolve(cli.globals())?;
    debug!(command = ?cli.command, "dispatching");

    match &cli.command {
        Commands::Add(args) => cmd::add::run_add(args, &ctx),
        Commands::Remove(args) => cmd::remove::run_remove(args, &ctx),
        Commands::List => cmd::list::run_list(&ctx),
        Commands::Process(args) => cmd::process::run_process(args, &ctx),
        Commands::Config(args) => cmd::config::run_config(args, &ctx),
        Commands::Completions(_) => Ok(()),
    }
}
