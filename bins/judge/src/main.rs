mod commands;
mod console;
mod engine;
mod evaluator;
mod executor;
mod locator;
mod session;


use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::{Console, InteractiveConsole, Terminal};
use engine::LocalToolchain;
use judge_common::catalog::ProblemCatalog;
use judge_common::config::JudgeConfig;
use session::JudgeApp;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "judge")]
#[command(about = "Judge - Compile and test C++ solutions against local problem sets", long_about = None)]
struct Cli {
    /// Path to judge.json (defaults to $JUDGE_CONFIG, then config/judge.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the user data file
    #[arg(long, global = true)]
    users: Option<PathBuf>,

    /// Override the problem data file
    #[arg(long, global = true)]
    problems: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directories and a default config
    Init {
        /// Project path
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// List problems in the catalog
    List,

    /// Judge one source file against a problem and exit
    Submit {
        /// Problem number (1-based, as shown by `list`)
        #[arg(short, long)]
        problem: usize,

        /// Source file to compile
        #[arg(short, long)]
        source: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .with_line_number(true)
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<JudgeConfig> {
    let mut config = JudgeConfig::resolve(cli.config.as_deref())?;
    if let Some(users) = &cli.users {
        config.user_data_path = users.clone();
    }
    if let Some(problems) = &cli.problems {
        config.problem_data_path = problems.clone();
    }
    Ok(config)
}

async fn run_session<T: Terminal>(config: JudgeConfig, console: T) -> Result<()> {
    let engine = LocalToolchain::new(config.toolchain.clone());
    let mut app = JudgeApp::new(config, engine, console).map_err(|e| {
        error!("Failed to load judge data: {:#}", e);
        e
    })?;

    app.run().await.context("Interactive session failed")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match &cli.command {
        Some(Commands::Init { path }) => {
            commands::init_project(path)?;
        }
        Some(Commands::List) => {
            let config = load_config(&cli)?;
            let catalog = ProblemCatalog::load(&config.problem_data_path)?;
            commands::list_problems(&catalog);
        }
        Some(Commands::Submit {
            problem,
            source,
            json,
        }) => {
            let config = load_config(&cli)?;
            let catalog = ProblemCatalog::load(&config.problem_data_path)?;
            let accepted = commands::submit_once(&config, &catalog, *problem, source, *json).await?;
            if !accepted {
                std::process::exit(1);
            }
        }
        None => {
            let config = load_config(&cli)?;
            info!(
                version = %config.version,
                users = %config.user_data_path.display(),
                problems = %config.problem_data_path.display(),
                "Judge booting..."
            );

            if io::stdin().is_terminal() {
                run_session(config, InteractiveConsole::new()).await?;
            } else {
                run_session(config, Console::new(io::stdin().lock(), io::stdout())).await?;
            }
        }
    }

    Ok(())
}
