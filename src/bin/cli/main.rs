mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wordpractice-cli", about = "Vocabulary practice tracker", version)]
struct Cli {
    /// Config file (default: <config dir>/wordpractice/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user instead of the configured one
    #[arg(long, global = true)]
    user: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Add a word
    Add {
        word: String,
        translation: String,
    },

    /// Remove a word
    Rm {
        word: String,
    },

    /// Change a word's translation
    Translate {
        word: String,
        translation: String,
    },

    /// List words with their mastery
    List,

    /// Pick words for a practice round
    Practice {
        /// Number of words (default from config)
        #[arg(long)]
        count: Option<usize>,
    },

    /// Record a correct answer
    Correct {
        word: String,
        /// Seconds it took to type the answer
        seconds: f64,
    },

    /// Record a missed answer
    Miss {
        word: String,
    },

    /// Reset practice progress for one word, or all words
    Reset {
        word: Option<String>,
    },

    /// Delete every word
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Send pending changes now
    Sync,

    /// Show sync status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let app = app::App::new(cli.config.as_deref(), cli.user.as_deref())?;

    match cli.command {
        Command::Add { word, translation } => {
            commands::words::run_add(&app, &word, &translation, &cli.format).await?;
        }
        Command::Rm { word } => {
            commands::words::run_remove(&app, &word, &cli.format).await?;
        }
        Command::Translate { word, translation } => {
            commands::words::run_translate(&app, &word, &translation, &cli.format).await?;
        }
        Command::List => {
            commands::words::run_list(&app, &cli.format, use_color).await?;
        }
        Command::Practice { count } => {
            commands::practice::run_pick(&app, count, &cli.format).await?;
        }
        Command::Correct { word, seconds } => {
            commands::practice::run_record(&app, &word, Some(seconds), &cli.format, use_color).await?;
        }
        Command::Miss { word } => {
            commands::practice::run_record(&app, &word, None, &cli.format, use_color).await?;
        }
        Command::Reset { word } => {
            commands::practice::run_reset(&app, word.as_deref(), &cli.format).await?;
        }
        Command::Clear { yes } => {
            commands::words::run_clear(&app, yes, &cli.format).await?;
        }
        Command::Sync => {
            commands::sync::run_sync(&app, &cli.format).await?;
        }
        Command::Status => {
            commands::sync::run_status(&app, &cli.format).await?;
        }
    }

    Ok(())
}
