use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "worktracker",
    about = "Worker time tracking with AI-generated daily reports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the API server and the daily report scheduler.
    Serve,
    /// Generate reports once for a given day (defaults to yesterday UTC).
    Report {
        #[arg(long)]
        date: Option<String>,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
    Status,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum AiCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}
