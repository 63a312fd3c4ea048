mod ai;
mod api;
mod cli;
mod config;
mod db;
mod reporting;
mod scheduler;

use crate::cli::{AiCommands, Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => run_service().await,
        Commands::Report { date } => handle_report(date),
        Commands::Config { command } => handle_config_command(command),
        Commands::Ai { command } => handle_ai_command(command),
        Commands::Status => handle_status(),
    }
}

async fn run_service() -> Result<()> {
    let config = Config::load_or_default()?;
    config.ensure_bootstrap_dirs()?;
    let _ = Database::open(&config.db_path)?;

    let shared_config = Arc::new(config);
    let scheduler_config = Arc::clone(&shared_config);
    let api_config = Arc::clone(&shared_config);

    info!("worktracker service started");

    tokio::select! {
        scheduler_result = scheduler::run_report_scheduler(scheduler_config) => {
            scheduler_result?;
        }
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn handle_report(date: Option<String>) -> Result<()> {
    let config = Config::load_or_default()?;
    let target_date = parse_optional_date(date)?;

    let outcomes = reporting::process_reports(&config, target_date)?;

    println!("Reports generated for {target_date}: {} worker(s)", outcomes.len());
    for outcome in &outcomes {
        if outcome.skipped {
            println!(
                "- {} skipped ({})",
                outcome.worker_id,
                outcome.reason.as_deref().unwrap_or("no reason")
            );
        } else {
            println!("- {} processed", outcome.worker_id);
        }
    }

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_or_default()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_dirs()?;
            config.save()?;

            let masked = if key.contains("api_key") || key.contains("secret") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = Config::load_or_default()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_ai_command(command: AiCommands) -> Result<()> {
    match command {
        AiCommands::Test {
            key,
            endpoint,
            model,
        } => {
            let mut config = Config::load_or_default()?;

            if let Some(value) = key {
                config.ai_api_key = Some(value);
            }
            if let Some(value) = endpoint {
                config.ai_endpoint = value;
            }
            if let Some(value) = model {
                config.ai_model = value;
            }

            let response = ai::test_connection(&config)?;
            println!("AI API connection successful");
            println!("{response}");

            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = Config::load_or_default()?;
    let database = Database::open(&config.db_path)?;

    println!("worktracker status");
    println!("- db_path: {}", config.db_path.display());
    println!("- api_port: {}", config.api_port);
    println!("- report_time: {}", config.report_time);
    println!("- ai_configured: {}", ai::is_configured(&config));
    println!(
        "- cron_secret: {}",
        if config.resolve_cron_secret().is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!(
        "- latest_report_date: {}",
        database
            .latest_report_date()?
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-08-30"))
        })
        .transpose()?
        .map_or_else(|| Ok(reporting::default_target_date()), Ok)
}
