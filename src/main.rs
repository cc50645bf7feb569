//! hotel-nlsql - natural-language questions over the hotel reservation database.

use std::io::Read;

use hotel_nlsql::agent::{Agent, AskOptions, AskOutcome};
use hotel_nlsql::answer::{to_markdown_table, DEFAULT_MAX_PREVIEW};
use hotel_nlsql::cli::{Cli, Command};
use hotel_nlsql::config::Config;
use hotel_nlsql::db::{self, init_database};
use hotel_nlsql::error::{AppError, Result};
use hotel_nlsql::llm::create_client;
use hotel_nlsql::logging::{init_file_logging, init_stderr_logging};
use hotel_nlsql::safety::SafetyPipeline;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => init_file_logging(path.as_deref(), cli.verbose),
        None => init_stderr_logging(cli.verbose),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env()?;
    cli.apply_overrides(&mut config);

    match cli.command {
        Command::Ask {
            question,
            no_summary,
            json,
        } => ask(&config, &question, !no_summary, json).await,
        Command::Sanitize { text } => sanitize(&config, text),
        Command::Schema => {
            let db = db::connect(&config).await?;
            let schema = db.introspect_schema().await?;
            println!("{}", schema.format_for_llm());
            db.close().await
        }
        Command::InitDb { schema, seed } => {
            let location = config.database.path.to_string_lossy();
            let report = init_database(&location, schema.as_deref(), seed.as_deref()).await?;
            println!(
                "Initialized {} with tables: {}",
                config.database.path.display(),
                report.tables.join(", ")
            );
            Ok(())
        }
        Command::Models => {
            let llm = create_client(&config.llm, None)?;
            for model in llm.list_models().await? {
                println!("{model}");
            }
            Ok(())
        }
    }
}

async fn ask(config: &Config, question: &str, summarize: bool, json: bool) -> Result<()> {
    let db = db::connect(config).await?;
    let llm = create_client(&config.llm, None)?;
    let agent = Agent::from_config(config, db, llm);

    let outcome = agent.ask(question, AskOptions { summarize }).await;
    agent.close().await?;
    let outcome = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &AskOutcome) {
    println!("SQL:\n{}\n", outcome.sql);
    println!("{}", to_markdown_table(&outcome.result, DEFAULT_MAX_PREVIEW));
    if let Some(warning) = outcome.result.truncation_warning() {
        println!("\n_{warning}_");
    }
    if let Some(answer) = &outcome.answer {
        println!("\n{}", answer.text);
    }
}

/// Runs only the safety pipeline. Reads stdin when no text is given.
fn sanitize(config: &Config, text: Option<String>) -> Result<()> {
    let raw = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| AppError::invalid_input(format!("Failed to read stdin: {e}")))?;
            buffer
        }
    };

    let statement = SafetyPipeline::new(config.safety_policy()).make_safe_statement(&raw)?;
    println!("{statement}");
    Ok(())
}
