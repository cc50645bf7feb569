//! Command-line argument parsing for hotel-nlsql.

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ask questions about hotel reservations in natural language.
#[derive(Parser, Debug)]
#[command(name = "hotel-nlsql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides DB_PATH and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// LLM provider: gemini, openai or mock
    #[arg(long, global = true, value_name = "PROVIDER")]
    pub llm: Option<String>,

    /// Row cap appended to statements without a LIMIT
    #[arg(long, global = true, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_rows: Option<u32>,

    /// Allow statements that do not start with SELECT or WITH
    #[arg(long, global = true)]
    pub lenient: bool,

    /// Write logs to a file instead of stderr (default location when no path is given)
    #[arg(long, global = true, value_name = "PATH", num_args = 0..=1, require_equals = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Translate a question to SQL, run it and summarize the result
    Ask {
        /// The question, in natural language
        question: String,

        /// Skip the natural-language summary
        #[arg(long)]
        no_summary: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run only the safety pipeline over TEXT (or stdin) and print the result
    Sanitize {
        /// Raw model output; read from stdin when absent
        text: Option<String>,
    },

    /// Print the database schema as shown to the LLM
    Schema,

    /// Create and seed the SQLite database
    InitDb {
        /// Schema script (defaults to the bundled hotel schema)
        #[arg(long, value_name = "PATH")]
        schema: Option<PathBuf>,

        /// Seed script (defaults to the bundled sample data)
        #[arg(long, value_name = "PATH")]
        seed: Option<PathBuf>,
    },

    /// List the models available from the LLM provider
    Models,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies command-line overrides on top of file and environment settings.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.database {
            config.database.path = path.clone();
        }
        if let Some(provider) = &self.llm {
            config.llm.provider = provider.clone();
        }
        if let Some(max_rows) = self.max_rows {
            config.safety.max_rows = max_rows;
        }
        if self.lenient {
            config.safety.strict = false;
        }
    }
}
