mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fxq::query::{decode_query, dump_query, parse_query_string};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fxq")]
#[command(about = "Inspect, validate and expand JSON search queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a query and print it with query strings expanded
    Dump {
        /// JSON query file (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Decode and validate a query
    Validate {
        /// JSON query file (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Parse query-string text and print the resulting query
    Parse {
        /// Query-string text
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Summarize KNN candidates in pre-search data
    Presearch {
        /// JSON pre-search file (stdin when omitted)
        file: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stdout().is_terminal();

    match cli.command {
        Commands::Dump { file } => {
            let input = read_input(file.as_deref())?;
            let query = decode_query(&input).context("Failed to decode query")?;
            println!("{}", dump_query(&query).context("Failed to expand query")?);
        }
        Commands::Validate { file } => {
            let input = read_input(file.as_deref())?;
            let query = decode_query(&input).context("Failed to decode query")?;
            let result = query.validate();
            output::print_validation(query.kind().as_str(), &result, color)?;
            if result.is_err() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Parse { text } => {
            let text = text.join(" ");
            let query = parse_query_string(&text)?;
            println!("{}", serde_json::to_string_pretty(&query)?);
        }
        Commands::Presearch { file } => {
            let input = read_input(file.as_deref())?;
            let data = fxq::decode_pre_search(&input).context("Failed to decode pre-search data")?;
            output::print_presearch(&data, color)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn read_input(file: Option<&Path>) -> Result<Vec<u8>> {
    match file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}
