//! Debug CLI for the MBTA tool surface.
//!
//! Reads the API key from `MBTA_API_KEY` (and an optional `MBTA_BASE_URL`)
//! unless overridden on the command line.
//!
//! # Examples
//!
//! ```sh
//! # List every tool
//! mbta tools
//!
//! # Next departures at Park Street
//! mbta call mbta_get_predictions_for_stop '{"stop_id": "place-pktrm"}'
//!
//! # Argument schema of a tool
//! mbta schema mbta_get_nearby_stops
//!
//! # Debug logging of cache, coalescer and upstream timing
//! mbta --verbose call mbta_search_stops '{"query": "harvard"}'
//! ```

use clap::{Parser, Subcommand};
use mbta_rs::tools::{ToolRegistry, transit_tools};
use mbta_rs::{ClientConfig, MbtaClient};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Inspect and call the MBTA transit tools.
#[derive(Parser)]
#[command(name = "mbta", version)]
struct Cli {
    /// MBTA V3 API key (overrides MBTA_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// API base URL (overrides MBTA_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log at debug level to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered tool names and descriptions
    Tools,
    /// Dispatch one tool call and print the response JSON
    Call {
        /// Tool name, e.g. mbta_get_stops
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Print a tool's argument schema
    Schema {
        /// Tool name
        tool: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mbta_rs=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mbta_rs=info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_registry(cli: &Cli) -> Result<ToolRegistry, String> {
    let mut config = ClientConfig::from_env();
    if let Some(key) = cli.api_key.as_deref() {
        config = config.with_api_key(key);
    }
    if let Some(url) = cli.base_url.as_deref() {
        config = config.with_base_url(url);
    }
    let client = MbtaClient::new(config).map_err(|e| e.to_string())?;
    Ok(transit_tools(Arc::new(client)))
}

/// Run the command; `Ok(false)` means the tool answered with an error.
async fn run(cli: &Cli) -> Result<bool, String> {
    let registry = build_registry(cli)?;
    match &cli.command {
        Command::Tools => {
            for def in registry.definitions() {
                let summary = def.description.lines().next().unwrap_or_default();
                println!("{:<32} {summary}", def.name);
            }
            Ok(true)
        }
        Command::Call { tool, args } => {
            let arguments: serde_json::Value = serde_json::from_str(args)
                .map_err(|e| format!("arguments are not valid JSON: {e}"))?;
            let response = registry.call(tool, &arguments).await;
            let json = serde_json::to_string_pretty(&response).map_err(|e| e.to_string())?;
            println!("{json}");
            Ok(!response.is_error)
        }
        Command::Schema { tool } => {
            let descriptor = registry
                .get(tool)
                .ok_or_else(|| format!("unknown tool '{tool}'"))?;
            let def = descriptor.definition();
            let json = serde_json::to_string_pretty(&def.input_schema).map_err(|e| e.to_string())?;
            println!("{json}");
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
