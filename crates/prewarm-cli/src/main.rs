//! Predictive Prewarm CLI
//!
//! A command-line tool for benchmarking cold starts against predictive
//! pre-warming and for driving a running prewarm agent.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{bench, functions};

/// Predictive Prewarm CLI
#[derive(Parser)]
#[command(name = "prewarm")]
#[command(author, version, about = "CLI for the Predictive Prewarm manager", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via PREWARM_API_URL env var)
    #[arg(long, env = "PREWARM_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare traditional cold starts with predictive pre-warming in-process
    Bench {
        /// Function name used for the simulated runs
        #[arg(long, default_value = "test_function")]
        function: String,

        /// Requests per method
        #[arg(long, short, default_value_t = 10)]
        iterations: usize,

        /// Simulated container initialization cost in milliseconds
        #[arg(long, default_value_t = 500)]
        cold_ms: u64,

        /// Simulated warm dispatch overhead in milliseconds
        #[arg(long, default_value_t = 100)]
        warm_ms: u64,

        /// Pause between requests in milliseconds
        #[arg(long, default_value_t = 100)]
        pause_ms: u64,

        /// Do not warm the function before the predictive run
        #[arg(long)]
        no_prewarm: bool,
    },

    /// Execute a function through the agent
    Invoke {
        /// Function identifier
        function: String,

        /// JSON input passed to the function
        #[arg(long)]
        input: Option<String>,
    },

    /// Show the current demand prediction for a function
    Predict {
        /// Function identifier
        function: String,
    },

    /// Warm a function container now
    Prewarm {
        /// Function identifier
        function: String,
    },

    /// Release a warm function container
    Evict {
        /// Function identifier
        function: String,
    },

    /// Show warm pool occupancy
    Pool,

    /// Report an invocation observed by an upstream router
    Report {
        /// Function identifier
        function: String,

        /// Invocation time in RFC 3339 (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The agent is only contacted by commands that need it
    let connect = || client::ApiClient::new(&cli.api_url);

    // Execute command
    match cli.command {
        Commands::Bench {
            function,
            iterations,
            cold_ms,
            warm_ms,
            pause_ms,
            no_prewarm,
        } => {
            let options = bench::BenchOptions {
                function,
                iterations,
                cold_ms,
                warm_ms,
                pause_ms,
                prewarm: !no_prewarm,
            };
            bench::run_bench(options, cli.format).await?;
        }
        Commands::Invoke { function, input } => {
            functions::invoke(&connect()?, &function, input.as_deref(), cli.format).await?;
        }
        Commands::Predict { function } => {
            functions::predict(&connect()?, &function, cli.format).await?;
        }
        Commands::Prewarm { function } => {
            functions::prewarm(&connect()?, &function, cli.format).await?;
        }
        Commands::Evict { function } => {
            functions::evict(&connect()?, &function, cli.format).await?;
        }
        Commands::Pool => {
            functions::pool(&connect()?, cli.format).await?;
        }
        Commands::Report { function, at } => {
            functions::report(&connect()?, &function, at.as_deref(), cli.format).await?;
        }
    }

    Ok(())
}
