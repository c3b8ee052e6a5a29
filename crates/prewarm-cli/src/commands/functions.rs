//! Commands talking to a running prewarm agent

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde_json::Value;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_demand, color_mode, format_ms, format_probability, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

/// Row for the warm pool table
#[derive(Tabled)]
struct WarmRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Function")]
    function: String,
}

/// Parse the `--input` argument, `null` when absent
pub fn parse_input(input: Option<&str>) -> Result<Value> {
    match input {
        Some(raw) => serde_json::from_str(raw).context("--input is not valid JSON"),
        None => Ok(Value::Null),
    }
}

/// Parse the `--at` argument of `report`
pub fn parse_timestamp(at: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    at.map(|raw| {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("Invalid RFC 3339 timestamp: {}", raw))
    })
    .transpose()
}

/// Execute a function through the agent
pub async fn invoke(
    client: &ApiClient,
    function: &str,
    input: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let input = parse_input(input)?;
    let report = client.invoke(function, input).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "Execution".bold());
            println!("{}", "=".repeat(50));
            println!("Function:   {}", report.function_id.cyan());
            println!("Mode:       {}", color_mode(report.mode));
            println!("Latency:    {}", format_ms(report.elapsed_ms));
            println!("Requested:  {}", report.requested_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!();
            println!("{}", serde_json::to_string_pretty(&report.output)?);
        }
    }

    Ok(())
}

/// Show the demand estimate the agent computes right now
pub async fn predict(client: &ApiClient, function: &str, format: OutputFormat) -> Result<()> {
    let prediction = client.prediction(function).await?;

    match format {
        OutputFormat::Json => print_json(&prediction)?,
        OutputFormat::Table => {
            let estimate = &prediction.estimate;
            println!("{}", "Demand Prediction".bold());
            println!("{}", "=".repeat(50));
            println!("Function:      {}", prediction.function_id.cyan());
            println!("At:            {}", prediction.at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("Recent:        {}", estimate.recent);
            println!("Similar hour:  {}", estimate.similar);
            println!("Probability:   {}", format_probability(estimate.probability));
            println!("In demand:     {}", color_demand(estimate.in_demand));
            println!(
                "Warm:          {}",
                if prediction.warm { "yes".green() } else { "no".yellow() }
            );
        }
    }

    Ok(())
}

/// Warm a function container ahead of demand
pub async fn prewarm(client: &ApiClient, function: &str, format: OutputFormat) -> Result<()> {
    let response = client.prewarm(function).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.prewarmed {
                print_success(&format!("Pre-warmed {}", response.function_id));
            } else {
                print_warning(&format!("{} was already warm", response.function_id));
            }
            for evicted in &response.evicted {
                print_warning(&format!("Evicted {} to make room", evicted));
            }
        }
    }

    Ok(())
}

pub async fn evict(client: &ApiClient, function: &str, format: OutputFormat) -> Result<()> {
    let response = client.evict(function).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.evicted {
                print_success(&format!("Evicted {}", response.function_id));
            } else {
                print_warning(&format!("{} was not warm", response.function_id));
            }
        }
    }

    Ok(())
}

/// Show warm pool occupancy
pub async fn pool(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats = client.pool().await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            println!("{}", "Warm Pool".bold());
            println!("{}", "=".repeat(50));
            println!(
                "Occupancy:          {}/{}",
                stats.warm_functions.len(),
                stats.pool_capacity
            );
            println!("Functions tracked:  {}", stats.functions_tracked);
            println!("History records:    {}", stats.history_records);
            println!();

            let rows: Vec<WarmRow> = stats
                .warm_functions
                .into_iter()
                .enumerate()
                .map(|(i, function)| WarmRow {
                    position: i + 1,
                    function,
                })
                .collect();
            print_table(rows);
        }
    }

    Ok(())
}

/// Report an invocation observed elsewhere
pub async fn report(
    client: &ApiClient,
    function: &str,
    at: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let timestamp = parse_timestamp(at)?;
    client.report_invocation(function, timestamp).await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "function_id": function,
            "timestamp": timestamp,
            "accepted": true,
        }))?,
        OutputFormat::Table => print_success(&format!("Recorded invocation of {}", function)),
    }

    Ok(())
}
