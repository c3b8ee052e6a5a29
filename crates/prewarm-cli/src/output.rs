//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use prewarm_lib::ExecutionMode;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a latency in milliseconds
pub fn format_ms(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{:.2}ms", ms)
    }
}

/// Format a probability as percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.0}%", probability * 100.0)
}

/// Color the startup mode, warm is good news
pub fn color_mode(mode: ExecutionMode) -> String {
    match mode {
        ExecutionMode::Warm => mode.as_str().green().to_string(),
        ExecutionMode::Cold => mode.as_str().yellow().to_string(),
    }
}

/// Color a latency improvement based on sign
pub fn color_improvement(improvement: Option<f64>) -> String {
    match improvement {
        Some(pct) if pct > 0.0 => format!("{:.2}%", pct).green().to_string(),
        Some(pct) => format!("{:.2}%", pct).red().to_string(),
        None => "n/a".dimmed().to_string(),
    }
}

/// Color a demand decision
pub fn color_demand(in_demand: bool) -> String {
    if in_demand {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}
