//! In-process latency comparison between cold starts and predictive warm-up

use anyhow::Result;
use colored::Colorize;
use prewarm_lib::benchmark::{run_comparison, BenchmarkConfig};
use prewarm_lib::stats::MethodReport;
use prewarm_lib::SimulatedRuntimeConfig;
use std::time::Duration;
use tabled::Tabled;

use crate::output::{color_improvement, format_ms, print_info, print_json, print_table, OutputFormat};

/// Options of `prewarm bench`
#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub function: String,
    pub iterations: usize,
    pub cold_ms: u64,
    pub warm_ms: u64,
    pub pause_ms: u64,
    pub prewarm: bool,
}

impl BenchOptions {
    fn to_config(&self) -> BenchmarkConfig {
        BenchmarkConfig {
            function_name: self.function.clone(),
            iterations: self.iterations,
            pause: Duration::from_millis(self.pause_ms),
            prewarm_before_run: self.prewarm,
            runtime: SimulatedRuntimeConfig {
                init_cost: Duration::from_millis(self.cold_ms),
                invoke_overhead: Duration::from_millis(self.warm_ms),
            },
            ..Default::default()
        }
    }
}

/// Row for the summary table
#[derive(Tabled)]
struct MethodRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Runs")]
    runs: usize,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std Dev")]
    std_dev: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
}

impl MethodRow {
    fn new(method: &str, report: &MethodReport) -> Self {
        let field = |f: fn(&prewarm_lib::LatencyStats) -> f64| {
            report
                .stats
                .as_ref()
                .map(|s| format_ms(f(s)))
                .unwrap_or_else(|| "-".to_string())
        };
        Self {
            method: method.to_string(),
            runs: report.raw_latencies_ms.len(),
            mean: field(|s| s.mean_ms),
            std_dev: field(|s| s.std_dev_ms),
            min: field(|s| s.min_ms),
            max: field(|s| s.max_ms),
        }
    }
}

/// Run the comparison and print the report
pub async fn run_bench(options: BenchOptions, format: OutputFormat) -> Result<()> {
    if options.iterations == 0 {
        anyhow::bail!("--iterations must be at least 1");
    }

    if matches!(format, OutputFormat::Table) {
        print_info(&format!(
            "Running {} iterations per method against {}",
            options.iterations, options.function
        ));
    }

    let run = run_comparison(&options.to_config()).await?;
    let report = run.report;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!();
            println!("{}", "Cold Start Comparison".bold());
            println!("{}", "=".repeat(60));
            print_table(vec![
                MethodRow::new("traditional", &report.traditional),
                MethodRow::new("predictive", &report.predictive),
            ]);

            println!();
            println!(
                "Improvement: {}",
                color_improvement(report.improvement_percentage)
            );

            println!();
            println!("{}", "Raw latencies".bold());
            println!("{}", "-".repeat(60));
            println!(
                "traditional: {}",
                join_latencies(&report.traditional.raw_latencies_ms)
            );
            println!(
                "predictive:  {}",
                join_latencies(&report.predictive.raw_latencies_ms)
            );
        }
    }

    Ok(())
}

fn join_latencies(latencies: &[f64]) -> String {
    latencies
        .iter()
        .map(|ms| format!("{:.1}", ms))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_map_to_runtime_costs() {
        let options = BenchOptions {
            function: "thumbnail".to_string(),
            iterations: 4,
            cold_ms: 250,
            warm_ms: 20,
            pause_ms: 0,
            prewarm: false,
        };
        let config = options.to_config();

        assert_eq!(config.function_name, "thumbnail");
        assert_eq!(config.iterations, 4);
        assert_eq!(config.runtime.init_cost, Duration::from_millis(250));
        assert_eq!(config.runtime.invoke_overhead, Duration::from_millis(20));
        assert!(!config.prewarm_before_run);
    }

    #[test]
    fn test_join_latencies() {
        assert_eq!(join_latencies(&[600.04, 100.26]), "600.0, 100.3");
        assert_eq!(join_latencies(&[]), "");
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let options = BenchOptions {
            function: "f".to_string(),
            iterations: 0,
            cold_ms: 1,
            warm_ms: 0,
            pause_ms: 0,
            prewarm: true,
        };
        assert!(tokio_test::block_on(run_bench(options, OutputFormat::Json)).is_err());
    }
}
