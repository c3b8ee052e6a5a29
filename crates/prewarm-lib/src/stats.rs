//! Latency statistics for comparing startup strategies

use crate::models::{LatencySample, Method};
use serde::{Deserialize, Serialize};

/// Summary of a latency series, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub mean_ms: f64,
    /// Population standard deviation
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    /// Summarize a series. `None` when it is empty.
    pub fn from_samples(samples_ms: &[f64]) -> Option<Self> {
        if samples_ms.is_empty() {
            return None;
        }

        let count = samples_ms.len();
        let mean = samples_ms.iter().sum::<f64>() / count as f64;
        let variance = samples_ms
            .iter()
            .map(|x| {
                let d = x - mean;
                d * d
            })
            .sum::<f64>()
            / count as f64;

        Some(Self {
            count,
            mean_ms: mean,
            std_dev_ms: variance.sqrt(),
            min_ms: samples_ms.iter().copied().fold(f64::INFINITY, f64::min),
            max_ms: samples_ms.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Relative reduction of `candidate` against `baseline`, in percent
pub fn improvement_percentage(baseline_mean: f64, candidate_mean: f64) -> Option<f64> {
    if baseline_mean <= 0.0 {
        return None;
    }
    Some((baseline_mean - candidate_mean) / baseline_mean * 100.0)
}

/// Latencies of one method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodReport {
    pub stats: Option<LatencyStats>,
    pub raw_latencies_ms: Vec<f64>,
}

impl MethodReport {
    fn from_latencies(raw_latencies_ms: Vec<f64>) -> Self {
        Self {
            stats: LatencyStats::from_samples(&raw_latencies_ms),
            raw_latencies_ms,
        }
    }
}

/// Traditional cold starts against the predictive manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub traditional: MethodReport,
    pub predictive: MethodReport,
    pub improvement_percentage: Option<f64>,
}

impl BenchmarkReport {
    /// Build a report from a mixed latency time series
    pub fn from_samples(samples: &[LatencySample]) -> Self {
        let latencies = |method: Method| {
            samples
                .iter()
                .filter(|s| s.method == method)
                .map(|s| s.duration_ms)
                .collect::<Vec<_>>()
        };

        let traditional = MethodReport::from_latencies(latencies(Method::Traditional));
        let predictive = MethodReport::from_latencies(latencies(Method::Predictive));
        let improvement_percentage = match (&traditional.stats, &predictive.stats) {
            (Some(t), Some(p)) => improvement_percentage(t.mean_ms, p.mean_ms),
            _ => None,
        };

        Self {
            traditional,
            predictive,
            improvement_percentage,
        }
    }
}
