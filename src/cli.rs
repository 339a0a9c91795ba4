//! CLI argument parsing for lantern

use crate::lantern_metric::MetricKind;
use crate::throttling::ThrottlingSettings;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for metric reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

/// Metric selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    /// First contentful paint
    Fcp,
    /// First meaningful paint
    Fmp,
    /// Time to interactive
    Interactive,
    /// Speed index
    SpeedIndex,
}

impl From<MetricArg> for MetricKind {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Fcp => MetricKind::FirstContentfulPaint,
            MetricArg::Fmp => MetricKind::FirstMeaningfulPaint,
            MetricArg::Interactive => MetricKind::Interactive,
            MetricArg::SpeedIndex => MetricKind::SpeedIndex,
        }
    }
}

/// Built-in throttling profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThrottlingPreset {
    /// 150ms RTT, 1.6Mbps, 4x CPU slowdown
    #[value(name = "mobile-slow-4g")]
    MobileSlow4g,
    /// 40ms RTT, 10Mbps, no CPU slowdown
    #[value(name = "desktop-dense-4g")]
    DesktopDense4g,
}

impl ThrottlingPreset {
    pub fn settings(self) -> ThrottlingSettings {
        match self {
            ThrottlingPreset::MobileSlow4g => ThrottlingSettings::mobile_slow_4g(),
            ThrottlingPreset::DesktopDense4g => ThrottlingSettings::desktop_dense_4g(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "lantern")]
#[command(version)]
#[command(about = "Estimate page-load metrics from a recorded dependency graph", long_about = None)]
pub struct Cli {
    /// Page-load fixture (JSON) to estimate
    #[arg(long, value_name = "FILE")]
    pub fixture: PathBuf,

    /// Metric to estimate; repeat for several (default: all)
    #[arg(short = 'm', long = "metric", value_enum, value_name = "METRIC")]
    pub metrics: Vec<MetricArg>,

    /// Throttling profile to simulate
    #[arg(long, value_enum, default_value = "mobile-slow-4g")]
    pub throttling: ThrottlingPreset,

    /// TOML throttling settings (overrides --throttling)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output on stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Requested metrics in order, duplicates dropped; every metric when none given
    pub fn metric_kinds(&self) -> Vec<MetricKind> {
        if self.metrics.is_empty() {
            return MetricKind::ALL.to_vec();
        }
        let mut kinds: Vec<MetricKind> = Vec::with_capacity(self.metrics.len());
        for kind in self.metrics.iter().copied().map(MetricKind::from) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Throttling settings from `--config` if given, else the preset
    pub fn throttling_settings(&self) -> Result<ThrottlingSettings> {
        match &self.config {
            Some(path) => ThrottlingSettings::from_file(path),
            None => Ok(self.throttling.settings()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_requires_fixture() {
        assert!(Cli::try_parse_from(["lantern"]).is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["lantern", "--fixture", "page.json"]);
        assert_eq!(cli.fixture, PathBuf::from("page.json"));
        assert_eq!(cli.throttling, ThrottlingPreset::MobileSlow4g);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.debug);
        assert_eq!(cli.metric_kinds(), MetricKind::ALL.to_vec());
    }

    #[test]
    fn test_cli_metric_selection() {
        let cli = Cli::parse_from([
            "lantern",
            "--fixture",
            "page.json",
            "--metric",
            "speed-index",
            "-m",
            "fcp",
            "--metric",
            "speed-index",
        ]);
        assert_eq!(
            cli.metric_kinds(),
            vec![MetricKind::SpeedIndex, MetricKind::FirstContentfulPaint]
        );
    }

    #[test]
    fn test_cli_rejects_unknown_metric() {
        let result = Cli::try_parse_from(["lantern", "--fixture", "p.json", "--metric", "lcp"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_throttling_preset() {
        let cli = Cli::parse_from([
            "lantern",
            "--fixture",
            "page.json",
            "--throttling",
            "desktop-dense-4g",
        ]);
        assert_eq!(
            cli.throttling_settings().unwrap(),
            ThrottlingSettings::desktop_dense_4g()
        );
    }

    #[test]
    fn test_cli_config_overrides_preset() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "rtt_ms = 90.0\nthroughput_kbps = 5000.0\ncpu_slowdown_multiplier = 2.0"
        )
        .unwrap();

        let cli = Cli::parse_from([
            "lantern",
            "--fixture",
            "page.json",
            "--throttling",
            "desktop-dense-4g",
            "--config",
            file.path().to_str().unwrap(),
        ]);
        assert_eq!(cli.throttling_settings().unwrap().rtt_ms, 90.0);
    }

    #[test]
    fn test_cli_json_format_and_debug() {
        let cli = Cli::parse_from(["lantern", "--fixture", "p.json", "--format", "json", "--debug"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.debug);
    }
}
