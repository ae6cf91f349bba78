// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::benchmark::BenchmarkKind;
use crate::common::config::{AppConfig, MonitorConfig};
use crate::metrics::default_metric_keys;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sample devices and serve the dashboard JSON API. (default)
    Serve(ServeArgs),
    /// Sample devices headless and write a log file.
    Record(RecordArgs),
    /// Run one host benchmark and print its report.
    Bench(BenchArgs),
}

/// Options shared by every sampling mode.
#[derive(Parser, Clone, Debug)]
pub struct SamplingArgs {
    /// Samples kept per metric per device.
    #[arg(long, default_value_t = AppConfig::DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
    /// Interval between two samples, in milliseconds.
    #[arg(long, default_value_t = AppConfig::DEFAULT_SAMPLE_INTERVAL_MS)]
    pub sample_interval_ms: u64,
    /// Simulate N devices instead of reading NVML.
    #[arg(long, num_args = 0..=1, default_missing_value = "2")]
    pub mock: Option<usize>,
    /// Metric keys to sample, in log column order.
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub keys: Option<Vec<String>>,
}

#[derive(Parser, Clone, Debug)]
pub struct ServeArgs {
    /// The port to listen on for the API server.
    #[arg(short, long, default_value_t = AppConfig::DEFAULT_API_PORT)]
    pub port: u16,
    #[command(flatten)]
    pub sampling: SamplingArgs,
    /// Interval between two display refreshes, in milliseconds.
    #[arg(long, default_value_t = AppConfig::DEFAULT_REFRESH_INTERVAL_MS)]
    pub refresh_interval_ms: u64,
    /// Start logging right away.
    #[arg(long)]
    pub log: bool,
    /// Log file path. Defaults to `<device>_<date>.hwout`.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
pub struct RecordArgs {
    /// Log file path. Defaults to `<device>_<date>.hwout`.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Stop after this many seconds. Runs until Ctrl+C when omitted.
    #[arg(short, long)]
    pub duration_secs: Option<u64>,
    #[command(flatten)]
    pub sampling: SamplingArgs,
}

#[derive(Parser, Clone, Debug)]
pub struct BenchArgs {
    /// `dgemm` or `stream`.
    pub kind: BenchmarkKind,
    /// Matrix dimension or vector length.
    #[arg(short, long)]
    pub size: Option<usize>,
    #[arg(short, long)]
    pub repeats: Option<usize>,
}

impl SamplingArgs {
    fn apply(&self, config: &mut MonitorConfig) {
        config.buffer_size = self.buffer_size;
        config.sample_interval = Duration::from_millis(self.sample_interval_ms);
        config.metric_keys = self.keys.clone().unwrap_or_else(default_metric_keys);
        config.mock_devices = self.mock;
    }
}

impl ServeArgs {
    pub fn to_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            log_on_start: self.log,
            log_file: self.log_file.clone(),
            ..Default::default()
        };
        self.sampling.apply(&mut config);
        config
    }
}

impl RecordArgs {
    pub fn to_config(&self) -> MonitorConfig {
        let mut config = MonitorConfig {
            log_on_start: true,
            log_file: self.output.clone(),
            ..Default::default()
        };
        self.sampling.apply(&mut config);
        config
    }
}

impl Default for ServeArgs {
    fn default() -> Self {
        ServeArgs::parse_from(["serve"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["gpu-watch", "serve"]);
        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 8050);
        let config = args.to_config();
        assert_eq!(config.buffer_size, 50);
        assert_eq!(config.sample_interval, Duration::from_secs(1));
        assert_eq!(config.metric_keys, default_metric_keys());
        assert_eq!(config.mock_devices, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serve_options() {
        let cli = Cli::parse_from([
            "gpu-watch",
            "serve",
            "--mock",
            "--keys",
            "Temperature,Power",
            "--buffer-size",
            "10",
            "--log",
        ]);
        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        let config = args.to_config();
        assert_eq!(config.mock_devices, Some(2));
        assert_eq!(config.metric_keys, vec!["Temperature", "Power"]);
        assert_eq!(config.buffer_size, 10);
        assert!(config.log_on_start);
    }

    #[test]
    fn test_record_and_bench() {
        let cli = Cli::parse_from(["gpu-watch", "record", "-o", "out.hwout", "--mock", "3"]);
        let Some(Commands::Record(args)) = cli.command else {
            panic!("expected record");
        };
        let config = args.to_config();
        assert_eq!(config.mock_devices, Some(3));
        assert_eq!(config.log_file, Some(PathBuf::from("out.hwout")));

        let cli = Cli::parse_from(["gpu-watch", "bench", "stream", "--size", "4096"]);
        let Some(Commands::Bench(args)) = cli.command else {
            panic!("expected bench");
        };
        assert_eq!(args.kind, BenchmarkKind::Stream);
        assert_eq!(args.size, Some(4096));
        assert_eq!(args.repeats, None);
    }

    #[test]
    fn test_no_subcommand_defaults_to_serve() {
        let cli = Cli::parse_from(["gpu-watch"]);
        assert!(cli.command.is_none());
        assert_eq!(ServeArgs::default().port, AppConfig::DEFAULT_API_PORT);
    }
}
