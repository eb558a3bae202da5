use crate::config;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chainscan")]
#[command(about = "Depth-bounded reconnaissance propagation engine")]
#[command(long_about = r#"
Chainscan drives reconnaissance outward from the targets you give it. Every result
may spawn new targets one level deeper: domains become subdomains, hosts become open
ports, ports become services, services become findings, and successful exploitation
opens an internal scan of the neighbouring network. Propagation stops at the profile's
depth bound or when nothing is left to scan.

WARNING: This tool should only be used on networks and systems you own or
have explicit permission to test. Unauthorized scanning may be illegal.

Usage Examples:
  chainscan --target example.com                      # Normal profile, depth 5
  chainscan --target 10.0.0.5 --profile stealth       # Shallow, rate limited
  chainscan -t 10.0.0.5 -t example.org --max-depth 3  # Several targets
  chainscan -t example.com --format csv -o ./out      # CSV export
"#)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Initial target: IP address, domain or hostname (repeatable)
    #[arg(short, long = "target", value_name = "TARGET", required = true)]
    pub targets: Vec<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Scan profile to activate (stealth, normal, aggressive or one from the config file)
    #[arg(short, long, value_name = "NAME", env = "CHAINSCAN_PROFILE")]
    pub profile: Option<String>,

    /// Override the profile's depth bound
    #[arg(long, value_name = "DEPTH")]
    pub max_depth: Option<u32>,

    /// Maximum number of module invocations in flight
    #[arg(long, value_name = "TASKS")]
    pub concurrency: Option<usize>,

    /// Per-module timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Export format (repeatable)
    #[arg(long, value_enum)]
    pub format: Vec<OutputFormat>,

    /// What to do for nodes no registered module can handle
    #[arg(long, value_enum, default_value = "simulated")]
    pub fallback: FallbackMode,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress output)
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl From<OutputFormat> for config::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => config::OutputFormat::Json,
            OutputFormat::Csv => config::OutputFormat::Csv,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackMode {
    /// Deterministic simulated results that keep the chain moving
    Simulated,
    /// Terminal reports, no propagation
    Noop,
}

impl Cli {
    /// Fold command-line overrides into a loaded configuration.
    pub fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(profile) = &self.profile {
            config.active_profile = profile.clone();
        }
        if let Some(max_depth) = self.max_depth {
            if let Some(profile) = config.profiles.get_mut(&config.active_profile) {
                profile.max_depth = max_depth;
            }
        }
        if let Some(concurrency) = self.concurrency {
            config.engine.max_concurrent_tasks = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.engine.default_timeout = timeout;
            for module in config.modules.values_mut() {
                module.timeout = timeout;
            }
        }
        if let Some(output) = &self.output {
            config.reporting.output_dir = output.clone();
        }
        if !self.format.is_empty() {
            config.reporting.formats = self.format.iter().map(|format| (*format).into()).collect();
        }
    }
}
