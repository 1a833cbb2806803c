//! CLI for xtr.

mod dns;
mod runner;

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use xtr_core::{OutputFormat, ProbeParams, TraceProgress, XtrConfig};

/// xtr - Dual-stack traceroute that finds routers shared by the IPv4 and IPv6 paths.
#[derive(Parser, Debug)]
#[command(name = "xtr")]
#[command(version)]
#[command(about = "Dual-stack ICMP traceroute that reports routers shared by the IPv4 and IPv6 paths")]
pub struct Args {
    /// Target hostname or IP address.
    #[arg(required = true)]
    pub target: String,

    /// Maximum number of hops to probe per family.
    #[arg(short = 'm', long = "max-hops", default_value = "64", value_parser = clap::value_parser!(u8).range(1..))]
    pub max_hops: u8,

    /// Attempt budget per hop.
    #[arg(short = 'a', long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: u32,

    /// Timeout per attempt in milliseconds.
    #[arg(short = 'w', long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Convert CLI args to XtrConfig.
    fn to_config(&self) -> XtrConfig {
        XtrConfig {
            hostname: self.target.clone(),
            params: ProbeParams {
                max_hops: self.max_hops,
                attempts: self.attempts,
                timeout: Duration::from_millis(self.timeout),
            },
            format: if self.json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints text output as it arrives; JSON waits for the full report.
fn print_progress(progress: TraceProgress<'_>, format: OutputFormat) {
    let text = format == OutputFormat::Text;
    match progress {
        TraceProgress::Started(header) if text => println!("{}", header),
        TraceProgress::Hop(line) if text => println!("{}", line),
        TraceProgress::Finished(trace) => {
            if text {
                println!();
            }
            if let Some(error) = trace.error() {
                eprintln!("{}: {}", trace.family, error);
            }
        }
        _ => {}
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.to_config();
    let format = config.format;

    match runner::run_xtr(config, |progress| print_progress(progress, format)).await {
        Ok(report) => match format {
            OutputFormat::Text => {
                print!("{}", report.summary());
                ExitCode::SUCCESS
            }
            OutputFormat::Json => match report.to_json() {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Failed to serialize report: {}", e);
                    ExitCode::FAILURE
                }
            },
        },
        Err(e) => {
            eprintln!("xtr failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["xtr", "example.com"]).unwrap();
        let config = args.to_config();

        assert_eq!(config.hostname, "example.com");
        assert_eq!(config.params.max_hops, 64);
        assert_eq!(config.params.attempts, 3);
        assert_eq!(config.params.timeout, Duration::from_secs(1));
        assert_eq!(config.format, OutputFormat::Text);
    }

    #[test]
    fn test_short_flags() {
        let args =
            Args::try_parse_from(["xtr", "-m", "12", "-a", "1", "-w", "250", "--json", "-v", "::1"])
                .unwrap();
        let config = args.to_config();

        assert_eq!(config.hostname, "::1");
        assert_eq!(config.params.max_hops, 12);
        assert_eq!(config.params.attempts, 1);
        assert_eq!(config.params.timeout, Duration::from_millis(250));
        assert_eq!(config.format, OutputFormat::Json);
        assert!(args.verbose);
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(Args::try_parse_from(["xtr", "--max-hops", "0", "example.com"]).is_err());
        assert!(Args::try_parse_from(["xtr", "--attempts", "0", "example.com"]).is_err());
        assert!(Args::try_parse_from(["xtr", "--timeout", "0", "example.com"]).is_err());
    }

    #[test]
    fn test_max_hops_bounded_by_u8() {
        assert!(Args::try_parse_from(["xtr", "-m", "256", "example.com"]).is_err());
    }

    #[test]
    fn test_target_required() {
        assert!(Args::try_parse_from(["xtr"]).is_err());
    }
}
