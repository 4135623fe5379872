use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use mecanum_zenoh_runtime::config::{CMD_TIMEOUT, LOOP_HZ};
use mecanum_zenoh_runtime::runtime::{self, RuntimeConfig};
use mecanum_zenoh_runtime::sim::DEFAULT_MAX_TICKS_PER_SEC;

/// Closed-loop motion runtime for a mecanum base
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Control loop rate
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u64).range(1..=1000))]
    loop_hz: u64,

    /// Stop field-relative driving after this long without a fresh vector
    #[arg(long, default_value_t = CMD_TIMEOUT.as_millis() as u64)]
    cmd_timeout_ms: u64,

    /// Give up on closed-loop motions after this long
    #[arg(long)]
    motion_timeout_ms: Option<u64>,

    /// Free-running speed of the simulated wheels, in encoder ticks per second
    #[arg(long, default_value_t = DEFAULT_MAX_TICKS_PER_SEC)]
    sim_ticks_per_sec: f64,
}

impl From<Args> for RuntimeConfig {
    fn from(args: Args) -> Self {
        Self {
            loop_hz: args.loop_hz,
            cmd_timeout: Duration::from_millis(args.cmd_timeout_ms),
            motion_deadline: args.motion_timeout_ms.map(Duration::from_millis),
            sim_ticks_per_sec: args.sim_ticks_per_sec,
        }
    }
}

/// `RUST_LOG` directives, defaulting to `info`
fn log_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt().with_env_filter(log_filter()).init(); // installs the subscriber globally

    if let Err(e) = runtime::run(args.into()).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_hz_bounds() {
        let args = Args::try_parse_from(["mecanum-zenoh-runtime"]).unwrap();
        assert_eq!(args.loop_hz, LOOP_HZ);
        let args = Args::try_parse_from(["mecanum-zenoh-runtime", "--loop-hz", "1000"]).unwrap();
        assert_eq!(args.loop_hz, 1000);

        assert!(Args::try_parse_from(["mecanum-zenoh-runtime", "--loop-hz", "2000"]).is_err());
        assert!(Args::try_parse_from(["mecanum-zenoh-runtime", "--loop-hz", "0"]).is_err());
    }

    #[test]
    fn test_motion_timeout_becomes_deadline() {
        let args =
            Args::try_parse_from(["mecanum-zenoh-runtime", "--motion-timeout-ms", "1500"]).unwrap();
        let config = RuntimeConfig::from(args);
        assert_eq!(config.motion_deadline, Some(Duration::from_millis(1500)));
        assert_eq!(config.cmd_timeout, CMD_TIMEOUT);
    }

    #[test]
    fn test_log_filter_has_a_level() {
        assert!(log_filter().max_level_hint().is_some());
    }
}
