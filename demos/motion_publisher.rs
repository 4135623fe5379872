// Send one motion command to the runtime, or stream a drive vector for a while
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant};
use tracing::info;

use mecanum_zenoh_runtime::config::TOPIC_CMD_BASE;
use mecanum_zenoh_runtime::messages::{
    BaseCommand, DriveDirection, MotionRequest, RotationStrategy,
};

const VECTOR_PERIOD: Duration = Duration::from_millis(20); // 50Hz, well inside the watchdog

#[derive(Parser, Debug)]
#[command(about = "Publish motion commands to the mecanum runtime")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive a distance on the wheel encoders
    Drive {
        #[arg(value_enum)]
        direction: Direction,
        inches: f64,
        #[arg(long, default_value_t = 0.5)]
        power: f64,
    },
    /// Turn relative to the current pose on the wheel encoders
    Turn {
        #[arg(allow_hyphen_values = true)]
        degrees: i32,
        #[arg(long, default_value_t = 0.5)]
        power: f64,
    },
    /// Turn to an absolute heading using the IMU
    RotateTo {
        #[arg(allow_hyphen_values = true)]
        heading: f64,
        #[arg(long, default_value_t = 0.5)]
        power: f64,
        #[arg(long, value_enum, default_value_t = Strategy::Proportional)]
        strategy: Strategy,
    },
    /// Stream a field-relative drive vector
    Vector {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        slow: bool,
        /// How long to keep sending
        #[arg(long, default_value_t = 2000)]
        millis: u64,
    },
    /// Hold still
    Pause { millis: u64 },
    /// Make the current heading the zero reference
    ZeroHeading,
    /// Stop whatever is running
    Cancel,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Forward,
    Back,
    Left,
    Right,
}

impl From<Direction> for DriveDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => DriveDirection::Forward,
            Direction::Back => DriveDirection::Back,
            Direction::Left => DriveDirection::Left,
            Direction::Right => DriveDirection::Right,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    Encoder,
    FixedPower,
    Proportional,
}

impl From<Strategy> for RotationStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Encoder => RotationStrategy::Encoder,
            Strategy::FixedPower => RotationStrategy::FixedPower,
            Strategy::Proportional => RotationStrategy::Proportional,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_BASE).await?;

    let cmd = match args.command {
        Command::Drive {
            direction,
            inches,
            power,
        } => BaseCommand::Motion(MotionRequest::DriveDistance {
            power,
            inches,
            direction: direction.into(),
        }),
        Command::Turn { degrees, power } => {
            BaseCommand::Motion(MotionRequest::RotateRelative { degrees, power })
        }
        Command::RotateTo {
            heading,
            power,
            strategy,
        } => BaseCommand::Motion(MotionRequest::RotateAbsolute {
            heading,
            power,
            strategy: strategy.into(),
        }),
        Command::Vector {
            x,
            y,
            speed,
            slow,
            millis,
        } => {
            let cmd = BaseCommand::Motion(MotionRequest::DriveVector { x, y, speed, slow });
            return stream_vector(&publisher, &cmd, Duration::from_millis(millis)).await;
        }
        Command::Pause { millis } => BaseCommand::Motion(MotionRequest::Pause { millis }),
        Command::ZeroHeading => BaseCommand::ZeroHeading,
        Command::Cancel => BaseCommand::Cancel,
    };

    info!("Publishing {:?}", cmd);
    publisher.put(serde_json::to_string(&cmd)?).await?;
    Ok(())
}

async fn stream_vector(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: &BaseCommand,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let payload = serde_json::to_string(cmd)?;
    let started = Instant::now();
    let mut tick = tokio::time::interval(VECTOR_PERIOD);

    info!("Streaming {:?} for {:?}", cmd, duration);
    while started.elapsed() < duration {
        tick.tick().await;
        publisher.put(payload.clone()).await?;
    }
    info!("Done, runtime watchdog will stop the base");
    Ok(())
}
