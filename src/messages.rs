// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::control::{StallReason, Tick};
use crate::motor::WheelTicks;

/// Fixed directions for an encoder distance drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveDirection {
    Forward,
    Back,
    Left,
    Right,
}

/// How an absolute heading request converges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// Encoder turn for the error, then capped corrective turns
    Encoder,
    /// Constant power until inside the dead-band
    FixedPower,
    /// Power proportional to the remaining error
    #[default]
    Proportional,
}

/// One motion for the controller to run to completion.
/// No request mixes translation and rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MotionRequest {
    /// Turn by `degrees` (counter-clockwise positive) using encoder targets
    RotateRelative { degrees: i32, power: f64 },
    /// Turn to an absolute heading in degrees
    RotateAbsolute {
        heading: f64,
        power: f64,
        #[serde(default)]
        strategy: RotationStrategy,
    },
    /// Drive a distance in inches in one of the four fixed directions
    DriveDistance {
        power: f64,
        inches: f64,
        direction: DriveDirection,
    },
    /// Field-relative translation; `speed` replaces the vector length when present
    DriveVector {
        x: f64,
        y: f64,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        slow: bool,
    },
    /// Hold still for a while
    Pause { millis: u64 },
}

// Command from teleop/scripts -> runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BaseCommand {
    Motion(MotionRequest),
    ZeroHeading,
    Cancel,
}

/// Motion state published by runtime every cycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotionStatus {
    pub request: Option<MotionRequest>,
    pub state: MotionState,
    pub heading_degrees: f64,
    pub positions: [i32; 4], // [lf, lr, rf, rr]
    pub targets: [i32; 4],
}

impl MotionStatus {
    pub fn new(
        request: Option<MotionRequest>,
        state: MotionState,
        heading_degrees: f64,
        positions: WheelTicks,
        targets: WheelTicks,
    ) -> Self {
        Self {
            request,
            state,
            heading_degrees,
            positions: positions.as_array(),
            targets: targets.as_array(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MotionState {
    Idle,
    InProgress,
    Converged,
    Stalled { reason: StallReason },
    Rejected,
}

impl From<Tick> for MotionState {
    fn from(tick: Tick) -> Self {
        match tick {
            Tick::InProgress => MotionState::InProgress,
            Tick::Converged => MotionState::Converged,
            Tick::Stalled(reason) => MotionState::Stalled { reason },
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    ImuUncalibrated,
}
