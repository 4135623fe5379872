//! Encoder distance drives in the four fixed directions.
//!
//! Distances are turned into per-wheel tick targets and handed to the wheels'
//! own position servos. The motion converges once every wheel stops reporting
//! busy.

use serde_json::json;
use tracing::{debug, info};

use super::{ControllerState, Tick};
use crate::config::{DriveGeometry, FRONT_BIAS, POSITION_POWER_SCALE, POSITION_TOLERANCE_TICKS};
use crate::heading::HeadingSensor;
use crate::messages::DriveDirection;
use crate::motor::{Actuator, RunMode, WheelPowers, WheelTicks, ZeroPowerBehavior};
use crate::telemetry::ProgressSink;

impl DriveDirection {
    /// Tick sign per wheel. Strafing spins the diagonals against each other.
    fn wheel_signs(self) -> WheelTicks {
        match self {
            DriveDirection::Forward => WheelTicks::new(-1, -1, -1, -1),
            DriveDirection::Back => WheelTicks::new(1, 1, 1, 1),
            DriveDirection::Right => WheelTicks::new(-1, 1, 1, -1),
            DriveDirection::Left => WheelTicks::new(1, -1, -1, 1),
        }
    }

    fn is_strafe(self) -> bool {
        matches!(self, DriveDirection::Left | DriveDirection::Right)
    }

    fn front_biased(self) -> bool {
        matches!(self, DriveDirection::Forward | DriveDirection::Right)
    }
}

/// Unsigned tick count for a drive of `inches` in `direction`
pub fn distance_ticks(geometry: &DriveGeometry, inches: f64, direction: DriveDirection) -> i32 {
    let distance = inches * geometry.distance_scale;

    // Mecanum rollers travel differently when strafing; that circumference is measured
    let circumference = if direction.is_strafe() {
        geometry.strafe_circumference_inches
    } else {
        geometry.wheel_circumference()
    };
    let ticks_per_inch = geometry.counts_per_rev / circumference;

    (ticks_per_inch * distance) as i32
}

/// Signed relative targets for each wheel
pub fn distance_targets(
    geometry: &DriveGeometry,
    inches: f64,
    direction: DriveDirection,
) -> WheelTicks {
    let ticks = distance_ticks(geometry, inches, direction);
    let signs = direction.wheel_signs();
    WheelTicks::new(
        signs.lf * ticks,
        signs.lr * ticks,
        signs.rf * ticks,
        signs.rr * ticks,
    )
}

/// Position-hold powers, front pair boosted when the chassis pulls
pub fn distance_powers(power: f64, direction: DriveDirection) -> WheelPowers {
    let rear = power * POSITION_POWER_SCALE;
    let front = if direction.front_biased() {
        rear * FRONT_BIAS
    } else {
        rear
    };
    WheelPowers::new(front, rear, front, rear)
}

/// A running encoder distance drive
#[derive(Debug)]
pub struct DistanceMotion {
    inches: f64,
    direction: DriveDirection,
    targets: WheelTicks,
}

impl DistanceMotion {
    pub fn start<A: Actuator, S: HeadingSensor>(
        state: &mut ControllerState<A, S>,
        power: f64,
        inches: f64,
        direction: DriveDirection,
    ) -> Self {
        let delta = distance_targets(&state.geometry, inches, direction);
        info!(
            "Driving {:.1} inches {:?} at power {:.2} (deltas {:?})",
            inches, direction, power, delta
        );

        let drive = &mut state.drive;
        drive.set_zero_power_behavior(ZeroPowerBehavior::Brake);
        drive.set_position_tolerance(POSITION_TOLERANCE_TICKS);
        let targets = drive.offset_targets(delta);
        drive.write_powers(distance_powers(power, direction));
        drive.set_mode_all(RunMode::PositionHold);

        Self {
            inches,
            direction,
            targets,
        }
    }

    pub fn targets(&self) -> WheelTicks {
        self.targets
    }

    pub fn tick<A: Actuator, S: HeadingSensor>(
        &mut self,
        state: &mut ControllerState<A, S>,
        sink: &mut dyn ProgressSink,
    ) -> Tick {
        let positions = state.drive.positions();
        debug!("Distance drive positions {:?} -> {:?}", positions, self.targets);

        if state.drive.all_settled() {
            sink.report("path", json!("Complete"));
            return Tick::Converged;
        }

        sink.report(
            "path",
            json!(format!("Driving {} inches {:?}", self.inches, self.direction)),
        );
        sink.report("current_position", json!(positions.lf));
        sink.report("target_position", json!(self.targets.lf));
        sink.report("heading", json!(state.heading.heading_degrees()));
        Tick::InProgress
    }
}
