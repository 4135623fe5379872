//! Heading convergence.
//!
//! Positive angles are counter-clockwise, matching the IMU yaw. Turning
//! counter-clockwise drives the left pair backward and the right pair forward.
//!
//! - [`EncoderRotation`]: relative turn via tick targets on the wheel servos
//! - [`HeadingCorrection`]: encoder turns repeated until inside a ±3° band
//! - [`FixedPowerRotation`]: constant power until inside the ±4° dead-band
//! - [`ProportionalRotation`]: power proportional to the remaining error

use std::f64::consts::PI;

use serde_json::json;
use tracing::{debug, info};

use super::{ControllerState, Tick};
use crate::config::{
    DriveGeometry, HEADING_CORRECTION_BAND_DEG, HEADING_CORRECTION_STEP_DEG,
    POSITION_TOLERANCE_TICKS, ROTATE_DEAD_BAND_DEG, ROTATE_TO_GAIN_DIVISOR_NEGATIVE,
    ROTATE_TO_GAIN_DIVISOR_POSITIVE, ROTATE_TO_START_POWER,
};
use crate::heading::{convert_heading, HeadingSensor};
use crate::motor::{Actuator, RunMode, WheelPowers, WheelTicks};
use crate::telemetry::ProgressSink;

/// Unsigned wheel ticks that turn the chassis by `degrees`
pub fn rotation_ticks(geometry: &DriveGeometry, degrees: i32) -> i32 {
    let degree_length = geometry.rotation_circumference_inches / 360.0;
    let distance = degrees.unsigned_abs() as f64 * degree_length;
    let circumference = geometry.rotation_wheel_gear_ratio * PI * geometry.wheel_diameter_inches;
    let rotations = distance / circumference;

    (rotations * geometry.counts_per_rev) as i32
}

/// Wheel powers for a turn at `power`, counter-clockwise when positive
fn turn_powers(power: f64) -> WheelPowers {
    WheelPowers::sides(-power, power)
}

/// Signed error from the current heading to `target`, both in degrees, in [-180, 180]
fn heading_error<A: Actuator, S: HeadingSensor>(state: &ControllerState<A, S>, target: f64) -> f64 {
    let current = convert_heading(state.heading.heading_degrees());
    convert_heading(target - current)
}

/// Relative turn using encoder targets on the wheel servos
#[derive(Debug)]
pub struct EncoderRotation {
    degrees: i32,
    targets: WheelTicks,
}

impl EncoderRotation {
    pub fn start<A: Actuator, S: HeadingSensor>(
        state: &mut ControllerState<A, S>,
        degrees: i32,
        power: f64,
    ) -> Self {
        let ticks = rotation_ticks(&state.geometry, degrees);
        let delta = match degrees.signum() {
            1 => WheelTicks::sides(-ticks, ticks),
            -1 => WheelTicks::sides(ticks, -ticks),
            _ => WheelTicks::default(),
        };
        info!("Encoder rotation of {} degrees ({} ticks)", degrees, ticks);

        let drive = &mut state.drive;
        drive.set_position_tolerance(POSITION_TOLERANCE_TICKS);
        let targets = drive.offset_targets(delta);
        let power = power.abs();
        drive.write_powers(WheelPowers::new(power, power, power, power));
        drive.set_mode_all(RunMode::PositionHold);

        Self { degrees, targets }
    }

    pub fn targets(&self) -> WheelTicks {
        self.targets
    }

    pub fn tick<A: Actuator, S: HeadingSensor>(
        &mut self,
        state: &mut ControllerState<A, S>,
        sink: &mut dyn ProgressSink,
    ) -> Tick {
        if state.drive.all_settled() {
            sink.report("path", json!("Complete"));
            return Tick::Converged;
        }

        sink.report("path", json!(format!("Rotating {} degrees", self.degrees)));
        sink.report("current_position", json!(state.drive.positions().lf));
        sink.report("target_position", json!(self.targets.lf));
        sink.report("heading", json!(state.heading.heading_degrees()));
        Tick::InProgress
    }
}

/// Encoder turns toward an absolute heading until within ±3°.
///
/// The first turn covers the whole error, later turns are capped at 10°.
#[derive(Debug)]
pub struct HeadingCorrection {
    target: i32,
    power: f64,
    step: EncoderRotation,
    corrections: u32,
}

impl HeadingCorrection {
    pub fn start<A: Actuator, S: HeadingSensor>(
        state: &mut ControllerState<A, S>,
        target: i32,
        power: f64,
    ) -> Self {
        let error = Self::error(state, target);
        info!("Rotating to heading {} (error {})", target, error);
        let step = EncoderRotation::start(state, error, power);
        Self {
            target,
            power,
            step,
            corrections: 0,
        }
    }

    /// Whole-degree error; the heading is truncated the way it is displayed
    fn error<A: Actuator, S: HeadingSensor>(state: &ControllerState<A, S>, target: i32) -> i32 {
        let head = state.heading.heading_degrees().trunc();
        convert_heading(convert_heading(target as f64) - convert_heading(head)) as i32
    }

    pub fn tick<A: Actuator, S: HeadingSensor>(
        &mut self,
        state: &mut ControllerState<A, S>,
        sink: &mut dyn ProgressSink,
    ) -> Tick {
        if self.step.tick(state, sink) == Tick::InProgress {
            return Tick::InProgress;
        }

        let error = Self::error(state, self.target);
        sink.report("heading", json!(state.heading.heading_degrees()));
        sink.report("error", json!(error));
        if error.abs() < HEADING_CORRECTION_BAND_DEG {
            info!(
                "Heading {} reached after {} corrections",
                self.target, self.corrections
            );
            return Tick::Converged;
        }

        let correction = error.clamp(-HEADING_CORRECTION_STEP_DEG, HEADING_CORRECTION_STEP_DEG);
        debug!("Heading off by {}, correcting {}", error, correction);
        self.corrections += 1;
        self.step = EncoderRotation::start(state, correction, self.power);
        Tick::InProgress
    }
}

/// Constant-power turn in the direction of the initial shortest path
#[derive(Debug)]
pub struct FixedPowerRotation {
    target: f64,
    powers: WheelPowers,
}

impl FixedPowerRotation {
    pub fn start<A: Actuator, S: HeadingSensor>(
        state: &mut ControllerState<A, S>,
        degrees: f64,
        power: f64,
    ) -> Self {
        let target = convert_heading(degrees);
        let delta = heading_error(state, target);
        let powers = turn_powers(power.abs() * delta.signum());
        info!(
            "Rotating to {:.1} degrees at fixed power {:.2} (delta {:.1})",
            target, power, delta
        );

        state.drive.set_mode_all(RunMode::Velocity);
        if delta.abs() > ROTATE_DEAD_BAND_DEG {
            state.drive.write_powers(powers);
        }
        Self { target, powers }
    }

    pub fn tick<A: Actuator, S: HeadingSensor>(
        &mut self,
        state: &mut ControllerState<A, S>,
        sink: &mut dyn ProgressSink,
    ) -> Tick {
        let error = heading_error(state, self.target);
        sink.report("heading", json!(state.heading.heading_degrees()));
        sink.report("absolute", json!(error.abs()));
        sink.report("degrees", json!(self.target));

        if error.abs() <= ROTATE_DEAD_BAND_DEG {
            state.drive.stop();
            return Tick::Converged;
        }
        state.drive.write_powers(self.powers);
        Tick::InProgress
    }
}

/// Proportional turn with a sign-asymmetric gain.
///
/// Power is `error / 300` counter-clockwise and `error / 400` clockwise,
/// never more than the requested power. No integral or derivative term.
#[derive(Debug)]
pub struct ProportionalRotation {
    target: f64,
    max_power: f64,
}

impl ProportionalRotation {
    pub fn start<A: Actuator, S: HeadingSensor>(
        state: &mut ControllerState<A, S>,
        degrees: f64,
        power: f64,
    ) -> Self {
        let target = convert_heading(degrees);
        let max_power = power.abs();
        let delta = heading_error(state, target);
        info!(
            "Rotating to {:.1} degrees, proportional (delta {:.1})",
            target, delta
        );

        state.drive.set_mode_all(RunMode::Velocity);
        if delta.abs() > ROTATE_DEAD_BAND_DEG {
            let kick = ROTATE_TO_START_POWER.min(max_power) * delta.signum();
            state.drive.write_powers(turn_powers(kick));
        }
        Self { target, max_power }
    }

    /// Turn power for a signed heading error
    pub fn power_for(error: f64, max_power: f64) -> f64 {
        let power = if error > 0.0 {
            error / ROTATE_TO_GAIN_DIVISOR_POSITIVE
        } else {
            error / ROTATE_TO_GAIN_DIVISOR_NEGATIVE
        };
        power.clamp(-max_power, max_power)
    }

    pub fn tick<A: Actuator, S: HeadingSensor>(
        &mut self,
        state: &mut ControllerState<A, S>,
        sink: &mut dyn ProgressSink,
    ) -> Tick {
        let error = heading_error(state, self.target);
        sink.report("heading", json!(state.heading.heading_degrees()));
        sink.report("degrees", json!(error));

        if error.abs() <= ROTATE_DEAD_BAND_DEG {
            state.drive.stop();
            return Tick::Converged;
        }
        let power = Self::power_for(error, self.max_power);
        state.drive.write_powers(turn_powers(power));
        Tick::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimWorld;
    use crate::telemetry::NoopSink;

    fn controller(world: &SimWorld) -> ControllerState<crate::sim::SimWheel, crate::sim::SimImu> {
        ControllerState::new(world.drive(), world.imu(), DriveGeometry::default())
    }

    /// Step the world and tick until the motion leaves InProgress
    fn run(
        world: &SimWorld,
        state: &mut ControllerState<crate::sim::SimWheel, crate::sim::SimImu>,
        mut tick: impl FnMut(&mut ControllerState<crate::sim::SimWheel, crate::sim::SimImu>) -> Tick,
    ) -> usize {
        for cycle in 0..5000 {
            world.step();
            state.sample();
            if tick(state) != Tick::InProgress {
                return cycle;
            }
        }
        panic!("motion never finished");
    }

    #[test]
    fn test_rotation_ticks() {
        let geometry = DriveGeometry::default();
        assert_eq!(rotation_ticks(&geometry, 90), 52);
        assert_eq!(rotation_ticks(&geometry, -90), 52);
        assert_eq!(rotation_ticks(&geometry, 0), 0);
    }

    #[test]
    fn test_encoder_rotate_opposes_sides() {
        let world = SimWorld::new();
        let mut state = controller(&world);
        let mut motion = EncoderRotation::start(&mut state, 90, 0.3);

        let targets = motion.targets();
        assert_eq!(targets, WheelTicks::sides(-52, 52));
        assert!(targets.lf.signum() != targets.rf.signum());
        assert_eq!(targets.lf, targets.lr);
        assert_eq!(targets.rf, targets.rr);
        for wheel in world.wheel_states() {
            assert_eq!(wheel.mode, RunMode::PositionHold);
            assert!((wheel.power - 0.3).abs() < 1e-12);
        }

        assert_eq!(motion.tick(&mut state, &mut NoopSink), Tick::InProgress);
        run(&world, &mut state, |s| {
            let result = motion.tick(s, &mut NoopSink);
            if result == Tick::Converged {
                assert!(s.drive.all_settled());
            }
            result
        });

        // Servos keep closing the last few ticks inside the tolerance band
        for _ in 0..20 {
            world.step();
        }
        // Turned counter-clockwise by roughly the requested angle
        let yaw = world.yaw_degrees();
        assert!(yaw > 80.0 && yaw < 95.0, "yaw {}", yaw);
    }

    #[test]
    fn test_encoder_rotate_negative() {
        let world = SimWorld::new();
        let mut state = controller(&world);
        let motion = EncoderRotation::start(&mut state, -45, 0.5);
        let ticks = rotation_ticks(&state.geometry, 45);
        assert_eq!(motion.targets(), WheelTicks::sides(ticks, -ticks));
    }

    #[test]
    fn test_encoder_rotate_blocked_by_jammed_wheel() {
        let world = SimWorld::new();
        let mut state = controller(&world);
        world.jam_wheel(3);
        let mut motion = EncoderRotation::start(&mut state, 90, 0.3);
        for _ in 0..500 {
            world.step();
            state.sample();
            assert_eq!(motion.tick(&mut state, &mut NoopSink), Tick::InProgress);
        }
    }

    #[test]
    fn test_rotate_to_heading_lands_in_band() {
        for target in [90, -60, 135, 7] {
            let world = SimWorld::new();
            let mut state = controller(&world);
            let mut motion = HeadingCorrection::start(&mut state, target, 0.4);
            run(&world, &mut state, |s| motion.tick(s, &mut NoopSink));

            let error = convert_heading(target as f64 - world.yaw_degrees());
            assert!(error.abs() < 4.0, "target {} ended at {}", target, world.yaw_degrees());
        }
    }

    #[test]
    fn test_fixed_power_rotation_converges() {
        for target in [90.0, -120.0, 170.0] {
            let world = SimWorld::new();
            let mut state = controller(&world);
            let mut motion = FixedPowerRotation::start(&mut state, target, 0.3);
            run(&world, &mut state, |s| motion.tick(s, &mut NoopSink));

            let error = convert_heading(target - state.heading.heading_degrees());
            assert!(error.abs() <= ROTATE_DEAD_BAND_DEG, "target {} error {}", target, error);
            assert!(world.wheel_states().iter().all(|w| w.power == 0.0));
        }
    }

    #[test]
    fn test_fixed_power_takes_shortest_path() {
        let world = SimWorld::new();
        world.set_yaw_degrees(170.0);
        let mut state = controller(&world);
        let _motion = FixedPowerRotation::start(&mut state, -170.0, 0.3);
        // 20 degrees counter-clockwise across the wrap, not 340 clockwise
        let wheels = world.wheel_states();
        assert!(wheels[0].power < 0.0 && wheels[2].power > 0.0);
    }

    #[test]
    fn test_proportional_rotation_converges() {
        for target in [90.0, -90.0, 179.0, -30.0] {
            let world = SimWorld::new();
            let mut state = controller(&world);
            let mut motion = ProportionalRotation::start(&mut state, target, 1.0);
            run(&world, &mut state, |s| motion.tick(s, &mut NoopSink));

            let error = convert_heading(target - state.heading.heading_degrees());
            assert!(error.abs() <= ROTATE_DEAD_BAND_DEG, "target {} error {}", target, error);
            assert!(world.wheel_states().iter().all(|w| w.power == 0.0));
        }
    }

    #[test]
    fn test_proportional_gain_is_sign_asymmetric() {
        assert!((ProportionalRotation::power_for(90.0, 1.0) - 0.3).abs() < 1e-12);
        assert!((ProportionalRotation::power_for(-90.0, 1.0) + 0.225).abs() < 1e-12);
        assert_eq!(ProportionalRotation::power_for(180.0, 0.2), 0.2);
        assert_eq!(ProportionalRotation::power_for(-180.0, 0.2), -0.2);
    }

    #[test]
    fn test_proportional_start_kick() {
        let world = SimWorld::new();
        let mut state = controller(&world);
        let _motion = ProportionalRotation::start(&mut state, -90.0, 1.0);
        let wheels = world.wheel_states();
        assert_eq!(wheels[0].power, ROTATE_TO_START_POWER);
        assert_eq!(wheels[2].power, -ROTATE_TO_START_POWER);
        assert!(wheels.iter().all(|w| w.mode == RunMode::Velocity));
    }

    #[test]
    fn test_already_on_heading_holds_still() {
        let world = SimWorld::new();
        world.set_yaw_degrees(45.0);
        let mut state = controller(&world);
        let mut motion = ProportionalRotation::start(&mut state, 47.0, 0.5);
        assert!(world.wheel_states().iter().all(|w| w.power == 0.0));
        assert_eq!(motion.tick(&mut state, &mut NoopSink), Tick::Converged);
    }
}
