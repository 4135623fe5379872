// Simulated mecanum base: four encoder wheels and an IMU sharing one world
//
// Lets the runtime and the controllers run without hardware. The world only
// advances when `step()` is called, one control period at a time.

use std::f64::consts::{PI, TAU};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{DriveGeometry, LOOP_HZ};
use crate::heading::{Acceleration, HeadingSensor, Orientation};
use crate::motor::{Actuator, MecanumDrive, RunMode, ZeroPowerBehavior};

/// Free-running wheel speed at full power (ticks per second)
pub const DEFAULT_MAX_TICKS_PER_SEC: f64 = 700.0;

const GRAVITY: f64 = 9.80665;

/// Snapshot of one simulated wheel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelState {
    pub mode: RunMode,
    pub zero_power: ZeroPowerBehavior,
    pub power: f64,
    pub target: i32,
    pub tolerance: i32,
    pub position: f64,
    pub jammed: bool,
}

impl Default for WheelState {
    fn default() -> Self {
        Self {
            mode: RunMode::Velocity,
            zero_power: ZeroPowerBehavior::Coast,
            power: 0.0,
            target: 0,
            tolerance: 10,
            position: 0.0,
            jammed: false,
        }
    }
}

impl WheelState {
    fn busy(&self) -> bool {
        self.mode == RunMode::PositionHold
            && (self.target as f64 - self.position).abs() > self.tolerance as f64
    }

    /// Advance one period, returning the distance travelled in ticks
    fn advance(&mut self, max_step: f64) -> f64 {
        if self.jammed {
            return 0.0;
        }
        let travel = match self.mode {
            RunMode::Velocity => self.power * max_step,
            RunMode::PositionHold => {
                let remaining = self.target as f64 - self.position;
                let reach = self.power.abs() * max_step;
                remaining.clamp(-reach, reach)
            }
        };
        self.position += travel;
        travel
    }
}

struct WorldState {
    wheels: [WheelState; 4], // [lf, lr, rf, rr]
    yaw: f64,
    calibrated: bool,
    max_ticks_per_sec: f64,
    dt: f64,
    degrees_per_tick: f64,
}

/// Shared simulated world. Clones refer to the same world.
#[derive(Clone)]
pub struct SimWorld {
    state: Arc<Mutex<WorldState>>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self::with_geometry(&DriveGeometry::default(), DEFAULT_MAX_TICKS_PER_SEC)
    }

    /// Chassis yaw is derived from the same turning-circle geometry the
    /// encoder rotation uses, so encoder turns land where they are aimed.
    pub fn with_geometry(geometry: &DriveGeometry, max_ticks_per_sec: f64) -> Self {
        let wheel_circumference =
            geometry.rotation_wheel_gear_ratio * PI * geometry.wheel_diameter_inches;
        let inches_per_tick = wheel_circumference / geometry.counts_per_rev;
        let degrees_per_tick = inches_per_tick / geometry.rotation_circumference_inches * 360.0;

        Self {
            state: Arc::new(Mutex::new(WorldState {
                wheels: [WheelState::default(); 4],
                yaw: 0.0,
                calibrated: true,
                max_ticks_per_sec,
                dt: 1.0 / LOOP_HZ as f64,
                degrees_per_tick,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Four simulated wheels wrapped in a drive
    pub fn drive(&self) -> MecanumDrive<SimWheel> {
        MecanumDrive::new(
            self.wheel(0),
            self.wheel(1),
            self.wheel(2),
            self.wheel(3),
        )
    }

    fn wheel(&self, index: usize) -> SimWheel {
        SimWheel {
            world: self.clone(),
            index,
        }
    }

    pub fn imu(&self) -> SimImu {
        SimImu {
            world: self.clone(),
        }
    }

    /// Advance the world by one control period
    pub fn step(&self) {
        let mut state = self.lock();
        let max_step = state.max_ticks_per_sec * state.dt;
        let mut travel = [0.0; 4];
        for (wheel, t) in state.wheels.iter_mut().zip(travel.iter_mut()) {
            *t = wheel.advance(max_step);
        }

        // Right side forward and left side back turns the chassis counter-clockwise
        let left = (travel[0] + travel[1]) / 2.0;
        let right = (travel[2] + travel[3]) / 2.0;
        let turn_ticks = (right - left) / 2.0;
        let yaw = state.yaw + (turn_ticks * state.degrees_per_tick).to_radians();
        state.yaw = wrap_pi(yaw);
    }

    pub fn wheel_states(&self) -> [WheelState; 4] {
        self.lock().wheels
    }

    pub fn set_positions(&self, positions: [i32; 4]) {
        let mut state = self.lock();
        for (wheel, position) in state.wheels.iter_mut().zip(positions) {
            wheel.position = position as f64;
        }
    }

    pub fn yaw_degrees(&self) -> f64 {
        self.lock().yaw.to_degrees()
    }

    pub fn set_yaw_degrees(&self, degrees: f64) {
        self.lock().yaw = wrap_pi(degrees.to_radians());
    }

    pub fn set_calibrated(&self, calibrated: bool) {
        self.lock().calibrated = calibrated;
    }

    /// A jammed wheel never moves again
    pub fn jam_wheel(&self, index: usize) {
        if let Some(wheel) = self.lock().wheels.get_mut(index) {
            wheel.jammed = true;
        }
    }
}

/// Wrap into (-π, π] like an IMU yaw reading
fn wrap_pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI { PI } else { wrapped }
}

/// One wheel of a [`SimWorld`]
pub struct SimWheel {
    world: SimWorld,
    index: usize,
}

impl SimWheel {
    fn read<T>(&self, f: impl FnOnce(&WheelState) -> T) -> T {
        f(&self.world.lock().wheels[self.index])
    }

    fn write(&mut self, f: impl FnOnce(&mut WheelState)) {
        f(&mut self.world.lock().wheels[self.index])
    }
}

impl Actuator for SimWheel {
    fn set_power(&mut self, power: f64) {
        self.write(|w| w.power = power.clamp(-1.0, 1.0));
    }

    fn set_target_position(&mut self, ticks: i32) {
        self.write(|w| w.target = ticks);
    }

    fn target_position(&self) -> i32 {
        self.read(|w| w.target)
    }

    fn current_position(&self) -> i32 {
        self.read(|w| w.position.round() as i32)
    }

    fn set_mode(&mut self, mode: RunMode) {
        self.write(|w| w.mode = mode);
    }

    fn set_zero_power_behavior(&mut self, behavior: ZeroPowerBehavior) {
        self.write(|w| w.zero_power = behavior);
    }

    fn is_busy(&self) -> bool {
        self.read(WheelState::busy)
    }

    fn set_position_tolerance(&mut self, ticks: i32) {
        self.write(|w| w.tolerance = ticks);
    }
}

/// IMU of a [`SimWorld`]
pub struct SimImu {
    world: SimWorld,
}

impl HeadingSensor for SimImu {
    fn sample(&mut self) -> Orientation {
        Orientation::from_yaw(self.world.lock().yaw)
    }

    fn gravity(&mut self) -> Option<Acceleration> {
        Some(Acceleration {
            x: 0.0,
            y: 0.0,
            z: GRAVITY,
        })
    }

    fn is_calibrated(&self) -> bool {
        self.world.lock().calibrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_mode_moves_with_power() {
        let world = SimWorld::new();
        let mut drive = world.drive();
        drive.write_powers(crate::motor::WheelPowers::new(0.5, 0.5, 0.5, 0.5));
        world.step();
        let expected = 0.5 * DEFAULT_MAX_TICKS_PER_SEC / LOOP_HZ as f64;
        for wheel in world.wheel_states() {
            assert!((wheel.position - expected).abs() < 1e-9);
        }
        // Straight travel does not turn the chassis
        assert!(world.yaw_degrees().abs() < 1e-9);
    }

    #[test]
    fn test_opposed_sides_turn_counter_clockwise() {
        let world = SimWorld::new();
        let mut drive = world.drive();
        drive.write_powers(crate::motor::WheelPowers::sides(-0.2, 0.2));
        world.step();
        assert!(world.yaw_degrees() > 0.0);
    }

    #[test]
    fn test_position_hold_stops_at_target() {
        let world = SimWorld::new();
        let mut drive = world.drive();
        drive.set_position_tolerance(12);
        drive.offset_targets(crate::motor::WheelTicks::uniform(-100));
        drive.write_powers(crate::motor::WheelPowers::new(1.0, 1.0, 1.0, 1.0));
        drive.set_mode_all(RunMode::PositionHold);
        assert!(!drive.all_settled());
        for _ in 0..20 {
            world.step();
        }
        assert!(drive.all_settled());
        assert_eq!(drive.positions(), crate::motor::WheelTicks::uniform(-100));
    }

    #[test]
    fn test_jammed_wheel_stays_busy() {
        let world = SimWorld::new();
        let mut drive = world.drive();
        world.jam_wheel(2);
        drive.offset_targets(crate::motor::WheelTicks::uniform(200));
        drive.write_powers(crate::motor::WheelPowers::new(1.0, 1.0, 1.0, 1.0));
        drive.set_mode_all(RunMode::PositionHold);
        for _ in 0..100 {
            world.step();
        }
        assert!(!drive.all_settled());
    }

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert_eq!(wrap_pi(-PI), PI);
        assert!((wrap_pi(0.25) - 0.25).abs() < 1e-12);
    }
}
