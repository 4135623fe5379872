// High-level driver for the four-wheel mecanum base
//
// Owns the four wheel actuators and gives the controllers a wheel-set API:
// normalized power writes, mode switching and relative position targets.

use tracing::{debug, info};

use super::actuator::{Actuator, RunMode, ZeroPowerBehavior};
use super::kinematics::WheelPowers;
use crate::config::DriveGeometry;

/// Signed tick deltas for each wheel, applied on top of current positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelTicks {
    pub lf: i32,
    pub lr: i32,
    pub rf: i32,
    pub rr: i32,
}

impl WheelTicks {
    pub fn new(lf: i32, lr: i32, rf: i32, rr: i32) -> Self {
        Self { lf, lr, rf, rr }
    }

    pub fn uniform(ticks: i32) -> Self {
        Self::new(ticks, ticks, ticks, ticks)
    }

    /// Left pair at `left`, right pair at `right`
    pub fn sides(left: i32, right: i32) -> Self {
        Self::new(left, left, right, right)
    }

    /// Returns ticks as array [lf, lr, rf, rr]
    pub fn as_array(&self) -> [i32; 4] {
        [self.lf, self.lr, self.rf, self.rr]
    }
}

/// Four mecanum wheels, named by corner
pub struct MecanumDrive<A: Actuator> {
    lf: A,
    lr: A,
    rf: A,
    rr: A,
}

impl<A: Actuator> MecanumDrive<A> {
    /// Wrap four configured actuators. Wheels brake at zero power and start in velocity mode.
    pub fn new(lf: A, lr: A, rf: A, rr: A) -> Self {
        let mut drive = Self { lf, lr, rf, rr };
        drive.set_zero_power_behavior(ZeroPowerBehavior::Brake);
        drive.set_mode_all(RunMode::Velocity);
        drive
    }

    fn wheels_mut(&mut self) -> [&mut A; 4] {
        [&mut self.lf, &mut self.lr, &mut self.rf, &mut self.rr]
    }

    fn wheels(&self) -> [&A; 4] {
        [&self.lf, &self.lr, &self.rf, &self.rr]
    }

    /// Set wheel powers after dividing by the larger of 1.0 and the largest magnitude
    pub fn apply_powers(&mut self, powers: WheelPowers) {
        self.write_powers(powers.normalized());
    }

    /// Write powers as given. Callers are responsible for the [-1, 1] range.
    pub fn write_powers(&mut self, powers: WheelPowers) {
        debug!(
            "Setting wheel powers: lf={:.3}, lr={:.3}, rf={:.3}, rr={:.3}",
            powers.lf, powers.lr, powers.rf, powers.rr
        );
        self.lf.set_power(powers.lf);
        self.lr.set_power(powers.lr);
        self.rf.set_power(powers.rf);
        self.rr.set_power(powers.rr);
    }

    /// Zero power on every wheel
    pub fn stop(&mut self) {
        self.write_powers(WheelPowers::zero());
    }

    pub fn set_mode_all(&mut self, mode: RunMode) {
        for wheel in self.wheels_mut() {
            wheel.set_mode(mode);
        }
    }

    /// Closed-loop velocity mode
    pub fn use_encoders(&mut self) {
        self.set_mode_all(RunMode::Velocity);
    }

    pub fn set_zero_power_behavior(&mut self, behavior: ZeroPowerBehavior) {
        for wheel in self.wheels_mut() {
            wheel.set_zero_power_behavior(behavior);
        }
    }

    pub fn set_position_tolerance(&mut self, ticks: i32) {
        for wheel in self.wheels_mut() {
            wheel.set_position_tolerance(ticks);
        }
    }

    /// Set every wheel's target to its current position plus the given delta,
    /// saturating at the `i32` range. Returns the absolute targets that were written.
    pub fn offset_targets(&mut self, delta: WheelTicks) -> WheelTicks {
        let targets = WheelTicks::new(
            self.lf.current_position().saturating_add(delta.lf),
            self.lr.current_position().saturating_add(delta.lr),
            self.rf.current_position().saturating_add(delta.rf),
            self.rr.current_position().saturating_add(delta.rr),
        );
        self.lf.set_target_position(targets.lf);
        self.lr.set_target_position(targets.lr);
        self.rf.set_target_position(targets.rf);
        self.rr.set_target_position(targets.rr);
        targets
    }

    /// Start an unpolled position run of `inches` on every wheel at `speed`.
    ///
    /// Targets are absolute (not relative to the current position), and the
    /// caller decides when the move is done, e.g. via [`Self::all_settled`].
    pub fn drive_inches(&mut self, geometry: &DriveGeometry, speed: f64, inches: f64) {
        let target = (inches * geometry.geared_counts_per_inch()) as i32;
        info!("Position run of {:.1} inches ({} ticks)", inches, target);
        self.write_powers(WheelPowers::new(speed, speed, speed, speed));
        for wheel in self.wheels_mut() {
            wheel.set_target_position(target);
        }
        self.set_mode_all(RunMode::PositionHold);
    }

    /// True once no wheel reports busy
    pub fn all_settled(&self) -> bool {
        self.wheels().iter().all(|wheel| !wheel.is_busy())
    }

    pub fn positions(&self) -> WheelTicks {
        WheelTicks::new(
            self.lf.current_position(),
            self.lr.current_position(),
            self.rf.current_position(),
            self.rr.current_position(),
        )
    }

    pub fn targets(&self) -> WheelTicks {
        WheelTicks::new(
            self.lf.target_position(),
            self.lr.target_position(),
            self.rf.target_position(),
            self.rr.target_position(),
        )
    }
}

impl<A: Actuator> Drop for MecanumDrive<A> {
    fn drop(&mut self) {
        // Leave the base unpowered
        self.stop();
    }
}
