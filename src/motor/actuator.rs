// Wheel actuator interface
//
// Implemented by whatever binds the controller to real motor hardware.
// The controller assumes these calls never fail: a stalled wheel shows up
// as a target that is never reached, not as an error.

use serde::{Deserialize, Serialize};

use crate::config::{APPROX_MOTOR_TICKS, APPROX_SERVO_EPSILON};

/// Actuator run modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Power is applied directly (open loop or the motor's own velocity loop)
    Velocity,
    /// The motor's servo drives toward its target position
    PositionHold,
}

/// What the motor does when commanded zero power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPowerBehavior {
    Brake,
    Coast,
}

/// A single wheel motor with an encoder
pub trait Actuator {
    /// Set power in [-1.0, 1.0]. In position-hold mode only the magnitude matters.
    fn set_power(&mut self, power: f64);

    /// Absolute target position in encoder ticks
    fn set_target_position(&mut self, ticks: i32);

    fn target_position(&self) -> i32;

    fn current_position(&self) -> i32;

    fn set_mode(&mut self, mode: RunMode);

    fn set_zero_power_behavior(&mut self, behavior: ZeroPowerBehavior);

    /// True while a position-hold move is outside its tolerance band
    fn is_busy(&self) -> bool;

    fn set_position_tolerance(&mut self, ticks: i32);
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_power(&mut self, power: f64) {
        (**self).set_power(power)
    }

    fn set_target_position(&mut self, ticks: i32) {
        (**self).set_target_position(ticks)
    }

    fn target_position(&self) -> i32 {
        (**self).target_position()
    }

    fn current_position(&self) -> i32 {
        (**self).current_position()
    }

    fn set_mode(&mut self, mode: RunMode) {
        (**self).set_mode(mode)
    }

    fn set_zero_power_behavior(&mut self, behavior: ZeroPowerBehavior) {
        (**self).set_zero_power_behavior(behavior)
    }

    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }

    fn set_position_tolerance(&mut self, ticks: i32) {
        (**self).set_position_tolerance(ticks)
    }
}

/// Servo position is within 0.001 of where it should be
pub fn approx_servo(actual: f64, supposed: f64) -> bool {
    actual < supposed + APPROX_SERVO_EPSILON && actual > supposed - APPROX_SERVO_EPSILON
}

/// Encoder position is within 5 ticks of where it should be
pub fn approx_motor(actual: i32, supposed: f64) -> bool {
    let actual = actual as f64;
    actual < supposed + APPROX_MOTOR_TICKS && actual > supposed - APPROX_MOTOR_TICKS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_servo_band() {
        assert!(approx_servo(0.5605, 0.56));
        assert!(!approx_servo(0.562, 0.56));
        // Bounds are exclusive
        assert!(!approx_servo(0.25, 0.25 + APPROX_SERVO_EPSILON * 2.0));
    }

    #[test]
    fn test_approx_motor_band() {
        assert!(approx_motor(100, 104.0));
        assert!(approx_motor(100, 96.0));
        assert!(!approx_motor(100, 105.0));
        assert!(!approx_motor(-10, -15.0));
    }
}
