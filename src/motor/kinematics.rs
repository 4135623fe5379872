// Mecanum inverse kinematics for a four-wheel base
// Converts a field-relative (x, y) request plus the live heading into wheel powers.

use std::f64::consts::FRAC_PI_4;

use crate::config::SLOW_DRIVE_SCALE;

/// Power commands for the four mecanum wheels, each in [-1.0, 1.0] once normalized
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelPowers {
    pub lf: f64, // left front
    pub lr: f64, // left rear
    pub rf: f64, // right front
    pub rr: f64, // right rear
}

impl WheelPowers {
    pub fn new(lf: f64, lr: f64, rf: f64, rr: f64) -> Self {
        Self { lf, lr, rf, rr }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Left pair at `left`, right pair at `right`
    pub fn sides(left: f64, right: f64) -> Self {
        Self::new(left, left, right, right)
    }

    /// Returns powers as array [lf, lr, rf, rr]
    pub fn as_array(&self) -> [f64; 4] {
        [self.lf, self.lr, self.rf, self.rr]
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.lf * factor,
            self.lr * factor,
            self.rf * factor,
            self.rr * factor,
        )
    }

    /// Divide every wheel by the larger of 1.0 and the largest magnitude.
    ///
    /// Ratios between wheels are preserved, so the direction of travel does not
    /// change when a request saturates. This is the only normalization used;
    /// clamping wheels individually would bend the heading of the motion.
    pub fn normalized(&self) -> Self {
        let divisor = max_abs(&[1.0, self.lf, self.lr, self.rf, self.rr]);
        self.scaled(1.0 / divisor)
    }
}

/// Largest absolute value in `values` (0.0 for an empty slice)
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().map(|v| v.abs()).fold(0.0, f64::max)
}

/// Field-relative drive: `x` strafes, `y` drives forward, both in [-1, 1].
///
/// `heading` is the robot's current heading in radians. Forward in the request
/// stays field-forward regardless of chassis orientation. A zero vector gives
/// zero powers.
pub fn field_relative(x: f64, y: f64, heading: f64) -> WheelPowers {
    let magnitude = (x * x + y * y).sqrt().min(1.0);
    directed(x, y, heading, magnitude)
}

/// Same as [`field_relative`] at half magnitude, for fine positioning
pub fn field_relative_slow(x: f64, y: f64, heading: f64) -> WheelPowers {
    field_relative(x, y, heading).scaled(SLOW_DRIVE_SCALE)
}

/// Uses (x, y) only for direction; magnitude comes from `speed` (capped at 1.0)
pub fn field_relative_with_speed(x: f64, y: f64, heading: f64, speed: f64) -> WheelPowers {
    directed(x, y, heading, speed.min(1.0))
}

fn directed(x: f64, y: f64, heading: f64, magnitude: f64) -> WheelPowers {
    let direction = x.atan2(y) + heading;
    let diagonal_a = magnitude * (direction + FRAC_PI_4).sin();
    let diagonal_b = magnitude * (direction + FRAC_PI_4).cos();

    // lf/rr share one roller diagonal, rf/lr the other
    WheelPowers {
        lf: diagonal_a,
        rr: diagonal_a,
        rf: diagonal_b,
        lr: diagonal_b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-9;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < EPS, "{} != {}", a, b);
    }

    #[test]
    fn test_zero_vector_holds_still() {
        let wheels = field_relative(0.0, 0.0, 1.2);
        assert_eq!(max_abs(&wheels.as_array()), 0.0);
    }

    #[test]
    fn test_forward_all_wheels_equal() {
        let wheels = field_relative(0.0, 1.0, 0.0);
        let expected = FRAC_PI_4.sin();
        for w in wheels.as_array() {
            assert_close(w, expected);
        }
        assert!(wheels.lf > 0.0);
    }

    #[test]
    fn test_sideways_pattern() {
        // Pure strafe: diagonals oppose each other
        let wheels = field_relative(1.0, 0.0, 0.0);
        println!("Strafe: {:?}", wheels);
        assert!(wheels.lf > 0.0 && wheels.rr > 0.0);
        assert!(wheels.rf < 0.0 && wheels.lr < 0.0);
        assert_close(wheels.lf, -wheels.rf);
        assert_close(wheels.lf, wheels.rr);
        assert_close(wheels.rf, wheels.lr);
    }

    #[test]
    fn test_heading_rotates_request() {
        // Strafing right while turned a quarter turn matches driving straight at zero heading
        let turned = field_relative(1.0, 0.0, -FRAC_PI_2);
        let straight = field_relative(0.0, 1.0, 0.0);
        for (a, b) in turned.as_array().iter().zip(straight.as_array()) {
            assert_close(*a, b);
        }
    }

    #[test]
    fn test_outputs_bounded_for_unit_disc() {
        for i in 0..16 {
            let angle = i as f64 * PI / 8.0;
            for r in [0.1, 0.5, 1.0] {
                for h in [-3.0, -1.0, 0.0, 0.7, 2.5] {
                    let wheels = field_relative(r * angle.cos(), r * angle.sin(), h).normalized();
                    assert!(max_abs(&wheels.as_array()) <= 1.0 + EPS);
                }
            }
        }
    }

    #[test]
    fn test_slow_is_half() {
        let full = field_relative(0.3, 0.6, 0.2);
        let slow = field_relative_slow(0.3, 0.6, 0.2);
        assert_close(slow.lf, full.lf * 0.5);
        assert_close(slow.rf, full.rf * 0.5);
    }

    #[test]
    fn test_speed_override_ignores_vector_length() {
        let tiny = field_relative_with_speed(0.0, 0.01, 0.0, 0.8);
        let large = field_relative_with_speed(0.0, 5.0, 0.0, 0.8);
        assert_eq!(tiny, large);
        assert_close(tiny.lf, 0.8 * FRAC_PI_4.sin());

        let capped = field_relative_with_speed(0.0, 1.0, 0.0, 3.0);
        assert_eq!(capped, field_relative(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_normalize_within_bounds_unchanged() {
        let wheels = WheelPowers::new(0.5, -0.25, 0.9, 0.0);
        assert_eq!(wheels.normalized(), wheels);
        // Scaling down an in-bounds command stays proportional
        assert_eq!(wheels.scaled(0.5).normalized(), wheels.scaled(0.5));
    }

    #[test]
    fn test_normalize_preserves_ratios() {
        let wheels = WheelPowers::new(2.0, -1.0, 0.5, -4.0).normalized();
        assert_close(wheels.rr, -1.0);
        assert_close(wheels.lf, 0.5);
        assert_close(wheels.lr, -0.25);
        assert_close(wheels.rf, 0.125);
    }
}
