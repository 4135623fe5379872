// Timeouts, topics, drive geometry and controller tuning
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Drive-vector watchdog: stop translating if no fresh vector arrives in time
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_BASE: &str = "mecanum/cmd/base"; // motion requests
pub const TOPIC_STATUS: &str = "mecanum/state/motion"; // motion status
pub const TOPIC_HEALTH: &str = "mecanum/state/health"; // health status
pub const TOPIC_TELEMETRY: &str = "mecanum/state/telemetry"; // progress frames

// Drive geometry (measured on the reference chassis)
pub const WHEEL_DIAMETER_INCHES: f64 = 3.77953;
pub const DRIVE_GEAR_REDUCTION: f64 = 0.5; // < 1.0 if geared up
pub const ENCODER_COUNTS_PER_REV: f64 = 145.0;
pub const STRAFE_CIRCUMFERENCE_INCHES: f64 = 11.4; // empirical, re-measure per chassis
pub const ROTATION_CIRCUMFERENCE_INCHES: f64 = 34.5565; // 11-inch turning diameter * pi
pub const ROTATION_WHEEL_GEAR_RATIO: f64 = 2.0; // 28:14
pub const DISTANCE_SCALE: f64 = 3.0; // requested inches are multiplied by this

// Position-hold tuning
pub const POSITION_TOLERANCE_TICKS: i32 = 12;
pub const POSITION_POWER_SCALE: f64 = 0.7;
/// Extra power for the front pair when driving forward or strafing right,
/// compensating a mechanical pull on the reference chassis.
pub const FRONT_BIAS: f64 = 1.3;

// Heading tuning (degrees)
pub const ROTATE_DEAD_BAND_DEG: f64 = 4.0;
pub const HEADING_CORRECTION_BAND_DEG: i32 = 3;
pub const HEADING_CORRECTION_STEP_DEG: i32 = 10;
pub const ROTATE_TO_START_POWER: f64 = 0.25;
pub const ROTATE_TO_GAIN_DIVISOR_POSITIVE: f64 = 300.0;
pub const ROTATE_TO_GAIN_DIVISOR_NEGATIVE: f64 = 400.0;

// Field-relative drive
pub const SLOW_DRIVE_SCALE: f64 = 0.5;

// Approximate-position predicates
pub const APPROX_SERVO_EPSILON: f64 = 0.001;
pub const APPROX_MOTOR_TICKS: f64 = 5.0;

/// Physical constants of the drive base, fixed once the controller is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveGeometry {
    pub wheel_diameter_inches: f64,
    pub drive_gear_reduction: f64,
    pub counts_per_rev: f64,
    pub strafe_circumference_inches: f64,
    pub rotation_circumference_inches: f64,
    pub rotation_wheel_gear_ratio: f64,
    pub distance_scale: f64,
}

impl Default for DriveGeometry {
    fn default() -> Self {
        Self {
            wheel_diameter_inches: WHEEL_DIAMETER_INCHES,
            drive_gear_reduction: DRIVE_GEAR_REDUCTION,
            counts_per_rev: ENCODER_COUNTS_PER_REV,
            strafe_circumference_inches: STRAFE_CIRCUMFERENCE_INCHES,
            rotation_circumference_inches: ROTATION_CIRCUMFERENCE_INCHES,
            rotation_wheel_gear_ratio: ROTATION_WHEEL_GEAR_RATIO,
            distance_scale: DISTANCE_SCALE,
        }
    }
}

impl DriveGeometry {
    /// Straight-line wheel circumference in inches
    pub fn wheel_circumference(&self) -> f64 {
        std::f64::consts::PI * self.wheel_diameter_inches
    }

    /// Geared counts per inch, used by the plain position run
    pub fn geared_counts_per_inch(&self) -> f64 {
        self.counts_per_rev * self.drive_gear_reduction / self.wheel_circumference()
    }
}
