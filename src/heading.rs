// Heading bookkeeping over a raw IMU orientation feed
//
// The IMU keeps its own absolute frame. Zeroing only moves an offset here, so
// the sensor never needs to be re-initialized mid-run.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

/// Orientation as reported by the heading sensor, intrinsic Z-Y-X, radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// Rotation about Z (yaw), counter-clockwise positive
    pub first_angle: f64,
    pub second_angle: f64,
    pub third_angle: f64,
}

impl Orientation {
    pub fn from_yaw(yaw: f64) -> Self {
        Self {
            first_angle: yaw,
            ..Self::default()
        }
    }
}

/// Linear acceleration or gravity vector in m/s²
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Heading sensor driver (IMU). Calibration happens inside the driver.
pub trait HeadingSensor {
    fn sample(&mut self) -> Orientation;

    /// Gravity vector, for drivers that provide one
    fn gravity(&mut self) -> Option<Acceleration> {
        None
    }

    fn is_calibrated(&self) -> bool;
}

impl<S: HeadingSensor + ?Sized> HeadingSensor for Box<S> {
    fn sample(&mut self) -> Orientation {
        (**self).sample()
    }

    fn gravity(&mut self) -> Option<Acceleration> {
        (**self).gravity()
    }

    fn is_calibrated(&self) -> bool {
        (**self).is_calibrated()
    }
}

/// Zero-able heading over a [`HeadingSensor`].
///
/// Readings are cached: call [`HeadingTracker::sample`] once per control cycle
/// and every heading read until the next sample sees the same snapshot.
pub struct HeadingTracker<S: HeadingSensor> {
    sensor: S,
    offset: f64,
    orientation: Orientation,
    gravity: Option<Acceleration>,
}

impl<S: HeadingSensor> HeadingTracker<S> {
    /// Takes an initial sample so the first heading read is meaningful
    pub fn new(mut sensor: S) -> Self {
        let orientation = sensor.sample();
        let gravity = sensor.gravity();
        Self {
            sensor,
            offset: 0.0,
            orientation,
            gravity,
        }
    }

    /// Refresh the cached orientation and gravity
    pub fn sample(&mut self) {
        self.orientation = self.sensor.sample();
        self.gravity = self.sensor.gravity();
    }

    fn raw_heading(&self) -> f64 {
        self.orientation.first_angle
    }

    /// Heading in radians relative to the last zero, in (-2π, 2π)
    pub fn heading(&self) -> f64 {
        (self.raw_heading() - self.offset) % TAU
    }

    pub fn heading_degrees(&self) -> f64 {
        self.heading().to_degrees()
    }

    /// Make the current raw heading read as zero
    pub fn zero(&mut self) {
        self.offset = self.raw_heading();
    }

    pub fn is_calibrated(&self) -> bool {
        self.sensor.is_calibrated()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn gravity(&self) -> Option<Acceleration> {
        self.gravity
    }
}

/// Fold a heading in degrees into [-180, 180]. Values already in range,
/// including both ends, come back unchanged.
pub fn convert_heading(degrees: f64) -> f64 {
    if (-180.0..=180.0).contains(&degrees) {
        return degrees;
    }
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    struct FixedImu {
        yaw: f64,
        calibrated: bool,
    }

    impl HeadingSensor for FixedImu {
        fn sample(&mut self) -> Orientation {
            Orientation::from_yaw(self.yaw)
        }

        fn is_calibrated(&self) -> bool {
            self.calibrated
        }
    }

    #[test]
    fn test_heading_reads_raw_until_zeroed() {
        let tracker = HeadingTracker::new(FixedImu {
            yaw: 0.5,
            calibrated: true,
        });
        assert!((tracker.heading() - 0.5).abs() < 1e-12);
        assert!(tracker.is_calibrated());
        assert_eq!(tracker.gravity(), None);
    }

    #[test]
    fn test_zero_makes_heading_zero() {
        let mut tracker = HeadingTracker::new(FixedImu {
            yaw: -2.3,
            calibrated: false,
        });
        tracker.sample();
        tracker.zero();
        assert!(tracker.heading_degrees().abs() < 1e-9);
        assert!(!tracker.is_calibrated());
    }

    #[test]
    fn test_heading_does_not_resample() {
        let mut tracker = HeadingTracker::new(FixedImu {
            yaw: 0.1,
            calibrated: true,
        });
        tracker.sensor.yaw = 1.0;
        assert!((tracker.heading() - 0.1).abs() < 1e-12);
        tracker.sample();
        assert!((tracker.heading() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_heading_stays_inside_full_turn() {
        let mut tracker = HeadingTracker::new(FixedImu {
            yaw: -PI + 0.01,
            calibrated: true,
        });
        tracker.zero();
        tracker.sensor.yaw = PI - 0.01;
        tracker.sample();
        let heading = tracker.heading();
        assert!(heading.is_finite());
        assert!(heading.abs() < TAU);
        assert!((heading - (2.0 * PI - 0.02)).abs() < 1e-9);
    }

    #[test]
    fn test_convert_heading_range_and_idempotence() {
        let mut degrees = -540.0;
        while degrees <= 540.0 {
            let once = convert_heading(degrees);
            assert!((-180.0..=180.0).contains(&once), "{} -> {}", degrees, once);
            assert_eq!(convert_heading(once), once);
            degrees += 7.5;
        }
    }

    #[test]
    fn test_convert_heading_boundaries() {
        assert_eq!(convert_heading(180.0), 180.0);
        assert_eq!(convert_heading(-180.0), -180.0);
        assert_eq!(convert_heading(270.0), -90.0);
        assert_eq!(convert_heading(-190.0), 170.0);
    }

    #[test]
    fn test_convert_heading_many_turns() {
        assert_eq!(convert_heading(1000.0), -80.0);
        assert_eq!(convert_heading(-1000.0), 80.0);
        assert_eq!(convert_heading(720.0), 0.0);
        for degrees in [1e6, -1e6, 123_456.7, -98_765.4] {
            let folded = convert_heading(degrees);
            assert!((-180.0..=180.0).contains(&folded), "{} -> {}", degrees, folded);
            assert_eq!(convert_heading(folded), folded);
            let turns = (degrees - folded) / 360.0;
            assert!((turns - turns.round()).abs() < 1e-6);
        }
    }
}
