// Motor control module for the mecanum base
//
// Provides:
// - The wheel actuator interface the hardware binding implements
// - Mecanum inverse kinematics (field-relative vector -> wheel powers)
// - High-level four-wheel driver API

mod actuator;
mod driver;
pub mod kinematics;

pub use actuator::{approx_motor, approx_servo, Actuator, RunMode, ZeroPowerBehavior};
pub use driver::{MecanumDrive, WheelTicks};
pub use kinematics::{field_relative, WheelPowers};
