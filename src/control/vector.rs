// Field-relative translation and timed holds

use std::time::{Duration, Instant};

use serde_json::json;

use super::{ControllerState, Tick};
use crate::heading::HeadingSensor;
use crate::motor::kinematics::{field_relative, field_relative_slow, field_relative_with_speed};
use crate::motor::{Actuator, WheelPowers};
use crate::telemetry::ProgressSink;

/// Field-relative drive along (x, y), re-aimed with the live heading every tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorDrive {
    x: f64,
    y: f64,
    speed: Option<f64>,
    slow: bool,
}

impl VectorDrive {
    pub fn start<A: Actuator, S: HeadingSensor>(
        state: &mut ControllerState<A, S>,
        x: f64,
        y: f64,
        speed: Option<f64>,
        slow: bool,
    ) -> Self {
        state.drive.use_encoders();
        Self { x, y, speed, slow }
    }

    pub fn powers(&self, heading: f64) -> WheelPowers {
        match (self.speed, self.slow) {
            (Some(speed), _) => field_relative_with_speed(self.x, self.y, heading, speed),
            (None, true) => field_relative_slow(self.x, self.y, heading),
            (None, false) => field_relative(self.x, self.y, heading),
        }
    }

    /// Applies one cycle of powers; each cycle is complete on its own
    pub fn tick<A: Actuator, S: HeadingSensor>(
        &mut self,
        state: &mut ControllerState<A, S>,
        sink: &mut dyn ProgressSink,
    ) -> Tick {
        let heading = state.heading.heading();
        let powers = self.powers(heading);
        state.drive.apply_powers(powers);

        sink.report("heading", json!(heading.to_degrees()));
        sink.report("rf_lr_speed", json!(powers.rf));
        Tick::Converged
    }
}

/// Holds still until the duration has passed
#[derive(Debug, Clone, Copy)]
pub struct Pause {
    until: Instant,
}

impl Pause {
    pub fn start<A: Actuator, S: HeadingSensor>(
        state: &mut ControllerState<A, S>,
        duration: Duration,
    ) -> Self {
        state.drive.stop();
        Self {
            until: Instant::now() + duration,
        }
    }

    pub fn tick(&mut self, sink: &mut dyn ProgressSink) -> Tick {
        let now = Instant::now();
        if now >= self.until {
            return Tick::Converged;
        }
        sink.report("remaining_ms", json!((self.until - now).as_millis() as u64));
        Tick::InProgress
    }
}
