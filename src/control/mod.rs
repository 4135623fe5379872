//! Closed-loop motion control for the mecanum base.
//!
//! Every motion is a state machine. [`MotionController::start`] validates a
//! [`MotionRequest`] and issues the first wheel commands; [`MotionController::tick`]
//! re-samples the sensors, re-evaluates the convergence predicate and
//! returns without blocking. The runtime drives `tick` from its loop; plain
//! callers can use the blocking helpers on [`ControllerState`], which poll
//! `tick` until the motion finishes.
//!
//! Motions have no timeout unless the caller passes [`MotionLimits`]. A stalled
//! wheel otherwise keeps a motion in progress forever.

pub mod distance;
pub mod rotation;
pub mod vector;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DriveGeometry;
use crate::heading::{HeadingSensor, HeadingTracker};
use crate::messages::{DriveDirection, MotionRequest, RotationStrategy};
use crate::motor::{Actuator, MecanumDrive};
use crate::telemetry::{NoopSink, ProgressSink, TracingSink};

pub use distance::DistanceMotion;
pub use rotation::{EncoderRotation, FixedPowerRotation, HeadingCorrection, ProportionalRotation};
pub use vector::{Pause, VectorDrive};

/// Result of one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tick {
    InProgress,
    Converged,
    Stalled(StallReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallReason {
    DeadlineExceeded,
    Cancelled,
}

/// How a blocking motion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    Converged,
    Stalled(StallReason),
}

/// Error types for rejected motion requests
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RequestError {
    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must be within [-1, 1], got {value}")]
    PowerOutOfRange { field: &'static str, value: f64 },

    #[error("Heading sensor is not calibrated")]
    ImuUncalibrated,
}

/// Shared cancel flag. Clones observe the same flag; once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Optional bounds on a motion. The default is unbounded.
#[derive(Debug, Clone, Default)]
pub struct MotionLimits {
    pub deadline: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl MotionLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Everything the control loop owns: the wheels, the heading bookkeeping and the geometry.
///
/// Only the control loop mutates this. Heading offset and cached sensor
/// readings live here rather than in any global.
pub struct ControllerState<A: Actuator, S: HeadingSensor> {
    pub drive: MecanumDrive<A>,
    pub heading: HeadingTracker<S>,
    pub geometry: DriveGeometry,
}

impl<A: Actuator, S: HeadingSensor> ControllerState<A, S> {
    pub fn new(drive: MecanumDrive<A>, sensor: S, geometry: DriveGeometry) -> Self {
        Self {
            drive,
            heading: HeadingTracker::new(sensor),
            geometry,
        }
    }

    /// Fetch the once-per-cycle sensor values
    pub fn sample(&mut self) {
        self.heading.sample();
    }

    pub fn zero_heading(&mut self) {
        self.heading.zero();
        info!("Heading zeroed");
    }

    /// Run `request` to completion, calling `between` after every cycle that is
    /// still in progress. Pass a no-op to busy-poll real hardware.
    pub fn execute(
        &mut self,
        request: MotionRequest,
        limits: MotionLimits,
        sink: &mut dyn ProgressSink,
        mut between: impl FnMut(),
    ) -> Result<MotionOutcome, RequestError> {
        let mut controller = MotionController::start(request, self, limits)?;
        loop {
            match controller.tick(self, sink) {
                Tick::InProgress => between(),
                Tick::Converged => return Ok(MotionOutcome::Converged),
                Tick::Stalled(reason) => return Ok(MotionOutcome::Stalled(reason)),
            }
        }
    }

    /// Blocking encoder drive in a fixed direction. Progress goes to the debug log.
    pub fn drive_distance(
        &mut self,
        power: f64,
        inches: f64,
        direction: DriveDirection,
        between: impl FnMut(),
    ) -> Result<MotionOutcome, RequestError> {
        let request = MotionRequest::DriveDistance {
            power,
            inches,
            direction,
        };
        let mut sink = TracingSink::default();
        self.execute(request, MotionLimits::unbounded(), &mut sink, between)
    }

    /// Blocking relative turn on encoder targets
    pub fn encoder_rotate(
        &mut self,
        degrees: i32,
        power: f64,
        between: impl FnMut(),
    ) -> Result<MotionOutcome, RequestError> {
        let request = MotionRequest::RotateRelative { degrees, power };
        let mut sink = TracingSink::default();
        self.execute(request, MotionLimits::unbounded(), &mut sink, between)
    }

    /// Blocking turn to an absolute heading with the chosen strategy
    pub fn rotate_absolute(
        &mut self,
        heading: f64,
        power: f64,
        strategy: RotationStrategy,
        between: impl FnMut(),
    ) -> Result<MotionOutcome, RequestError> {
        let request = MotionRequest::RotateAbsolute {
            heading,
            power,
            strategy,
        };
        let mut sink = TracingSink::default();
        self.execute(request, MotionLimits::unbounded(), &mut sink, between)
    }

    /// One cycle of field-relative drive with the current heading
    pub fn drive_vector(&mut self, x: f64, y: f64) {
        self.sample();
        VectorDrive::start(self, x, y, None, false).tick(self, &mut NoopSink);
    }
}

#[derive(Debug)]
enum Motion {
    Distance(DistanceMotion),
    EncoderRotate(EncoderRotation),
    HeadingCorrection(HeadingCorrection),
    FixedPower(FixedPowerRotation),
    Proportional(ProportionalRotation),
    Vector(VectorDrive),
    Pause(Pause),
}

fn finite(field: &'static str, value: f64) -> Result<(), RequestError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RequestError::NonFinite { field, value })
    }
}

fn check_power(field: &'static str, value: f64) -> Result<(), RequestError> {
    finite(field, value)?;
    if value.abs() > 1.0 {
        return Err(RequestError::PowerOutOfRange { field, value });
    }
    Ok(())
}

/// Reject requests whose numbers would poison the controllers
pub fn validate(request: &MotionRequest) -> Result<(), RequestError> {
    match *request {
        MotionRequest::RotateRelative { power: p, .. } => check_power("power", p),
        MotionRequest::RotateAbsolute {
            heading, power: p, ..
        } => {
            finite("heading", heading)?;
            check_power("power", p)
        }
        MotionRequest::DriveDistance {
            power: p, inches, ..
        } => {
            finite("inches", inches)?;
            check_power("power", p)
        }
        MotionRequest::DriveVector { x, y, speed, .. } => {
            finite("x", x)?;
            finite("y", y)?;
            match speed {
                Some(speed) => finite("speed", speed),
                None => Ok(()),
            }
        }
        MotionRequest::Pause { .. } => Ok(()),
    }
}

/// A motion in flight plus the limits it runs under
#[derive(Debug)]
pub struct MotionController {
    request: MotionRequest,
    motion: Motion,
    limits: MotionLimits,
    started: Instant,
}

impl MotionController {
    /// Validate `request`, sample the sensors and issue the first wheel commands
    pub fn start<A: Actuator, S: HeadingSensor>(
        request: MotionRequest,
        state: &mut ControllerState<A, S>,
        limits: MotionLimits,
    ) -> Result<Self, RequestError> {
        validate(&request)?;
        state.sample();

        let motion = match request {
            MotionRequest::RotateRelative { degrees, power } => {
                Motion::EncoderRotate(EncoderRotation::start(state, degrees, power))
            }
            MotionRequest::RotateAbsolute {
                heading,
                power,
                strategy,
            } => match strategy {
                RotationStrategy::Encoder => Motion::HeadingCorrection(HeadingCorrection::start(
                    state,
                    heading.round() as i32,
                    power,
                )),
                RotationStrategy::FixedPower => {
                    Motion::FixedPower(FixedPowerRotation::start(state, heading, power))
                }
                RotationStrategy::Proportional => {
                    Motion::Proportional(ProportionalRotation::start(state, heading, power))
                }
            },
            MotionRequest::DriveDistance {
                power,
                inches,
                direction,
            } => Motion::Distance(DistanceMotion::start(state, power, inches, direction)),
            MotionRequest::DriveVector { x, y, speed, slow } => {
                Motion::Vector(VectorDrive::start(state, x, y, speed, slow))
            }
            MotionRequest::Pause { millis } => {
                Motion::Pause(Pause::start(state, Duration::from_millis(millis)))
            }
        };

        Ok(Self {
            request,
            motion,
            limits,
            started: Instant::now(),
        })
    }

    pub fn request(&self) -> &MotionRequest {
        &self.request
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn interrupted(&self) -> Option<StallReason> {
        if self
            .limits
            .cancel
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
        {
            return Some(StallReason::Cancelled);
        }
        match self.limits.deadline {
            Some(deadline) if self.started.elapsed() > deadline => {
                Some(StallReason::DeadlineExceeded)
            }
            _ => None,
        }
    }

    /// One control cycle: sample, check limits, advance the motion
    pub fn tick<A: Actuator, S: HeadingSensor>(
        &mut self,
        state: &mut ControllerState<A, S>,
        sink: &mut dyn ProgressSink,
    ) -> Tick {
        if let Some(reason) = self.interrupted() {
            // An interrupted pause just resumes; nothing was moving
            if matches!(self.motion, Motion::Pause(_)) {
                info!("Pause interrupted ({:?}), resuming", reason);
                return Tick::Converged;
            }
            warn!(
                "Motion {:?} stopped after {:?}: {:?}",
                self.request,
                self.started.elapsed(),
                reason
            );
            state.drive.stop();
            return Tick::Stalled(reason);
        }

        state.sample();
        let tick = match &mut self.motion {
            Motion::Distance(m) => m.tick(state, sink),
            Motion::EncoderRotate(m) => m.tick(state, sink),
            Motion::HeadingCorrection(m) => m.tick(state, sink),
            Motion::FixedPower(m) => m.tick(state, sink),
            Motion::Proportional(m) => m.tick(state, sink),
            Motion::Vector(m) => m.tick(state, sink),
            Motion::Pause(m) => m.tick(sink),
        };
        sink.flush();

        if tick == Tick::Converged && !matches!(self.motion, Motion::Vector(_)) {
            info!(
                "Motion {:?} converged after {:?}",
                self.request,
                self.started.elapsed()
            );
        }
        tick
    }
}
