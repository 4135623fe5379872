// Control loop with drive-vector watchdog
// Note: the watchdog stops field-relative driving if the teleop side stops sending vectors.
// Closed-loop motions run to completion (or to their deadline) without fresh commands.

use serde_json::json;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{info, warn};

// local imports
use crate::config::{
    DriveGeometry, CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_BASE, TOPIC_HEALTH, TOPIC_STATUS,
    TOPIC_TELEMETRY,
};
use crate::control::{
    CancelToken, ControllerState, MotionController, MotionLimits, RequestError, Tick, VectorDrive,
};
use crate::heading::HeadingSensor;
use crate::messages::{BaseCommand, MotionRequest, MotionState, MotionStatus, RuntimeHealth};
use crate::motor::Actuator;
use crate::sim::{SimWorld, DEFAULT_MAX_TICKS_PER_SEC};
use crate::telemetry::{FrameSink, ProgressSink};

/// Error types for the runtime loop
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Loop settings, normally taken from the command line
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub loop_hz: u64,
    pub cmd_timeout: Duration,
    /// Deadline applied to every closed-loop motion; `None` runs unbounded
    pub motion_deadline: Option<Duration>,
    /// Free-running speed of the simulated wheels
    pub sim_ticks_per_sec: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            cmd_timeout: CMD_TIMEOUT,
            motion_deadline: None,
            sim_ticks_per_sec: DEFAULT_MAX_TICKS_PER_SEC,
        }
    }
}

struct ActiveMotion {
    controller: MotionController,
    cancel: CancelToken,
}

pub struct Runtime<A: Actuator, S: HeadingSensor> {
    state: ControllerState<A, S>,
    config: RuntimeConfig,
    active: Option<ActiveMotion>,
    vector: Option<VectorDrive>,
    vector_received_at: Instant,
    last_request: Option<MotionRequest>,
    motion_state: MotionState,
    health: RuntimeHealth,
    sink: FrameSink,
}

impl<A: Actuator, S: HeadingSensor> Runtime<A, S> {
    pub fn new(state: ControllerState<A, S>, config: RuntimeConfig) -> Self {
        Self {
            state,
            config,
            active: None,
            vector: None,
            vector_received_at: Instant::now(),
            last_request: None,
            motion_state: MotionState::Idle,
            health: RuntimeHealth::Ok,
            sink: FrameSink::new(),
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn state(&self) -> &ControllerState<A, S> {
        &self.state
    }

    /// Stop whatever is running without reporting it as failed
    fn abandon_current(&mut self) {
        if let Some(active) = self.active.take() {
            info!("Abandoning {:?}", active.controller.request());
        }
        if self.vector.take().is_some() {
            info!("Dropping drive vector");
        }
        self.state.drive.stop();
    }

    fn start_motion(&mut self, request: MotionRequest) -> Result<(), RequestError> {
        let closed_loop_heading = matches!(
            request,
            MotionRequest::RotateAbsolute { .. } | MotionRequest::DriveVector { .. }
        );
        if closed_loop_heading && !self.state.heading.is_calibrated() {
            return Err(RequestError::ImuUncalibrated);
        }
        crate::control::validate(&request)?;

        if let MotionRequest::DriveVector { x, y, speed, slow } = request {
            if self.active.is_some() {
                self.abandon_current();
            }
            self.vector = Some(VectorDrive::start(&mut self.state, x, y, speed, slow));
            self.vector_received_at = Instant::now();
            self.last_request = Some(request);
            self.motion_state = MotionState::InProgress;
            return Ok(());
        }

        self.abandon_current();
        let cancel = CancelToken::new();
        let mut limits = MotionLimits::unbounded().with_cancel(cancel.clone());
        if let Some(deadline) = self.config.motion_deadline {
            limits = limits.with_deadline(deadline);
        }
        let controller = MotionController::start(request.clone(), &mut self.state, limits)?;
        self.active = Some(ActiveMotion { controller, cancel });
        self.last_request = Some(request);
        self.motion_state = MotionState::InProgress;
        Ok(())
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: BaseCommand) {
        info!("Received command: {:?}", &cmd);
        match cmd {
            BaseCommand::ZeroHeading => self.state.zero_heading(),
            BaseCommand::Cancel => {
                if let Some(active) = &self.active {
                    active.cancel.cancel();
                }
                if self.vector.take().is_some() {
                    self.state.drive.stop();
                    self.motion_state = MotionState::Idle;
                }
            }
            BaseCommand::Motion(request) => {
                if let Err(e) = self.start_motion(request.clone()) {
                    warn!("Rejected {:?}: {}", request, e);
                    self.abandon_current();
                    self.last_request = Some(request);
                    self.motion_state = MotionState::Rejected;
                }
            }
        }
    }

    /// One control cycle: watchdog, then advance whatever is running
    pub fn step(&mut self) -> MotionStatus {
        self.health = if self.state.heading.is_calibrated() {
            RuntimeHealth::Ok
        } else {
            RuntimeHealth::ImuUncalibrated
        };
        if let Some(g) = self.state.heading.gravity() {
            self.sink.report("gravity", json!([g.x, g.y, g.z]));
        }

        if let Some(active) = self.active.as_mut() {
            let tick = active.controller.tick(&mut self.state, &mut self.sink);
            self.motion_state = MotionState::from(tick);
            if tick != Tick::InProgress {
                self.active = None;
            }
        } else if let Some(vector) = self.vector.as_mut() {
            let age = self.vector_received_at.elapsed();
            if age > self.config.cmd_timeout {
                // Watchdog triggered - stop the robot
                warn!("Drive vector stale ({:?} old), stopping robot", age);
                self.vector = None;
                self.state.drive.stop();
                self.health = RuntimeHealth::CmdStale;
                self.motion_state = MotionState::Idle;
            } else {
                self.state.sample();
                vector.tick(&mut self.state, &mut self.sink);
                self.sink.flush();
                self.motion_state = MotionState::InProgress;
            }
        } else {
            self.state.sample();
            self.sink.flush();
        }

        MotionStatus::new(
            self.last_request.clone(),
            self.motion_state,
            self.state.heading.heading_degrees(),
            self.state.drive.positions(),
            self.state.drive.targets(),
        )
    }

    pub fn take_telemetry(&mut self) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.sink.take_frame()
    }
}

/// Control period for a loop rate; never zero
pub fn loop_period(loop_hz: u64) -> Duration {
    Duration::from_secs_f64(1.0 / loop_hz.max(1) as f64)
}

pub async fn run(config: RuntimeConfig) -> Result<(), RuntimeError> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_BASE).await?;
    let pub_status = session.declare_publisher(TOPIC_STATUS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;

    // No hardware binding ships with the runtime; drive the simulated base
    let geometry = DriveGeometry::default();
    let world = SimWorld::with_geometry(&geometry, config.sim_ticks_per_sec);
    let state = ControllerState::new(world.drive(), world.imu(), geometry);

    let loop_hz = config.loop_hz.max(1);
    let mut tick = interval(loop_period(loop_hz));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout, motion deadline {:?}",
        loop_hz,
        config.cmd_timeout.as_millis(),
        config.motion_deadline
    );
    info!("Subscribed to: {}", TOPIC_CMD_BASE);
    info!(
        "Publishing to: {}, {}, {}",
        TOPIC_STATUS, TOPIC_HEALTH, TOPIC_TELEMETRY
    );

    let mut runtime = Runtime::new(state, config);

    loop {
        tick.tick().await;
        world.step();

        // 1. Drain all pending commands (non-blocking), in arrival order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<BaseCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Advance the active motion (includes watchdog logic)
        let status = runtime.step();

        // 3. Publish status and progress
        let status_json = serde_json::to_string(&status)?;
        pub_status.put(status_json).await?;
        if let Some(frame) = runtime.take_telemetry() {
            pub_telemetry.put(serde_json::Value::Object(frame).to_string()).await?;
        }

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }
}
