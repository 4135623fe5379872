pub mod config;
pub mod control;
pub mod heading;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod sim;
pub mod telemetry;
