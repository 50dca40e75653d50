//! Encoder invocation

pub mod handbrake;

pub use handbrake::{build_handbrake_command, run_handbrake, EncodeError, HandBrakeParams};
