//! # Woabot Library
//!
//! Drive a two-motor differential-drive robot with an Xbox 360 controller.
//!
//! This library provides the input-to-velocity pipeline: reading controller
//! events, normalizing and routing them into the drive state, mixing per-side
//! target velocities, and dispatching them to the motors with retry.

pub mod config;
pub mod control;
pub mod controller;
pub mod drive;
pub mod error;
pub mod logging;
pub mod motor;
pub mod shutdown;
