//! # Drive Module
//!
//! Operator intent and how it becomes motor targets.
//!
//! This module handles:
//! - The drive state mutated by controller events
//! - Routing logical controls to state mutations
//! - Mixing the state into left/right target velocities

pub mod mixer;
pub mod router;
pub mod state;
