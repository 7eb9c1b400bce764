//! Frame-stepped flocking simulation: agents perceive neighbors inside a field of
//! view, match velocity with close flockmates, diverge along distant ones, jitter
//! away from projected collisions, and bounce off a bounded volume.
//!
//! Every frame is decided from a frozen snapshot and committed afterwards; see
//! [`flock::advance_frame`].

pub mod agent;
pub mod config;
pub mod flock;
pub mod spatial;

pub use agent::{Agent, Motion, Perception};
pub use config::{BoundaryShape, FlockConfig, NeighborSearch, SimConfigError};
pub use flock::{advance_frame, spawn, Flock};
