//! Discrete-event simulation of emergency department patient flow.
//!
//! Patients arrive as a Poisson process and are split between a fast-track
//! stream and a main stream of beds, providers and lab technicians. The run
//! is driven by a single event clock; patients are ECS entities resumed by
//! events, and every random draw comes from one seeded stream.

pub mod clock;
pub mod config;
pub mod distributions;
pub mod error;
pub mod patient;
pub mod pool;
pub mod profiling;
pub mod runner;
pub mod simulation;
pub mod stats;
pub mod systems;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::{ResourceCapacities, SimulationConfig};
pub use error::{ConfigurationError, InvariantViolation, SimulationError};
pub use simulation::{run_simulation, Simulation};
pub use stats::SimStats;
