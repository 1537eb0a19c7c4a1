//! # casegate-replay — Replay and Policy Simulation
//!
//! Answers "what would this case have been decided under policy X?"
//! without touching live state.
//!
//! Simulation reads only committed audit history. It takes the evidence
//! snapshot and the ensemble decision recorded with the case's automated
//! decision event, reconstructs the case as it stood just before that
//! event, and runs the rule evaluator of the alternate policy. Agents are
//! never re-run, nothing is appended, and no case lock is taken, so
//! simulation can run alongside live processing.

pub mod error;
pub mod simulation;

pub use error::ReplayError;
pub use simulation::{SimulationEngine, SimulationReport, SimulationResult};
