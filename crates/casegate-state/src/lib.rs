//! # casegate-state — Case Store, Transition Controller, Decision Pipeline
//!
//! The [`TransitionController`] is the only component allowed to change a
//! case. Every change it makes is an audit event first: the event is
//! appended, and the cached [`Case`](casegate_core::Case) in the
//! [`CaseStore`] is then advanced by folding that same event. A failed
//! append leaves the cache untouched, so the cache can never run ahead of
//! the log.
//!
//! ## Concurrency
//!
//! At most one controller operation is in flight per case. The case slot
//! is taken with a non-blocking lock; a second operation racing for the
//! same case fails with
//! [`TransitionError::ConcurrentTransitionConflict`] and may retry against
//! the refreshed case. Different cases never contend.
//!
//! ## Pipeline
//!
//! ```text
//! submitted ─▶ processing ─▶ agents (fan-out, SLA-bounded)
//!                              │
//!                              ▼
//!                       EnsembleEngine ─▶ RuleEvaluator ─▶ transition
//!                                              │
//!                               no rule match  └─▶ case.processing_failed ─▶ review state
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod store;

pub use config::EngineConfig;
pub use controller::{NewCase, TransitionController, TransitionRequest};
pub use error::{PipelineError, TransitionError};
pub use pipeline::{execution_target, DecisionPipeline, ProcessingOutcome, ReviewAssignment};
pub use store::CaseStore;
