//! # casegate-policy — Policy Rule Evaluator and State-Machine Definitions
//!
//! A policy is a versioned, declarative document for one business vertical:
//! a voting-strategy block, ordered rules, and the legal transition graph.
//!
//! ## Lifecycle
//!
//! ```text
//! YAML/JSON ──▶ Policy ──validate──▶ ValidatedPolicy ──register──▶ PolicyRegistry
//!                                         │
//!                                         └── RuleEvaluator (first match by priority)
//! ```
//!
//! Conditions are parsed into an expression tree when a policy is
//! validated, so a malformed condition is rejected before the policy can
//! be registered or activated. Evaluation only ever runs against a
//! [`ValidatedPolicy`].
//!
//! ## Condition Language
//!
//! ```text
//! compliance.sanctions_screening.status == 'hit'
//! ensemble.confidence > 0.95 AND ensemble.risk_score < 20
//! (ensemble.action == 'approve' OR case.priority == 'urgent') AND ensemble.risk_flags.empty()
//! *
//! ```
//!
//! See [`condition`] for the full grammar and semantics.

pub mod condition;
pub mod diff;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod registry;
pub mod state_machine;
pub mod validated;

pub use condition::{Condition, Expr};
pub use diff::{PolicyDiff, RuleChange};
pub use error::{ConditionParseError, EvaluationError, PolicyError};
pub use evaluator::{EvaluationContext, RuleEvaluator, RuleMatch};
pub use policy::{Policy, PolicyRule};
pub use registry::PolicyRegistry;
pub use state_machine::{StateMachineDefinition, TransitionDenial, TransitionRule};
pub use validated::{CompiledRule, ValidatedPolicy};
