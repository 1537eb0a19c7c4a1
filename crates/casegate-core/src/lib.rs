//! # casegate-core — Foundational Types for the Decision Core
//!
//! Every other crate in the workspace depends on `casegate-core`; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** `CaseId`, `EventId`, `EnsembleId`, `PolicyId`
//!    are distinct types. No bare strings or UUIDs cross crate boundaries.
//!
//! 2. **One severity order.** [`ActionType::severity`] is the only place the
//!    `reject > escalate > manual_review > request_more_info > approve`
//!    ordering is written down. Voting tie-breaks and floors all go
//!    through it.
//!
//! 3. **Tagged states, centralized matching.** [`CaseStatus`] is a closed
//!    enum of concrete states. Dotted names exist only at the serde and
//!    display boundary. [`StatePattern::matches`] is the single routine
//!    that understands `X.*` and `*`.
//!
//! 4. **UTC-only timestamps behind a clock.** [`Timestamp`] is UTC with
//!    millisecond precision; all "now" reads go through a [`Clock`] so
//!    SLA and replay tests can pin time.
//!
//! 5. **Canonical digests.** Audit digests are computed only from
//!    [`CanonicalBytes`] (RFC 8785 JSON).
//!
//! ## Crate Policy
//!
//! - No dependencies on other `casegate-*` crates.
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod action;
pub mod actor;
pub mod canonical;
pub mod case;
pub mod digest;
pub mod error;
pub mod evidence;
pub mod identity;
pub mod status;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use action::ActionType;
pub use actor::{Actor, ActorType};
pub use canonical::CanonicalBytes;
pub use case::{Case, CasePriority};
pub use digest::{sha256_digest, ContentDigest};
pub use error::CoreError;
pub use evidence::EvidenceSnapshot;
pub use identity::{CaseId, EnsembleId, EventId, PolicyId};
pub use status::{CaseStatus, ReviewStage, StatePattern};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
