//! # casegate-audit — Audit Event Store
//!
//! The append-only ledger that is the single source of truth for case
//! history. The case store elsewhere is only a cache of the last fold over
//! this log.
//!
//! ## Guarantees
//!
//! - **Per-case total order.** Every append names the sequence number it
//!   expects to receive. A stale expectation fails with
//!   [`AuditError::SequenceConflict`] instead of being reordered.
//! - **Monotonic time.** An event may not be timestamped before its
//!   predecessor.
//! - **Tamper evidence.** Each event carries `prev_digest` (the previous
//!   event's digest) and `digest = SHA256(JCS(event without digest))`,
//!   following the receipt-chain construction.
//! - **Reconstruction.** [`reconstruct_state`] folds `case.created` and
//!   `state.transition` events, up to an optional cutoff, into a [`Case`].
//!
//! [`Case`]: casegate_core::Case

pub mod chain;
pub mod error;
pub mod event;
pub mod projection;
pub mod store;

pub use chain::{compute_digest, verify_events};
pub use error::AuditError;
pub use event::{AuditEvent, AuditEventDraft, AuditEventType, StateTransition};
pub use projection::{apply_event, created_case, reconstruct_state};
pub use store::{AuditStore, InMemoryAuditStore};
