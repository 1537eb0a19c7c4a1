//! # Audit Store
//!
//! [`AuditStore`] is the persistence seam; [`InMemoryAuditStore`] is the
//! reference implementation. Appends are serialized per case, never
//! globally: each case owns its own mutex-guarded log inside a `DashMap`,
//! and the shard lock is released before the case lock is taken.

use std::sync::Arc;

use casegate_core::{Case, CaseId, ContentDigest, EventId, Timestamp};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::chain::{compute_digest, verify_events};
use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventDraft};
use crate::projection;

/// Append-only per-case event ledger.
pub trait AuditStore: Send + Sync {
    /// Commit `draft` as event number `expected_sequence` of its case.
    ///
    /// Fails with [`AuditError::SequenceConflict`] if the case log is not
    /// exactly at `expected_sequence - 1`, and with
    /// [`AuditError::OutOfOrderTimestamp`] if the draft predates the last
    /// event.
    fn append(
        &self,
        draft: AuditEventDraft,
        expected_sequence: u64,
    ) -> Result<AuditEvent, AuditError>;

    /// All events of a case ordered by (timestamp, sequence). Empty if the
    /// case is unknown.
    fn case_history(&self, case_id: &CaseId) -> Result<Vec<AuditEvent>, AuditError>;

    /// Every case with at least one event.
    fn case_ids(&self) -> Vec<CaseId>;

    /// Fold the history into the case state as of `as_of` (or now).
    fn reconstruct_state(
        &self,
        case_id: &CaseId,
        as_of: Option<Timestamp>,
    ) -> Result<Case, AuditError> {
        let history = self.case_history(case_id)?;
        projection::reconstruct_state(&history, as_of)?
            .ok_or(AuditError::CaseNotFound(*case_id))
    }

    /// Verify the hash chain of a case.
    fn verify_chain(&self, case_id: &CaseId) -> Result<(), AuditError> {
        let history = self.case_history(case_id)?;
        if history.is_empty() {
            return Err(AuditError::CaseNotFound(*case_id));
        }
        verify_events(&history)
    }
}

impl<S: AuditStore + ?Sized> AuditStore for Arc<S> {
    fn append(
        &self,
        draft: AuditEventDraft,
        expected_sequence: u64,
    ) -> Result<AuditEvent, AuditError> {
        (**self).append(draft, expected_sequence)
    }

    fn case_history(&self, case_id: &CaseId) -> Result<Vec<AuditEvent>, AuditError> {
        (**self).case_history(case_id)
    }

    fn case_ids(&self) -> Vec<CaseId> {
        (**self).case_ids()
    }
}

type CaseLog = Arc<Mutex<Vec<AuditEvent>>>;

/// In-process audit store.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    logs: DashMap<CaseId, CaseLog>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn log_for(&self, case_id: CaseId) -> CaseLog {
        // Clone the Arc so the shard lock is dropped before locking the log.
        Arc::clone(self.logs.entry(case_id).or_default().value())
    }

    /// Load previously exported events, verifying each case's chain.
    ///
    /// Cases already present in the store are rejected.
    pub fn import(&self, events: Vec<AuditEvent>) -> Result<usize, AuditError> {
        let mut by_case: std::collections::BTreeMap<CaseId, Vec<AuditEvent>> = Default::default();
        for event in events {
            by_case.entry(event.case_id).or_default().push(event);
        }
        let mut imported = 0;
        for (case_id, mut events) in by_case {
            events.sort_by_key(|e| e.sequence);
            verify_events(&events)?;
            let log = self.log_for(case_id);
            let mut guard = log.lock();
            if !guard.is_empty() {
                return Err(AuditError::SequenceConflict {
                    case_id,
                    expected: 1,
                    current: guard.len() as u64,
                });
            }
            imported += events.len();
            *guard = events;
        }
        Ok(imported)
    }

    /// Every event in the store, grouped by case.
    pub fn export(&self) -> Vec<AuditEvent> {
        let mut case_ids = self.case_ids();
        case_ids.sort();
        case_ids
            .iter()
            .filter_map(|id| self.logs.get(id).map(|log| Arc::clone(log.value())))
            .flat_map(|log| log.lock().clone())
            .collect()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(
        &self,
        draft: AuditEventDraft,
        expected_sequence: u64,
    ) -> Result<AuditEvent, AuditError> {
        let case_id = draft.case_id;
        let log = self.log_for(case_id);
        let mut events = log.lock();

        let current = events.len() as u64;
        if expected_sequence != current + 1 {
            tracing::warn!(
                case_id = %case_id,
                expected_sequence,
                current,
                "audit append lost a race"
            );
            return Err(AuditError::SequenceConflict {
                case_id,
                expected: expected_sequence,
                current,
            });
        }
        let last = events.last();
        if let Some(last) = last {
            if draft.timestamp < last.timestamp {
                return Err(AuditError::OutOfOrderTimestamp {
                    case_id,
                    last: last.timestamp,
                    attempted: draft.timestamp,
                });
            }
        }

        let mut event = AuditEvent {
            event_id: EventId::new(),
            case_id,
            sequence: expected_sequence,
            timestamp: draft.timestamp,
            event_type: draft.event_type,
            actor: draft.actor,
            transition: draft.transition,
            reasoning: draft.reasoning,
            evidence_snapshot: draft.evidence_snapshot,
            agent_recommendation: draft.agent_recommendation,
            policy_version: draft.policy_version,
            policy_rule_matched: draft.policy_rule_matched,
            metadata: draft.metadata,
            prev_digest: last.map(|e| e.digest),
            digest: ContentDigest::default(),
        };
        event.digest = compute_digest(&event)?;
        events.push(event.clone());

        tracing::debug!(
            case_id = %case_id,
            sequence = event.sequence,
            event_type = %event.event_type,
            "audit event appended"
        );
        Ok(event)
    }

    fn case_history(&self, case_id: &CaseId) -> Result<Vec<AuditEvent>, AuditError> {
        let Some(log) = self.logs.get(case_id).map(|l| Arc::clone(l.value())) else {
            return Ok(Vec::new());
        };
        let mut events = log.lock().clone();
        events.sort_by_key(|e| (e.timestamp, e.sequence));
        Ok(events)
    }

    fn case_ids(&self) -> Vec<CaseId> {
        self.logs
            .iter()
            .filter(|entry| !entry.value().lock().is_empty())
            .map(|entry| *entry.key())
            .collect()
    }
}
