//! # State Reconstruction
//!
//! Folds a case's ordered events into a [`Case`] snapshot. This is the
//! only sanctioned way to derive historical state.
//!
//! | Event | Effect |
//! |---|---|
//! | `case.created` | initialises the case in `draft` |
//! | `state.transition` | sets `status`, and `sla_deadline` from the event metadata |
//! | anything else | no state change |
//!
//! Every event advances `version` and `updated_at`.

use std::collections::BTreeMap;

use casegate_core::{Case, CasePriority, CaseStatus, Timestamp};
use serde_json::Value;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType};

/// Metadata keys understood by the fold.
pub mod keys {
    pub const VERTICAL: &str = "vertical";
    pub const PRIORITY: &str = "priority";
    pub const CASE_METADATA: &str = "case_metadata";
    pub const SLA_DEADLINE: &str = "sla_deadline";
}

/// Fold `events` (already ordered) into a case, ignoring events after
/// `as_of`. Returns `None` if no `case.created` event falls inside the
/// window.
pub fn reconstruct_state(
    events: &[AuditEvent],
    as_of: Option<Timestamp>,
) -> Result<Option<Case>, AuditError> {
    let mut case: Option<Case> = None;

    for event in events {
        if as_of.is_some_and(|cutoff| event.timestamp > cutoff) {
            break;
        }
        match case.as_mut() {
            None if event.event_type == AuditEventType::CaseCreated => {
                case = Some(created(event).map_err(|reason| corrupt(event, reason))?);
            }
            None if event.event_type == AuditEventType::StateTransition => {
                return Err(corrupt(event, "transition before case.created".into()));
            }
            None => {}
            Some(current) => apply_event(current, event)?,
        }
    }
    Ok(case)
}

/// Fold one event onto an existing case.
///
/// The case store calls this after every committed append so its cached
/// value is exactly what [`reconstruct_state`] would produce.
pub fn apply_event(case: &mut Case, event: &AuditEvent) -> Result<(), AuditError> {
    match event.event_type {
        AuditEventType::CaseCreated => {
            return Err(corrupt(event, "case created twice".into()));
        }
        AuditEventType::StateTransition => {
            let transition = event
                .transition
                .ok_or_else(|| corrupt(event, "transition event without from/to".into()))?;
            if transition.from_state != case.status {
                return Err(corrupt(
                    event,
                    format!(
                        "transition from '{}' but case is in '{}'",
                        transition.from_state, case.status
                    ),
                ));
            }
            case.status = transition.to_state;
            case.sla_deadline = if transition.to_state.is_terminal() {
                None
            } else {
                sla_deadline(&event.metadata).map_err(|reason| corrupt(event, reason))?
            };
        }
        AuditEventType::TransitionRejected | AuditEventType::ProcessingFailed => {}
    }
    case.updated_at = event.timestamp;
    case.version = event.sequence;
    Ok(())
}

fn corrupt(event: &AuditEvent, reason: String) -> AuditError {
    AuditError::CorruptHistory {
        case_id: event.case_id,
        sequence: event.sequence,
        reason,
    }
}

/// Build the initial case from its `case.created` event.
pub fn created_case(event: &AuditEvent) -> Result<Case, AuditError> {
    created(event).map_err(|reason| corrupt(event, reason))
}

fn created(event: &AuditEvent) -> Result<Case, String> {
    let vertical = event
        .metadata
        .get(keys::VERTICAL)
        .and_then(Value::as_str)
        .ok_or("case.created without a vertical")?
        .to_string();
    let priority: CasePriority = match event.metadata.get(keys::PRIORITY) {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| format!("bad priority: {e}"))?,
        None => CasePriority::default(),
    };
    let metadata: BTreeMap<String, Value> = match event.metadata.get(keys::CASE_METADATA) {
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        Some(_) => return Err("case_metadata must be an object".into()),
        None => BTreeMap::new(),
    };
    Ok(Case {
        case_id: event.case_id,
        vertical,
        status: CaseStatus::Draft,
        priority,
        policy_version: event.policy_version.clone(),
        sla_deadline: None,
        metadata,
        created_at: event.timestamp,
        updated_at: event.timestamp,
        version: event.sequence,
    })
}

fn sla_deadline(metadata: &BTreeMap<String, Value>) -> Result<Option<Timestamp>, String> {
    match metadata.get(keys::SLA_DEADLINE) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Timestamp::parse(s)
            .map(Some)
            .map_err(|e| format!("bad sla_deadline: {e}")),
        Some(_) => Err("sla_deadline must be a string".into()),
    }
}
