//! # Event Hash Chain
//!
//! ```text
//! digest = SHA256(JCS(event with the `digest` key removed))
//! event[n].prev_digest == event[n-1].digest
//! ```

use casegate_core::{sha256_digest, CanonicalBytes, ContentDigest};

use crate::error::AuditError;
use crate::event::AuditEvent;

/// Compute the digest an event must carry.
///
/// The current value of `event.digest` does not affect the result.
pub fn compute_digest(event: &AuditEvent) -> Result<ContentDigest, AuditError> {
    let mut value = serde_json::to_value(event).map_err(|e| AuditError::Digest(e.to_string()))?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| AuditError::Digest("audit event did not serialize to an object".into()))?;
    obj.remove("digest");
    let canonical = CanonicalBytes::new(&value)?;
    Ok(sha256_digest(&canonical))
}

/// Verify sequence numbering, timestamp order, chain links, and digests of
/// one case's events.
pub fn verify_events(events: &[AuditEvent]) -> Result<(), AuditError> {
    let mut previous: Option<&AuditEvent> = None;
    for (idx, event) in events.iter().enumerate() {
        let broken = |reason: String| AuditError::ChainBroken {
            case_id: event.case_id,
            sequence: event.sequence,
            reason,
        };
        let expected_sequence = idx as u64 + 1;
        if event.sequence != expected_sequence {
            return Err(broken(format!("expected sequence #{expected_sequence}")));
        }
        if let Some(prev) = previous {
            if prev.case_id != event.case_id {
                return Err(broken(format!("event belongs to {}", event.case_id)));
            }
            if event.timestamp < prev.timestamp {
                return Err(broken("timestamp precedes previous event".into()));
            }
        }
        let expected_prev = previous.map(|p| p.digest);
        if event.prev_digest != expected_prev {
            return Err(broken("prev_digest does not match previous event".into()));
        }
        let recomputed = compute_digest(event)?;
        if recomputed != event.digest {
            return Err(broken(format!(
                "digest mismatch: recorded {}, recomputed {recomputed}",
                event.digest
            )));
        }
        previous = Some(event);
    }
    Ok(())
}
