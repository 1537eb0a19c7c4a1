//! # Case Store
//!
//! A cache of the last fold over each case's audit history. Reads return
//! snapshots; writes happen only through [`CaseStore::try_update`], which
//! runs the closure while holding that case's slot exclusively.
//!
//! Each case lives in its own `Arc<Mutex<Case>>` inside a `DashMap`. The
//! map shard lock is released before the case lock is taken, so a slow
//! operation on one case never stalls readers of another.

use std::sync::Arc;

use casegate_core::{Case, CaseId};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::TransitionError;

type Slot = Arc<Mutex<Case>>;

#[derive(Debug, Default)]
pub struct CaseStore {
    cases: DashMap<CaseId, Slot>,
}

impl CaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created case.
    pub(crate) fn insert(&self, case: Case) -> Result<(), TransitionError> {
        match self.cases.entry(case.case_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(TransitionError::CaseExists(case.case_id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(case)));
                Ok(())
            }
        }
    }

    /// Replace the cached value wholesale, e.g. after rebuilding it from
    /// the audit log.
    pub(crate) fn restore(&self, case: Case) {
        match self.slot(&case.case_id) {
            Some(slot) => *slot.lock() = case,
            None => {
                self.cases.insert(case.case_id, Arc::new(Mutex::new(case)));
            }
        }
    }

    /// A snapshot of the cached case.
    pub fn get(&self, case_id: &CaseId) -> Option<Case> {
        self.slot(case_id).map(|slot| slot.lock().clone())
    }

    pub fn contains(&self, case_id: &CaseId) -> bool {
        self.cases.contains_key(case_id)
    }

    pub fn case_ids(&self) -> Vec<CaseId> {
        let mut ids: Vec<CaseId> = self.cases.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run `f` with exclusive access to the case.
    ///
    /// Does not wait: if another operation holds the case, fails with
    /// [`TransitionError::ConcurrentTransitionConflict`].
    pub(crate) fn try_update<R>(
        &self,
        case_id: &CaseId,
        f: impl FnOnce(&mut Case) -> Result<R, TransitionError>,
    ) -> Result<R, TransitionError> {
        let slot = self
            .slot(case_id)
            .ok_or(TransitionError::CaseNotFound(*case_id))?;
        let mut case = slot
            .try_lock()
            .ok_or_else(|| TransitionError::ConcurrentTransitionConflict {
                case_id: *case_id,
                detail: "another operation on this case is in flight".into(),
            })?;
        f(&mut *case)
    }

    fn slot(&self, case_id: &CaseId) -> Option<Slot> {
        self.cases.get(case_id).map(|entry| Arc::clone(entry.value()))
    }
}
