//! Snapshot based undo for the mask of the active frame.
//!
//! A snapshot is taken before the first destructive edit of a session. A
//! session lasts from the first edit of a gesture until the pointer is
//! released, so one undo reverts a whole brush drag at once. Snapshots belong
//! to the frame they were taken from, navigation drops them.

use std::{collections::VecDeque, num::NonZeroUsize};

use log::debug;

use crate::{LabelMask, MaskError};

#[derive(Debug, Default, Clone)]
pub struct EditHistory {
    snapshots: VecDeque<LabelMask>,
    recorded: bool,
    limit: Option<NonZeroUsize>,
}

impl EditHistory {
    /// History which keeps at most `limit` snapshots, discarding the oldest first
    pub fn with_limit(limit: NonZeroUsize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    /// Whether the next edit of the session has to be recorded
    pub fn needs_snapshot(&self) -> bool {
        !self.recorded
    }

    /// Stores `snapshot`, the mask as it was before the first edit of the
    /// session
    pub fn push(&mut self, snapshot: LabelMask) {
        if let Some(limit) = self.limit
            && self.snapshots.len() >= limit.get()
        {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
        self.recorded = true;
    }

    /// Stores a copy of `mask` unless the current session already did.
    /// Returns whether a snapshot was taken.
    pub fn record_if_first(&mut self, mask: &LabelMask) -> bool {
        if !self.needs_snapshot() {
            return false;
        }
        self.push(mask.clone());
        true
    }

    /// Restores the latest snapshot into `mask`
    pub fn undo(&mut self, mask: &mut LabelMask) -> Result<(), MaskError> {
        let snapshot = self.snapshots.back().ok_or(MaskError::NothingToUndo)?;
        mask.copy_from(snapshot)?;
        self.snapshots.pop_back();
        self.recorded = false;
        debug!("Undo, {} snapshots left", self.snapshots.len());
        Ok(())
    }

    /// Ends the current session, the next edit records a new snapshot
    pub fn end_session(&mut self) {
        self.recorded = false;
    }

    /// Forgets all snapshots
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.recorded = false;
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.is_empty()
    }
}
