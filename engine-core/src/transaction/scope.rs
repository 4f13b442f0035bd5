//! `TransactionScope`: stages an operation list, commits or rolls it back
//! (spec §4.8).

use std::collections::HashSet;

use crate::errors::TransactionError;
use crate::ids::Id;

use super::operations::{execute_operation, rollback_operation, Operation, OperationContext};

/// Related-object cap from spec §4.8: exceeding it fails hard rather than
/// growing the dependency-tracking set unbounded.
pub const MAX_RELATED_OBJECTS: usize = 10;

/// Owns the operation list and stage-boundary checkpoints produced while
/// processing one event. Reused via the [`super::scope_pool::ScopePool`]
/// rather than allocated per event on the hot path.
#[derive(Default)]
pub struct TransactionScope {
    operations: Vec<Operation>,
    stage_boundaries: Vec<usize>,
}

impl TransactionScope {
    pub fn new() -> Self {
        TransactionScope::default()
    }

    pub fn push(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Records a checkpoint at the current operation count.
    pub fn start_new_stage(&mut self) -> usize {
        let checkpoint = self.operations.len();
        self.stage_boundaries.push(checkpoint);
        checkpoint
    }

    /// Drops every operation appended since `stage_id` was recorded.
    pub fn remove_stage(&mut self, stage_id: usize) {
        if let Some(pos) = self.stage_boundaries.iter().position(|&b| b == stage_id) {
            self.stage_boundaries.truncate(pos);
        }
        self.operations.truncate(stage_id);
    }

    /// Clears operations and stage boundaries, preserving allocated
    /// capacity so the scope can be reused from the pool.
    pub fn reset(&mut self) {
        self.operations.clear();
        self.stage_boundaries.clear();
    }

    /// The union of every touched id, capped at [`MAX_RELATED_OBJECTS`].
    pub fn related_objects(&self) -> Result<HashSet<Id>, TransactionError> {
        let mut ids = HashSet::new();
        for op in &self.operations {
            for id in op.touched_ids() {
                ids.insert(id);
                if ids.len() > MAX_RELATED_OBJECTS {
                    return Err(TransactionError::TooManyRelatedObjects { cap: MAX_RELATED_OBJECTS });
                }
            }
        }
        Ok(ids)
    }

    /// Runs every operation in append order. On failure at index `k`, rolls
    /// back operations `k, k-1, …, 0` in reverse and returns the triggering
    /// error.
    pub fn execute_transaction(&self, ctx: &mut OperationContext<'_>) -> Result<(), TransactionError> {
        for (index, op) in self.operations.iter().enumerate() {
            if let Err(err) = execute_operation(op, ctx) {
                for prior in self.operations[..index].iter().rev() {
                    rollback_operation(prior, ctx);
                }
                return Err(err);
            }
        }
        Ok(())
    }
}
