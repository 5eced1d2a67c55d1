//! Delayed action sequences.
//!
//! `EXECUTE_SEQUENCE_AFTER_DELAY` and `EXECUTE_SEQUENCE_OVER_PERIOD` do not
//! suspend anything. They store a [`DelayedSequence`] record keyed by due
//! time, and the tick loop runs every record that has come due.

use std::collections::BTreeMap;

use crate::ids::{ObjectId, SequenceId};
use crate::math::GameTime;

/// A sequence waiting to run.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedSequence {
    /// Sequence to run.
    pub sequence: SequenceId,
    /// Object that scheduled it; bound as the sequence executor.
    pub executor: Option<ObjectId>,
    /// Objects to run the sequence as, in order.
    pub selves: Vec<ObjectId>,
}

/// Time-ordered queue of delayed sequences.
///
/// Records due at the same time run in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BTreeMap<(GameTime, u64), DelayedSequence>,
    next_seq: u64,
}

impl Scheduler {
    /// Queue a record to run at `due`.
    pub fn schedule(&mut self, due: GameTime, record: DelayedSequence) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert((due, seq), record);
    }

    /// Remove and return the earliest record due at or before `now`.
    pub fn pop_due(&mut self, now: GameTime) -> Option<(GameTime, DelayedSequence)> {
        let (&(due, seq), _) = self.queue.first_key_value()?;
        if due > now {
            return None;
        }
        self.queue.remove(&(due, seq)).map(|record| (due, record))
    }

    /// Whether any record is due at or before `now`.
    #[must_use]
    pub fn has_due(&self, now: GameTime) -> bool {
        self.queue
            .first_key_value()
            .is_some_and(|((due, _), _)| *due <= now)
    }

    /// Number of pending records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
