// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Per-owner task arena.
//!
//! Tasks live in generation-checked slots. A [`TaskKey`] names one slot at one
//! generation, so a stale key is detected with a single comparison. When a
//! task reaches a terminal state its closures are handed back to the caller to
//! drop, and the slot keeps only the outcome until it is reused.
//!
//! While the driver is resuming a task the body is "checked out": the slot
//! stays occupied but empty, so re-entrant calls from inside an action (stop,
//! schedule, destroy) never alias the running routine.

use super::{Routine, Suspension, TaskState};
use crate::clock::FrameClock;
use std::fmt::Display;

/// Generation-checked reference to a task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    index: u32,
    generation: u32,
}

impl TaskKey {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// The resumable part of a task.
pub(crate) struct TaskBody {
    pub routine: Box<dyn Routine>,
    pub suspension: Suspension,
    /// Clock snapshot taken when `suspension` was installed
    pub armed: FrameClock,
}

impl TaskBody {
    pub fn new(routine: Box<dyn Routine>, suspension: Suspension, armed: FrameClock) -> Self {
        Self {
            routine,
            suspension,
            armed,
        }
    }
}

enum SlotEntry {
    Vacant {
        retired: Option<TaskState>,
    },
    Occupied {
        state: TaskState,
        /// `None` while checked out by the driver
        body: Option<TaskBody>,
    },
}

struct Slot {
    generation: u32,
    entry: SlotEntry,
}

/// What happened to a checked-out task while the driver held it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    /// Suspension was not ready; nothing ran.
    Parked,
    /// Resumed at least once and suspended again.
    Resumed,
    /// Routine finished.
    Completed,
}

/// Result of a cancellation request.
pub(crate) enum Cancel {
    /// Key is stale or the task already reached a terminal state.
    Noop,
    /// Task was checked out; it is retired when the driver checks it back in.
    Deferred,
    /// Task was resting and has been retired; the body is returned for dropping.
    Removed(TaskBody),
}

#[derive(Default)]
pub(crate) struct TaskTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Registration order, cloned in O(1) for each pass
    order: im::Vector<TaskKey>,
    live: usize,
}

impl TaskTable {
    pub fn insert(&mut self, body: TaskBody) -> TaskKey {
        let entry = SlotEntry::Occupied {
            state: TaskState::Pending,
            body: Some(body),
        };

        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.entry = entry;
                TaskKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry,
                });
                TaskKey {
                    index,
                    generation: 0,
                }
            }
        };

        self.order.push_back(key);
        self.live += 1;
        key
    }

    /// Current state of `key`; `None` once the slot has been reused.
    pub fn state(&self, key: TaskKey) -> Option<TaskState> {
        let slot = self.slot(key)?;
        match &slot.entry {
            SlotEntry::Occupied { state, .. } => Some(*state),
            SlotEntry::Vacant { retired } => *retired,
        }
    }

    /// Number of non-terminal tasks.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Keys in registration order as of now.
    pub fn snapshot(&self) -> im::Vector<TaskKey> {
        self.order.clone()
    }

    /// Take the body out for a readiness check and possible resumption.
    pub fn checkout(&mut self, key: TaskKey) -> Option<TaskBody> {
        let slot = self.slot_mut(key)?;
        match &mut slot.entry {
            SlotEntry::Occupied { state, body } if !state.is_terminal() => body.take(),
            _ => None,
        }
    }

    /// Put a checked-out body back. Returns the body when the task is retired
    /// instead (completed, cancelled meanwhile, or the slot was torn down).
    pub fn checkin(&mut self, key: TaskKey, body: TaskBody, progress: Progress) -> Option<TaskBody> {
        let Some(slot) = self.slot_mut(key) else {
            return Some(body);
        };
        let SlotEntry::Occupied {
            state,
            body: slot_body,
        } = &mut slot.entry
        else {
            return Some(body);
        };
        if slot_body.is_some() {
            return Some(body);
        }

        // A routine that finished its last step counts as completed even if
        // that step cancelled it
        let outcome = match progress {
            Progress::Completed => TaskState::Completed,
            _ if *state == TaskState::Cancelled => TaskState::Cancelled,
            Progress::Resumed => {
                *state = TaskState::Running;
                *slot_body = Some(body);
                return None;
            }
            Progress::Parked => {
                *slot_body = Some(body);
                return None;
            }
        };

        self.retire(key, outcome);
        Some(body)
    }

    pub fn cancel(&mut self, key: TaskKey) -> Cancel {
        let Some(slot) = self.slot_mut(key) else {
            return Cancel::Noop;
        };
        match &mut slot.entry {
            SlotEntry::Occupied { state, body } if !state.is_terminal() => {
                if body.is_none() {
                    *state = TaskState::Cancelled;
                    return Cancel::Deferred;
                }
            }
            _ => return Cancel::Noop,
        }
        match self.retire(key, TaskState::Cancelled) {
            Some(body) => Cancel::Removed(body),
            None => Cancel::Noop,
        }
    }

    /// Cancel every non-terminal task, returning the resting bodies.
    pub fn cancel_all(&mut self) -> Vec<TaskBody> {
        let keys: Vec<TaskKey> = self.order.iter().copied().collect();
        keys.into_iter()
            .filter_map(|key| match self.cancel(key) {
                Cancel::Removed(body) => Some(body),
                _ => None,
            })
            .collect()
    }

    /// Drop retired keys from the registration order.
    pub fn compact(&mut self) {
        let slots = &self.slots;
        self.order.retain(|key| {
            slots.get(key.index as usize).is_some_and(|slot| {
                slot.generation == key.generation
                    && matches!(slot.entry, SlotEntry::Occupied { .. })
            })
        });
    }

    fn retire(&mut self, key: TaskKey, outcome: TaskState) -> Option<TaskBody> {
        let slot = self.slot_mut(key)?;
        let previous = std::mem::replace(
            &mut slot.entry,
            SlotEntry::Vacant {
                retired: Some(outcome),
            },
        );
        match previous {
            SlotEntry::Occupied { body, .. } => {
                self.live -= 1;
                self.free.push(key.index);
                body
            }
            vacant @ SlotEntry::Vacant { .. } => {
                slot.entry = vacant;
                None
            }
        }
    }

    fn slot(&self, key: TaskKey) -> Option<&Slot> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
    }

    fn slot_mut(&mut self, key: TaskKey) -> Option<&mut Slot> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Step;
    use crate::wait::WaitDescriptor;

    struct Idle;

    impl Routine for Idle {
        fn start(&mut self) -> Step {
            Step::wait(WaitDescriptor::next_frame())
        }

        fn resume(&mut self) -> Step {
            Step::wait(WaitDescriptor::next_frame())
        }
    }

    fn body() -> TaskBody {
        TaskBody::new(
            Box::new(Idle),
            WaitDescriptor::next_frame().into(),
            FrameClock::default(),
        )
    }

    #[test]
    fn test_insert_and_state() {
        let mut table = TaskTable::default();
        let a = table.insert(body());
        let b = table.insert(body());

        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.state(a), Some(TaskState::Pending));
        assert_eq!(table.snapshot().iter().copied().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_checkout_checkin_cycle() {
        let mut table = TaskTable::default();
        let key = table.insert(body());

        let taken = table.checkout(key).unwrap();
        // Can't check out twice
        assert!(table.checkout(key).is_none());

        // Not ready yet: still pending
        assert!(table.checkin(key, taken, Progress::Parked).is_none());
        assert_eq!(table.state(key), Some(TaskState::Pending));

        let taken = table.checkout(key).unwrap();
        assert!(table.checkin(key, taken, Progress::Resumed).is_none());
        assert_eq!(table.state(key), Some(TaskState::Running));

        let taken = table.checkout(key).unwrap();
        assert!(table.checkin(key, taken, Progress::Completed).is_some());
        assert_eq!(table.state(key), Some(TaskState::Completed));
        assert!(table.is_empty());
    }

    #[test]
    fn test_cancel_resting_task_removes_body() {
        let mut table = TaskTable::default();
        let key = table.insert(body());

        assert!(matches!(table.cancel(key), Cancel::Removed(_)));
        assert_eq!(table.state(key), Some(TaskState::Cancelled));
        // Second cancel is a no-op
        assert!(matches!(table.cancel(key), Cancel::Noop));
        assert!(table.checkout(key).is_none());
    }

    #[test]
    fn test_cancel_checked_out_task_is_deferred() {
        let mut table = TaskTable::default();
        let key = table.insert(body());

        let taken = table.checkout(key).unwrap();
        assert!(matches!(table.cancel(key), Cancel::Deferred));
        assert_eq!(table.state(key), Some(TaskState::Cancelled));
        assert_eq!(table.len(), 1);

        // Checkin retires it even though the routine did not complete
        assert!(table.checkin(key, taken, Progress::Resumed).is_some());
        assert_eq!(table.state(key), Some(TaskState::Cancelled));
        assert!(table.is_empty());
    }

    #[test]
    fn test_completion_wins_over_cancel_during_last_step() {
        let mut table = TaskTable::default();
        let key = table.insert(body());

        let taken = table.checkout(key).unwrap();
        assert!(matches!(table.cancel(key), Cancel::Deferred));
        assert!(table.checkin(key, taken, Progress::Completed).is_some());
        assert_eq!(table.state(key), Some(TaskState::Completed));
    }

    #[test]
    fn test_slot_reuse_invalidates_old_key() {
        let mut table = TaskTable::default();
        let old = table.insert(body());
        let _ = table.cancel(old);

        let new = table.insert(body());
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());

        assert_eq!(table.state(old), None);
        assert!(matches!(table.cancel(old), Cancel::Noop));
        assert_eq!(table.state(new), Some(TaskState::Pending));
    }

    #[test]
    fn test_cancel_all_and_compact() {
        let mut table = TaskTable::default();
        let a = table.insert(body());
        let b = table.insert(body());
        let c = table.insert(body());
        let in_flight = table.checkout(b).unwrap();

        let dropped = table.cancel_all();
        assert_eq!(dropped.len(), 2);
        assert_eq!(table.state(a), Some(TaskState::Cancelled));
        assert_eq!(table.state(b), Some(TaskState::Cancelled));
        assert_eq!(table.state(c), Some(TaskState::Cancelled));

        assert!(table.checkin(b, in_flight, Progress::Parked).is_some());
        table.compact();
        assert!(table.snapshot().is_empty());
        assert!(table.is_empty());
    }
}
