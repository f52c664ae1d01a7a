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

//! Owners: lifetime scopes that hold and drive scheduled tasks.

use super::TaskHandle;
use crate::clock::{FrameClock, Phase};
use crate::error::{Result, SchedulerError};
use crate::task::table::{Cancel, Progress, TaskBody, TaskTable};
use crate::task::{Routine, Step, TaskKey, TaskState};
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Display};
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

pub(crate) struct OwnerCore {
    id: OwnerId,
    name: String,
    alive: Cell<bool>,
    /// Survives `Scheduler::transition`
    persistent: Cell<bool>,
    /// Left out of owner listings
    hidden: Cell<bool>,
    tasks: RefCell<TaskTable>,
    clock: Rc<Cell<FrameClock>>,
}

impl OwnerCore {
    pub(crate) fn id(&self) -> OwnerId {
        self.id
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub(crate) fn is_persistent(&self) -> bool {
        self.persistent.get()
    }

    pub(crate) fn state_of(&self, key: TaskKey) -> Option<TaskState> {
        self.tasks.borrow().state(key)
    }

    pub(crate) fn cancel(&self, key: TaskKey) {
        let outcome = self.tasks.borrow_mut().cancel(key);
        match outcome {
            Cancel::Removed(body) => {
                trace!(owner = %self.id, task = %key, routine = body.routine.name(), "task cancelled");
                // Closures are dropped here, outside the table borrow
                drop(body);
            }
            Cancel::Deferred => {
                trace!(owner = %self.id, task = %key, "task cancelled while running");
            }
            Cancel::Noop => {}
        }
    }
}

/// A lifetime scope for scheduled tasks.
///
/// Cloning an `Owner` is cheap and yields another reference to the same
/// scope. Destroying the owner cancels every task bound to it; tasks are also
/// dropped when the last `Owner` reference goes away.
#[derive(Clone)]
pub struct Owner {
    core: Rc<OwnerCore>,
}

impl Owner {
    pub(crate) fn new(id: OwnerId, name: String, clock: Rc<Cell<FrameClock>>) -> Self {
        Self {
            core: Rc::new(OwnerCore {
                id,
                name,
                alive: Cell::new(true),
                persistent: Cell::new(false),
                hidden: Cell::new(false),
                tasks: RefCell::new(TaskTable::default()),
                clock,
            }),
        }
    }

    pub(crate) fn from_core(core: Rc<OwnerCore>) -> Self {
        Self { core }
    }

    pub(crate) fn downgrade(&self) -> Weak<OwnerCore> {
        Rc::downgrade(&self.core)
    }

    pub fn id(&self) -> OwnerId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn is_alive(&self) -> bool {
        self.core.is_alive()
    }

    pub fn is_persistent(&self) -> bool {
        self.core.is_persistent()
    }

    /// Keep this owner alive across scene/context transitions.
    pub fn mark_persistent(&self) {
        self.core.persistent.set(true);
    }

    pub fn is_hidden(&self) -> bool {
        self.core.hidden.get()
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.core.hidden.set(hidden);
    }

    /// Number of tasks that have not yet completed or been cancelled.
    pub fn active_tasks(&self) -> usize {
        self.core.tasks.borrow().len()
    }

    /// Schedule a routine, failing if the owner has been destroyed.
    ///
    /// A routine whose `start` reports completion is never registered and
    /// yields an empty handle.
    pub fn try_spawn<R: Routine + 'static>(&self, routine: R) -> Result<TaskHandle> {
        if !self.is_alive() {
            return Err(SchedulerError::OwnerDestroyed {
                id: self.core.id,
                name: self.core.name.clone(),
            });
        }

        let mut routine: Box<dyn Routine> = Box::new(routine);
        let name = routine.name();
        match routine.start() {
            Step::Complete => {
                trace!(owner = %self.core.id, routine = name, "routine finished before scheduling");
                Ok(TaskHandle::empty())
            }
            Step::Suspend(suspension) => {
                let armed = self.core.clock.get();
                let body = TaskBody::new(routine, suspension, armed);
                let key = self.core.tasks.borrow_mut().insert(body);
                trace!(owner = %self.core.id, task = %key, routine = name, "task scheduled");
                Ok(TaskHandle::new(&self.core, key))
            }
        }
    }

    /// Schedule a routine. Requests against a destroyed owner are dropped and
    /// return an empty handle.
    pub fn spawn<R: Routine + 'static>(&self, routine: R) -> TaskHandle {
        self.try_spawn(routine).unwrap_or_else(|err| {
            debug!(owner = %self.core.id, %err, "dropping schedule request");
            TaskHandle::empty()
        })
    }

    /// Whether `handle` refers to a task of this owner.
    pub fn owns(&self, handle: &TaskHandle) -> bool {
        handle.belongs_to(&self.core)
    }

    /// Cancel `handle` if it belongs to this owner. Never fails.
    pub fn stop(&self, handle: &TaskHandle) {
        if self.owns(handle) {
            handle.cancel();
        } else if !handle.is_empty() {
            trace!(owner = %self.core.id, ?handle, "ignoring handle of another owner");
        }
    }

    /// Cancel `handle` if it belongs to this owner, then clear it either way.
    pub fn try_stop(&self, handle: &mut TaskHandle) {
        self.stop(handle);
        *handle = TaskHandle::empty();
    }

    /// Cancel every task and refuse new ones. Idempotent.
    pub fn destroy(&self) {
        if !self.core.alive.replace(false) {
            return;
        }
        let dropped = self.core.tasks.borrow_mut().cancel_all();
        debug!(
            owner = %self.core.id,
            name = %self.core.name,
            cancelled = dropped.len(),
            "owner destroyed"
        );
        drop(dropped);
    }

    /// Resume every task of this owner whose suspension is satisfied in
    /// `phase`. Returns the number of resumptions.
    pub(crate) fn run_pass(&self, phase: Phase) -> usize {
        if !self.is_alive() {
            return 0;
        }

        // Tasks registered during this pass are not part of the snapshot
        let keys = self.core.tasks.borrow().snapshot();
        let mut resumed = 0;

        for key in keys.iter().copied() {
            if !self.is_alive() {
                break;
            }
            let Some(mut body) = self.core.tasks.borrow_mut().checkout(key) else {
                continue;
            };

            let progress = self.drive(key, &mut body, phase, &mut resumed);

            let retired = self.core.tasks.borrow_mut().checkin(key, body, progress);
            if let Some(body) = retired {
                trace!(
                    owner = %self.core.id,
                    task = %key,
                    routine = body.routine.name(),
                    state = ?self.core.state_of(key),
                    "task retired"
                );
                drop(body);
            }
        }

        self.core.tasks.borrow_mut().compact();
        resumed
    }

    fn drive(&self, key: TaskKey, body: &mut TaskBody, phase: Phase, resumed: &mut usize) -> Progress {
        let mut progress = Progress::Parked;
        loop {
            let now = self.core.clock.get();
            if !body.suspension.is_ready(phase, &body.armed, &now) {
                return progress;
            }

            *resumed += 1;
            match body.routine.resume() {
                Step::Complete => return Progress::Completed,
                Step::Suspend(next) => {
                    body.suspension = next;
                    body.armed = self.core.clock.get();
                    progress = Progress::Resumed;
                }
            }

            // An action may have stopped its own task or torn down the owner
            if !self.is_alive() || self.core.state_of(key) == Some(TaskState::Cancelled) {
                return progress;
            }
        }
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for Owner {}

impl Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Owner")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("alive", &self.core.alive.get())
            .field("persistent", &self.core.persistent.get())
            .field("tasks", &self.active_tasks())
            .finish()
    }
}
