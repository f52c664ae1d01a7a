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

//! Cancellation handles.

use super::owner::{OwnerCore, OwnerId};
use crate::task::{TaskKey, TaskState};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

#[derive(Clone)]
struct Target {
    owner: Weak<OwnerCore>,
    owner_id: OwnerId,
    key: TaskKey,
}

/// An opaque, possibly empty reference to a scheduled task.
///
/// Handles never keep their owner alive. Every operation on a handle is
/// infallible: stopping an empty handle, a finished task, or a task whose
/// owner is gone does nothing.
#[derive(Clone, Default)]
pub struct TaskHandle {
    target: Option<Target>,
}

impl TaskHandle {
    pub fn empty() -> Self {
        Self { target: None }
    }

    pub(crate) fn new(owner: &Rc<OwnerCore>, key: TaskKey) -> Self {
        Self {
            target: Some(Target {
                owner: Rc::downgrade(owner),
                owner_id: owner.id(),
                key,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }

    pub fn key(&self) -> Option<TaskKey> {
        self.target.as_ref().map(|t| t.key)
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.target.as_ref().map(|t| t.owner_id)
    }

    /// Current state of the task, or `None` for an empty handle, a dropped
    /// owner, or a slot that has since been reused.
    pub fn state(&self) -> Option<TaskState> {
        let target = self.target.as_ref()?;
        let owner = target.owner.upgrade()?;
        owner.state_of(target.key)
    }

    /// True unless the task is still pending or running.
    pub fn is_finished(&self) -> bool {
        self.state().is_none_or(|state| state.is_terminal())
    }

    /// Cancel the task, leaving the handle as is.
    pub fn cancel(&self) {
        let Some(target) = self.target.as_ref() else {
            return;
        };
        if let Some(owner) = target.owner.upgrade() {
            owner.cancel(target.key);
        }
    }

    /// Cancel the task and clear the handle.
    pub fn stop(&mut self) {
        self.cancel();
        self.target = None;
    }

    pub(crate) fn belongs_to(&self, owner: &Rc<OwnerCore>) -> bool {
        self.target
            .as_ref()
            .is_some_and(|t| std::ptr::eq(t.owner.as_ptr(), Rc::as_ptr(owner)))
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.target, &other.target) {
            (None, None) => true,
            (Some(a), Some(b)) => a.key == b.key && Weak::ptr_eq(&a.owner, &b.owner),
            _ => false,
        }
    }
}

impl Eq for TaskHandle {}

impl Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            None => f.write_str("TaskHandle(empty)"),
            Some(target) => f
                .debug_struct("TaskHandle")
                .field("owner", &target.owner_id)
                .field("task", &target.key)
                .field("state", &self.state())
                .finish(),
        }
    }
}
