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

//! Owner-less scheduling: every call binds to the default execution context
//! of this thread's [`Scheduler::instance`].

use crate::ops::{ChainSpec, RepeatSpec};
use crate::scheduler::{Owner, Scheduler, TaskHandle};
use std::time::Duration;

/// The default execution context, created on first use.
pub fn default_owner() -> Owner {
    Scheduler::instance().default_owner()
}

pub fn invoke_after(
    predicate: impl FnMut() -> bool + 'static,
    action: impl FnOnce() + 'static,
) -> TaskHandle {
    default_owner().invoke_after(predicate, action)
}

pub fn invoke_while(
    predicate: impl FnMut() -> bool + 'static,
    action: impl FnMut() + 'static,
    interval: Duration,
) -> TaskHandle {
    default_owner().invoke_while(predicate, action, interval)
}

pub fn invoke_frames_delayed(action: impl FnOnce() + 'static, frames: u32) -> TaskHandle {
    default_owner().invoke_frames_delayed(action, frames)
}

pub fn invoke_next_frame(action: impl FnOnce() + 'static) -> TaskHandle {
    default_owner().invoke_next_frame(action)
}

pub fn invoke_end_of_frame(action: impl FnOnce() + 'static) -> TaskHandle {
    default_owner().invoke_end_of_frame(action)
}

pub fn invoke_fixed_update(action: impl FnOnce() + 'static) -> TaskHandle {
    default_owner().invoke_fixed_update(action)
}

pub fn invoke_seconds_delayed(action: impl FnOnce() + 'static, delay: Duration) -> TaskHandle {
    default_owner().invoke_seconds_delayed(action, delay)
}

pub fn invoke_realtime_seconds_delayed(action: impl FnOnce() + 'static, delay: Duration) -> TaskHandle {
    default_owner().invoke_realtime_seconds_delayed(action, delay)
}

pub fn invoke_repeating(action: impl FnMut() + 'static, spec: RepeatSpec) -> TaskHandle {
    default_owner().invoke_repeating(action, spec)
}

pub fn chain_actions(chain: ChainSpec) -> TaskHandle {
    default_owner().chain_actions(chain)
}

/// Stop a task started through this module, then clear the handle. Tasks of
/// other owners keep running.
pub fn try_stop(handle: &mut TaskHandle) {
    stop(handle);
    *handle = TaskHandle::empty();
}

/// Like [`try_stop`], without clearing the handle.
pub fn stop(handle: &TaskHandle) {
    // No live default context means none of its tasks can still be running
    if let Some(owner) = Scheduler::instance().current_default_owner() {
        owner.stop(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeSample;
    use crate::task::TaskState;
    use std::cell::Cell;
    use std::rc::Rc;

    fn tick(millis: u64) {
        Scheduler::instance().tick(TimeSample::uniform(Duration::from_millis(millis)));
    }

    #[test]
    fn test_detached_tasks_use_default_context() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let handle = invoke_next_frame(move || flag.set(true));

        assert_eq!(handle.owner_id(), Some(default_owner().id()));
        tick(16);
        assert!(ran.get());
    }

    #[test]
    fn test_detached_tasks_survive_transition() {
        let count = Rc::new(Cell::new(0));
        let bump = count.clone();
        let handle = invoke_repeating(
            move || bump.set(bump.get() + 1),
            RepeatSpec::every(Duration::ZERO),
        );

        let level = Scheduler::instance().create_owner("level");
        let level_handle = level.invoke_frames_delayed(|| {}, 5);

        assert_eq!(Scheduler::instance().transition(), 1);
        assert_eq!(level_handle.state(), Some(TaskState::Cancelled));

        tick(16);
        tick(32);
        assert_eq!(count.get(), 2);
        assert_eq!(handle.state(), Some(TaskState::Running));
    }

    #[test]
    fn test_try_stop_clears_handle() {
        let mut handle = invoke_seconds_delayed(|| panic!("stopped task ran"), Duration::from_millis(10));
        let observer = handle.clone();

        try_stop(&mut handle);
        assert!(handle.is_empty());
        assert_eq!(observer.state(), Some(TaskState::Cancelled));

        // Repeated stops are harmless
        try_stop(&mut handle);
        stop(&observer);
        tick(100);
    }

    #[test]
    fn test_stop_ignores_foreign_handles() {
        let other = Scheduler::instance().create_owner("other");
        let mut foreign = other.invoke_next_frame(|| {});
        let observer = foreign.clone();

        stop(&foreign);
        assert_eq!(observer.state(), Some(TaskState::Pending));

        try_stop(&mut foreign);
        assert!(foreign.is_empty());
        assert_eq!(observer.state(), Some(TaskState::Pending));
    }

    #[test]
    fn test_try_stop_after_shutdown_clears_without_recreating() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let mut handle = invoke_next_frame(move || flag.set(true));
        let observer = handle.clone();

        Scheduler::instance().shutdown();
        assert_eq!(observer.state(), None);

        stop(&handle);
        try_stop(&mut handle);
        assert!(handle.is_empty());
        assert_eq!(Scheduler::instance().owner_count(), 0);

        tick(16);
        assert!(!ran.get());
    }
}
