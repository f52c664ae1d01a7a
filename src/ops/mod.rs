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

//! The scheduling operations catalog.
//!
//! Every operation returns a [`TaskHandle`] straight away; the supplied
//! actions run later, from the host's signals. Nothing here runs an action
//! inside the call.

mod chain;
mod repeat;
mod routines;

pub use chain::{ChainAction, ChainSpec};
pub use repeat::{RepeatCount, RepeatSpec};

use crate::scheduler::{Owner, TaskHandle};
use crate::wait::{WaitDescriptor, game_delay, real_delay};
use chain::Chain;
use repeat::Repeating;
use routines::{AfterPredicate, Delayed, WhilePredicate};
use std::time::Duration;

impl Owner {
    /// Run `action` once `predicate` returns true. The predicate is polled
    /// once per frame; if it never holds the task lives until cancelled or
    /// the owner is destroyed.
    pub fn invoke_after(
        &self,
        predicate: impl FnMut() -> bool + 'static,
        action: impl FnOnce() + 'static,
    ) -> TaskHandle {
        self.spawn(AfterPredicate::new(predicate, action))
    }

    /// Run `action` once per iteration while `predicate` holds, waiting
    /// `interval` of scaled time between iterations (zero: one frame).
    pub fn invoke_while(
        &self,
        predicate: impl FnMut() -> bool + 'static,
        action: impl FnMut() + 'static,
        interval: Duration,
    ) -> TaskHandle {
        self.spawn(WhilePredicate::new(predicate, action, game_delay(interval)))
    }

    /// Run `action` after `frames` frame boundaries; 0 means next frame.
    pub fn invoke_frames_delayed(&self, action: impl FnOnce() + 'static, frames: u32) -> TaskHandle {
        self.spawn(Delayed::new(
            "invoke_frames_delayed",
            WaitDescriptor::frames(frames),
            action,
        ))
    }

    pub fn invoke_next_frame(&self, action: impl FnOnce() + 'static) -> TaskHandle {
        self.invoke_frames_delayed(action, 1)
    }

    /// Run `action` at the next end-of-frame signal.
    pub fn invoke_end_of_frame(&self, action: impl FnOnce() + 'static) -> TaskHandle {
        self.spawn(Delayed::new(
            "invoke_end_of_frame",
            WaitDescriptor::end_of_step(),
            action,
        ))
    }

    /// Run `action` at the next fixed-step signal.
    pub fn invoke_fixed_update(&self, action: impl FnOnce() + 'static) -> TaskHandle {
        self.spawn(Delayed::new(
            "invoke_fixed_update",
            WaitDescriptor::fixed_step(),
            action,
        ))
    }

    /// Run `action` once `delay` of scaled (game) time has passed.
    pub fn invoke_seconds_delayed(&self, action: impl FnOnce() + 'static, delay: Duration) -> TaskHandle {
        self.spawn(Delayed::new("invoke_seconds_delayed", game_delay(delay), action))
    }

    /// Run `action` once `delay` of unscaled (real) time has passed.
    pub fn invoke_realtime_seconds_delayed(
        &self,
        action: impl FnOnce() + 'static,
        delay: Duration,
    ) -> TaskHandle {
        self.spawn(Delayed::new(
            "invoke_realtime_seconds_delayed",
            real_delay(delay),
            action,
        ))
    }

    /// Run `action` repeatedly as described by `spec`.
    pub fn invoke_repeating(&self, action: impl FnMut() + 'static, spec: RepeatSpec) -> TaskHandle {
        self.spawn(Repeating::new(action, spec))
    }

    /// Run the chain's entries in order, each after its own delay.
    pub fn chain_actions(&self, chain: ChainSpec) -> TaskHandle {
        self.spawn(Chain::new(chain))
    }
}
