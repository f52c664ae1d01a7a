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

//! The suspend/resume contract between a routine and the tick driver.

use crate::clock::{FrameClock, Phase};
use crate::wait::{Wait, WaitDescriptor};
use std::fmt::Debug;

/// A point at which a task gives control back to the host loop.
pub enum Suspension {
    /// Wait on a cached descriptor.
    Wait(WaitDescriptor),
    /// Re-evaluate a predicate once per frame until it returns true.
    Until(Box<dyn FnMut() -> bool>),
}

impl Suspension {
    pub fn until(predicate: impl FnMut() -> bool + 'static) -> Self {
        Suspension::Until(Box::new(predicate))
    }

    /// The host signal on which this suspension is checked.
    pub fn phase(&self) -> Phase {
        match self {
            Suspension::Wait(descriptor) => descriptor.wait().phase(),
            Suspension::Until(_) => Phase::Frame,
        }
    }

    /// Whether a suspension armed at `armed` may resume during `phase` at `now`.
    ///
    /// Every kind needs at least one signal of its phase after arming, so a
    /// suspension returned mid-pass is never satisfied by that same pass.
    pub(crate) fn is_ready(&mut self, phase: Phase, armed: &FrameClock, now: &FrameClock) -> bool {
        if self.phase() != phase {
            return false;
        }
        match self {
            Suspension::Wait(descriptor) => match descriptor.wait() {
                Wait::NextFrame => now.frame > armed.frame,
                Wait::Frames(count) => now.frame >= armed.frame + u64::from(count.max(1)),
                Wait::GameSeconds(delay) => {
                    now.frame > armed.frame && now.game.saturating_sub(armed.game) >= delay
                }
                Wait::RealSeconds(delay) => {
                    now.frame > armed.frame && now.real.saturating_sub(armed.real) >= delay
                }
                Wait::EndOfStep => now.end_of_frame > armed.end_of_frame,
                Wait::FixedStep => now.fixed > armed.fixed,
            },
            Suspension::Until(predicate) => now.frame > armed.frame && predicate(),
        }
    }
}

impl From<WaitDescriptor> for Suspension {
    fn from(descriptor: WaitDescriptor) -> Self {
        Suspension::Wait(descriptor)
    }
}

impl Debug for Suspension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Suspension::Wait(descriptor) => f.debug_tuple("Wait").field(descriptor).finish(),
            Suspension::Until(_) => f.write_str("Until(<predicate>)"),
        }
    }
}

/// What a routine wants next.
#[derive(Debug)]
pub enum Step {
    Suspend(Suspension),
    Complete,
}

impl Step {
    pub fn wait(descriptor: WaitDescriptor) -> Self {
        Step::Suspend(Suspension::Wait(descriptor))
    }

    pub fn until(predicate: impl FnMut() -> bool + 'static) -> Self {
        Step::Suspend(Suspension::until(predicate))
    }
}

/// A resumable sequence of actions separated by suspensions.
///
/// `start` is called once, when the task is scheduled, and must not run any
/// action: it only declares the first suspension. `resume` is called each
/// time the current suspension is satisfied; it runs whatever actions are now
/// due and says what to wait for next.
pub trait Routine {
    fn start(&mut self) -> Step;

    fn resume(&mut self) -> Step;

    /// Short label used in logs.
    fn name(&self) -> &'static str {
        "routine"
    }
}
