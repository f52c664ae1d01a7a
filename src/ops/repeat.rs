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

//! Repeat-N-times-with-interval.

use crate::task::{Routine, Step};
use crate::wait::{self, game_delay};
use std::time::Duration;

/// How many times a repeating action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatCount {
    Times(u32),
    Forever,
}

impl RepeatCount {
    fn is_exhausted(self, done: u32) -> bool {
        match self {
            RepeatCount::Times(limit) => done >= limit,
            RepeatCount::Forever => false,
        }
    }
}

/// Negative counts mean "forever".
impl From<i32> for RepeatCount {
    fn from(count: i32) -> Self {
        u32::try_from(count).map_or(RepeatCount::Forever, RepeatCount::Times)
    }
}

/// Interval, count and initial delay of a repeating action.
///
/// ```
/// use std::time::Duration;
/// use tickwork::ops::{RepeatCount, RepeatSpec};
///
/// let spec = RepeatSpec::every(Duration::from_secs(1))
///     .times(3)
///     .after(Duration::from_millis(500));
/// assert_eq!(spec.count, RepeatCount::Times(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatSpec {
    pub interval: Duration,
    pub count: RepeatCount,
    pub initial_delay: Duration,
}

impl RepeatSpec {
    /// Repeat forever with `interval` between runs and no initial delay.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            count: RepeatCount::Forever,
            initial_delay: Duration::ZERO,
        }
    }

    /// Build from float seconds and a signed count, as host scripts pass them.
    /// Negative times mean no wait; a negative count means forever.
    pub fn from_seconds(interval: f32, count: i32, initial_delay: f32) -> Self {
        Self {
            interval: wait::seconds(interval),
            count: count.into(),
            initial_delay: wait::seconds(initial_delay),
        }
    }

    pub fn times(mut self, count: u32) -> Self {
        self.count = RepeatCount::Times(count);
        self
    }

    pub fn forever(mut self) -> Self {
        self.count = RepeatCount::Forever;
        self
    }

    pub fn after(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }
}

pub(crate) struct Repeating<A> {
    action: A,
    spec: RepeatSpec,
    done: u32,
}

impl<A: FnMut()> Repeating<A> {
    pub fn new(action: A, spec: RepeatSpec) -> Self {
        Self {
            action,
            spec,
            done: 0,
        }
    }
}

impl<A: FnMut()> Routine for Repeating<A> {
    fn start(&mut self) -> Step {
        if self.spec.count.is_exhausted(0) {
            return Step::Complete;
        }
        Step::wait(game_delay(self.spec.initial_delay))
    }

    fn resume(&mut self) -> Step {
        (self.action)();
        self.done = self.done.saturating_add(1);
        if self.spec.count.is_exhausted(self.done) {
            return Step::Complete;
        }
        Step::wait(game_delay(self.spec.interval))
    }

    fn name(&self) -> &'static str {
        "invoke_repeating"
    }
}
