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

//! Single-shot and predicate-driven routines.

use crate::task::{Routine, Step};
use crate::wait::WaitDescriptor;

/// One wait, then one action.
pub(crate) struct Delayed<A> {
    wait: WaitDescriptor,
    action: Option<A>,
    name: &'static str,
}

impl<A: FnOnce()> Delayed<A> {
    pub fn new(name: &'static str, wait: WaitDescriptor, action: A) -> Self {
        Self {
            wait,
            action: Some(action),
            name,
        }
    }
}

impl<A: FnOnce()> Routine for Delayed<A> {
    fn start(&mut self) -> Step {
        Step::wait(self.wait)
    }

    fn resume(&mut self) -> Step {
        if let Some(action) = self.action.take() {
            action();
        }
        Step::Complete
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Wait until a predicate holds, then act once.
pub(crate) struct AfterPredicate<P, A> {
    predicate: Option<P>,
    action: Option<A>,
}

impl<P, A> AfterPredicate<P, A> {
    pub fn new(predicate: P, action: A) -> Self {
        Self {
            predicate: Some(predicate),
            action: Some(action),
        }
    }
}

impl<P, A> Routine for AfterPredicate<P, A>
where
    P: FnMut() -> bool + 'static,
    A: FnOnce(),
{
    fn start(&mut self) -> Step {
        match self.predicate.take() {
            Some(predicate) => Step::until(predicate),
            None => Step::Complete,
        }
    }

    fn resume(&mut self) -> Step {
        if let Some(action) = self.action.take() {
            action();
        }
        Step::Complete
    }

    fn name(&self) -> &'static str {
        "invoke_after"
    }
}

/// Act once per iteration for as long as a predicate holds.
pub(crate) struct WhilePredicate<P, A> {
    predicate: P,
    action: A,
    interval: WaitDescriptor,
}

impl<P, A> WhilePredicate<P, A> {
    pub fn new(predicate: P, action: A, interval: WaitDescriptor) -> Self {
        Self {
            predicate,
            action,
            interval,
        }
    }
}

impl<P, A> Routine for WhilePredicate<P, A>
where
    P: FnMut() -> bool,
    A: FnMut(),
{
    fn start(&mut self) -> Step {
        Step::wait(WaitDescriptor::next_frame())
    }

    fn resume(&mut self) -> Step {
        if !(self.predicate)() {
            return Step::Complete;
        }
        (self.action)();
        Step::wait(self.interval)
    }

    fn name(&self) -> &'static str {
        "invoke_while"
    }
}
