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

//! Chained actions: delay, act, delay, act... strictly in order.

use crate::task::{Routine, Step};
use crate::wait::game_delay;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::time::Duration;

pub type ChainAction = Box<dyn FnOnce()>;

/// Ordered `(action, delay)` entries. Each delay is waited (in scaled time)
/// before its own action; zero delays run the action without waiting.
#[derive(Default)]
pub struct ChainSpec {
    entries: VecDeque<(ChainAction, Duration)>,
}

impl ChainSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, builder style.
    pub fn then(mut self, action: impl FnOnce() + 'static, delay: Duration) -> Self {
        self.push(action, delay);
        self
    }

    pub fn push(&mut self, action: impl FnOnce() + 'static, delay: Duration) {
        let action: ChainAction = Box::new(action);
        self.entries.push_back((action, delay));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all delays.
    pub fn total_delay(&self) -> Duration {
        self.entries
            .iter()
            .fold(Duration::ZERO, |total, (_, delay)| total.saturating_add(*delay))
    }
}

impl FromIterator<(ChainAction, Duration)> for ChainSpec {
    fn from_iter<I: IntoIterator<Item = (ChainAction, Duration)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Debug for ChainSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainSpec")
            .field(
                "delays",
                &self.entries.iter().map(|(_, d)| *d).collect::<Vec<_>>(),
            )
            .finish()
    }
}

pub(crate) struct Chain {
    entries: VecDeque<(ChainAction, Duration)>,
}

impl Chain {
    pub fn new(spec: ChainSpec) -> Self {
        Self {
            entries: spec.entries,
        }
    }
}

impl Routine for Chain {
    fn start(&mut self) -> Step {
        match self.entries.front() {
            Some((_, delay)) => Step::wait(game_delay(*delay)),
            None => Step::Complete,
        }
    }

    fn resume(&mut self) -> Step {
        // The head entry's delay has elapsed
        if let Some((action, _)) = self.entries.pop_front() {
            action();
        }
        loop {
            let delay = match self.entries.front() {
                Some((_, delay)) => *delay,
                None => return Step::Complete,
            };
            if !delay.is_zero() {
                return Step::wait(game_delay(delay));
            }
            if let Some((action, _)) = self.entries.pop_front() {
                action();
            }
        }
    }

    fn name(&self) -> &'static str {
        "chain_actions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Suspension;
    use crate::wait::WaitDescriptor;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<String>>, impl Fn(&'static str) -> ChainAction) {
        let log = Rc::new(RefCell::new(String::new()));
        let sink = log.clone();
        let make = move |tag: &'static str| {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push_str(tag)) as ChainAction
        };
        (log, make)
    }

    #[test]
    fn test_empty_chain_completes_at_start() {
        let mut chain = Chain::new(ChainSpec::new());
        assert!(matches!(chain.start(), Step::Complete));
    }

    #[test]
    fn test_zero_delays_run_back_to_back() {
        let (log, make) = recorder();
        let spec: ChainSpec = vec![
            (make("A"), Duration::from_secs(1)),
            (make("B"), Duration::ZERO),
            (make("C"), Duration::ZERO),
            (make("D"), Duration::from_secs(2)),
        ]
        .into_iter()
        .collect();
        assert_eq!(spec.total_delay(), Duration::from_secs(3));

        let mut chain = Chain::new(spec);
        assert!(matches!(chain.start(), Step::Suspend(_)));
        assert_eq!(log.borrow().as_str(), "");

        match chain.resume() {
            Step::Suspend(Suspension::Wait(wait)) => {
                assert_eq!(wait, WaitDescriptor::game_seconds(Duration::from_secs(2)))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(log.borrow().as_str(), "ABC");

        assert!(matches!(chain.resume(), Step::Complete));
        assert_eq!(log.borrow().as_str(), "ABCD");
    }

    #[test]
    fn test_leading_zero_delay_waits_one_frame() {
        let mut chain = Chain::new(ChainSpec::new().then(|| {}, Duration::ZERO));
        match chain.start() {
            Step::Suspend(Suspension::Wait(wait)) => assert_eq!(wait, WaitDescriptor::next_frame()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
