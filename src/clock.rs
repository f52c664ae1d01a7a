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

//! Host-facing clock state: signal counters plus scaled and unscaled time.

use std::time::Duration;

/// The three host signals a scheduler reacts to, in their per-frame order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    FixedStep,
    Frame,
    EndOfFrame,
}

/// Elapsed-time readings the host supplies with every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSample {
    /// Scaled time, affected by game speed.
    pub game: Duration,
    /// Unscaled wall-clock time.
    pub real: Duration,
}

impl TimeSample {
    pub fn new(game: Duration, real: Duration) -> Self {
        Self { game, real }
    }

    /// Both clocks at the same reading (time scale of 1).
    pub fn uniform(elapsed: Duration) -> Self {
        Self::new(elapsed, elapsed)
    }
}

/// Snapshot of everything a suspension needs to decide readiness.
///
/// Each counter only moves on its own signal, so a suspension armed against
/// one snapshot can compare counters to tell whether a boundary has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameClock {
    pub frame: u64,
    pub fixed: u64,
    pub end_of_frame: u64,
    pub game: Duration,
    pub real: Duration,
}

impl FrameClock {
    pub(crate) fn bump(&mut self, phase: Phase) {
        match phase {
            Phase::FixedStep => self.fixed += 1,
            Phase::Frame => self.frame += 1,
            Phase::EndOfFrame => self.end_of_frame += 1,
        }
    }

    /// Record a time reading. Readings that go backwards are clamped; returns
    /// false when that happened.
    pub(crate) fn observe(&mut self, sample: TimeSample) -> bool {
        let monotonic = sample.game >= self.game && sample.real >= self.real;
        self.game = self.game.max(sample.game);
        self.real = self.real.max(sample.real);
        monotonic
    }
}
