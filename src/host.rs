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

//! A reference host loop.
//!
//! Engines normally emit the scheduler's signals themselves. `HostLoop` does
//! it for tools, tests and headless hosts: feed it real frame deltas and it
//! keeps scaled game time, accumulates fixed steps and emits
//! fixed-step/frame/end-of-frame signals in that order.

use crate::clock::TimeSample;
use crate::scheduler::Scheduler;
use std::time::Duration;
use tracing::{debug, trace};

/// What one [`HostLoop::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub fixed_steps: u32,
    /// Task resumptions across all three signals
    pub resumed: usize,
}

pub struct HostLoop {
    scheduler: Scheduler,
    time_scale: f64,
    fixed_timestep: Duration,
    max_fixed_steps: u32,
    game: Duration,
    real: Duration,
    accumulator: Duration,
}

impl HostLoop {
    /// Drive `scheduler`, taking time scale and fixed-step settings from its
    /// config.
    pub fn new(scheduler: Scheduler) -> Self {
        let config = scheduler.config();
        let time_scale = sanitize_scale(config.time_scale);
        let fixed_timestep = config.fixed_timestep_duration();
        let max_fixed_steps = config.max_fixed_steps_per_frame.max(1);
        Self {
            scheduler,
            time_scale,
            fixed_timestep,
            max_fixed_steps,
            game: Duration::ZERO,
            real: Duration::ZERO,
            accumulator: Duration::ZERO,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Set the real-to-game time multiplier. Negative or non-finite values
    /// pause game time.
    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = sanitize_scale(scale);
        debug!(time_scale = self.time_scale, "time scale changed");
    }

    /// Elapsed game and real time so far.
    pub fn elapsed(&self) -> TimeSample {
        TimeSample::new(self.game, self.real)
    }

    /// Run one frame that took `real_delta` of wall-clock time.
    pub fn step(&mut self, real_delta: Duration) -> FrameReport {
        let game_delta = self.scale(real_delta);
        self.real = self.real.saturating_add(real_delta);
        self.game = self.game.saturating_add(game_delta);
        self.accumulator = self.accumulator.saturating_add(game_delta);

        let mut report = FrameReport::default();
        while self.accumulator >= self.fixed_timestep {
            if report.fixed_steps == self.max_fixed_steps {
                debug!(
                    backlog = ?self.accumulator,
                    max = self.max_fixed_steps,
                    "fixed-step backlog dropped"
                );
                self.accumulator = Duration::ZERO;
                break;
            }
            self.accumulator -= self.fixed_timestep;
            report.fixed_steps += 1;
            report.resumed += self.scheduler.fixed_step();
        }

        report.resumed += self.scheduler.advance_frame(self.elapsed());
        report.resumed += self.scheduler.end_of_frame();
        report.frame = self.scheduler.now().frame;

        trace!(
            frame = report.frame,
            fixed_steps = report.fixed_steps,
            resumed = report.resumed,
            "host frame"
        );
        report
    }

    /// Run `frames` frames of `real_delta` each. Returns total resumptions.
    pub fn run_frames(&mut self, frames: u32, real_delta: Duration) -> usize {
        (0..frames).map(|_| self.step(real_delta).resumed).sum()
    }

    /// Run frames of `real_delta` until at least `total` real time has
    /// passed. Returns the number of frames run.
    pub fn run_for(&mut self, total: Duration, real_delta: Duration) -> u64 {
        if real_delta.is_zero() {
            return 0;
        }
        let until = self.real.saturating_add(total);
        let mut frames = 0;
        while self.real < until {
            self.step(real_delta);
            frames += 1;
        }
        frames
    }

    fn scale(&self, real_delta: Duration) -> Duration {
        if self.time_scale == 1.0 {
            return real_delta;
        }
        Duration::try_from_secs_f64(real_delta.as_secs_f64() * self.time_scale)
            .unwrap_or(Duration::MAX)
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 { scale } else { 0.0 }
}

impl std::fmt::Debug for HostLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLoop")
            .field("time_scale", &self.time_scale)
            .field("fixed_timestep", &self.fixed_timestep)
            .field("game", &self.game)
            .field("real", &self.real)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use std::cell::Cell;
    use std::rc::Rc;

    fn host(fixed_timestep: f64, max_fixed_steps_per_frame: u32) -> HostLoop {
        HostLoop::new(Scheduler::new(SchedulerConfig {
            fixed_timestep,
            max_fixed_steps_per_frame,
            ..Default::default()
        }))
    }

    #[test]
    fn test_fixed_steps_accumulate() {
        let mut host = host(0.02, 8);
        assert_eq!(host.step(Duration::from_millis(50)).fixed_steps, 2);
        // 10ms left over plus 10ms
        assert_eq!(host.step(Duration::from_millis(10)).fixed_steps, 1);
        assert_eq!(host.step(Duration::from_millis(10)).fixed_steps, 0);
        assert_eq!(host.scheduler().now().fixed, 3);
        assert_eq!(host.scheduler().now().frame, 3);
    }

    #[test]
    fn test_fixed_step_backlog_is_capped() {
        let mut host = host(0.02, 2);
        assert_eq!(host.step(Duration::from_secs(1)).fixed_steps, 2);
        assert_eq!(host.step(Duration::from_millis(10)).fixed_steps, 0);
    }

    #[test]
    fn test_zero_timestep_uses_default() {
        let mut host = host(0.0, 8);
        host.set_time_scale(0.0);
        assert_eq!(host.step(Duration::from_millis(16)).fixed_steps, 0);

        host.set_time_scale(1.0);
        assert_eq!(host.step(Duration::from_millis(16)).fixed_steps, 0);
        assert_eq!(host.step(Duration::from_millis(16)).fixed_steps, 1);
        assert_eq!(host.scheduler().now().fixed, 1);
    }

    #[test]
    fn test_signal_order_within_frame() {
        let mut host = host(0.01, 8);
        let owner = host.scheduler().create_owner("test");
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));

        let sink = log.clone();
        owner.invoke_end_of_frame(move || sink.borrow_mut().push("end"));
        let sink = log.clone();
        owner.invoke_next_frame(move || sink.borrow_mut().push("frame"));
        let sink = log.clone();
        owner.invoke_fixed_update(move || sink.borrow_mut().push("fixed"));

        let report = host.step(Duration::from_millis(16));
        assert_eq!(report.resumed, 3);
        assert_eq!(*log.borrow(), vec!["fixed", "frame", "end"]);
    }

    #[test]
    fn test_paused_game_time_still_runs_realtime_delays() {
        let mut host = host(0.02, 8);
        host.set_time_scale(0.0);
        let owner = host.scheduler().create_owner("test");

        let (game, real) = (Rc::new(Cell::new(false)), Rc::new(Cell::new(false)));
        let flag = game.clone();
        owner.invoke_seconds_delayed(move || flag.set(true), Duration::from_millis(100));
        let flag = real.clone();
        owner.invoke_realtime_seconds_delayed(move || flag.set(true), Duration::from_millis(100));

        host.run_frames(10, Duration::from_millis(16));
        assert!(real.get());
        assert!(!game.get());
        assert_eq!(host.elapsed().game, Duration::ZERO);
        // Fixed steps follow game time
        assert_eq!(host.scheduler().now().fixed, 0);

        host.set_time_scale(1.0);
        host.run_frames(7, Duration::from_millis(16));
        assert!(game.get());
    }

    #[test]
    fn test_time_scale_speeds_up_game_delays() {
        let mut host = host(0.02, 8);
        host.set_time_scale(2.0);
        let owner = host.scheduler().create_owner("test");
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        owner.invoke_seconds_delayed(move || flag.set(true), Duration::from_secs(1));

        host.run_for(Duration::from_millis(490), Duration::from_millis(10));
        assert!(!fired.get());
        host.run_for(Duration::from_millis(20), Duration::from_millis(10));
        assert!(fired.get());
    }

    #[test]
    fn test_bad_time_scale_pauses() {
        let mut host = host(0.02, 8);
        host.set_time_scale(f64::NAN);
        assert_eq!(host.time_scale(), 0.0);
        host.set_time_scale(-3.0);
        assert_eq!(host.time_scale(), 0.0);
    }

    #[test]
    fn test_run_for_zero_delta_does_nothing() {
        let mut host = host(0.02, 8);
        assert_eq!(host.run_for(Duration::from_secs(1), Duration::ZERO), 0);
        assert_eq!(host.run_for(Duration::from_millis(50), Duration::from_millis(10)), 5);
    }
}
