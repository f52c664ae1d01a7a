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

//! Standalone tick throughput benchmark for profiling.
//! Fills a scheduler with repeating tasks across many owners and measures the
//! cost of a frame pass, then the cost of schedule/cancel churn.

use std::cell::Cell;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tickwork::{HostLoop, RepeatSpec, Scheduler, WaitDescriptor};
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(16);

struct Params {
    owners: usize,
    tasks_per_owner: usize,
    frames: u32,
}

impl Params {
    fn from_args() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let mut next = |name: &str, default: usize| -> Result<usize, String> {
            match args.next() {
                Some(value) => value
                    .parse()
                    .map_err(|_| format!("{name} must be a positive integer, got `{value}`")),
                None => Ok(default),
            }
        };
        let owners = next("owners", 64)?;
        let tasks_per_owner = next("tasks per owner", 256)?;
        let frames = next("frames", 1_000)?;
        Ok(Self {
            owners,
            tasks_per_owner,
            frames: u32::try_from(frames).map_err(|_| "frames out of range".to_string())?,
        })
    }
}

fn frame_pass(params: &Params) {
    let mut host = HostLoop::new(Scheduler::default());
    let runs = Rc::new(Cell::new(0u64));

    let owners: Vec<_> = (0..params.owners)
        .map(|i| host.scheduler().create_owner(format!("bench-{i}")))
        .collect();
    for (i, owner) in owners.iter().enumerate() {
        for j in 0..params.tasks_per_owner {
            let counter = runs.clone();
            // Mix of every-frame and interval tasks
            let interval = Duration::from_millis(((i + j) % 4 * 16) as u64);
            owner.invoke_repeating(
                move || counter.set(counter.get() + 1),
                RepeatSpec::every(interval),
            );
        }
    }

    let start = Instant::now();
    let resumed = host.run_frames(params.frames, FRAME);
    let elapsed = start.elapsed();

    println!("Frame pass:");
    println!("  tasks:           {}", host.scheduler().active_task_count());
    println!("  frames:          {}", params.frames);
    println!("  resumptions:     {resumed}");
    println!("  actions run:     {}", runs.get());
    println!("  total time:      {elapsed:?}");
    println!("  per frame:       {:?}", elapsed / params.frames.max(1));
}

fn churn(params: &Params) {
    let scheduler = Scheduler::default();
    let owner = scheduler.create_owner("churn");
    let total = params.owners * params.tasks_per_owner;

    let start = Instant::now();
    for i in 0..total {
        let mut handle = owner.invoke_seconds_delayed(|| {}, Duration::from_millis((i % 100) as u64));
        if i % 2 == 0 {
            handle.stop();
        }
    }
    owner.destroy();
    let elapsed = start.elapsed();

    println!("Schedule/cancel churn:");
    println!("  tasks:           {total}");
    println!("  total time:      {elapsed:?}");
    println!("  per task:        {:?}", elapsed / u32::try_from(total.max(1)).unwrap_or(u32::MAX));
    println!("  wait descriptors cached: {}", WaitDescriptor::cached_count());
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickwork=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let params = match Params::from_args() {
        Ok(params) => params,
        Err(err) => {
            eprintln!("Error: {err}");
            eprintln!("usage: tick_bench [owners] [tasks-per-owner] [frames]");
            return ExitCode::FAILURE;
        }
    };

    println!("tickwork tick benchmark");
    println!("=======================");
    frame_pass(&params);
    println!();
    churn(&params);

    ExitCode::SUCCESS
}
