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

//! Interactive console for poking at a scheduler.
//! Schedules labelled actions, drives frames by hand and shows task states.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;
use tickwork::{
    ChainSpec, HostLoop, Owner, RepeatSpec, Scheduler, SchedulerConfig, TaskHandle, seconds,
};
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not a number")]
    NotANumber(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Step { frames: u32, millis: u64 },
    Run { secs: f32 },
    Frames { count: u32, label: String },
    After { secs: f32, label: String },
    Realtime { secs: f32, label: String },
    EndOfFrame { label: String },
    Fixed { label: String },
    Repeat { interval: f32, count: i32, label: String },
    Chain { entries: Vec<(String, f32)> },
    Stop { id: usize },
    Tasks,
    Scale { factor: f64 },
    Unload,
    Help,
    Quit,
}

fn number<T: std::str::FromStr>(word: &str) -> Result<T, CommandError> {
    word.parse()
        .map_err(|_| CommandError::NotANumber(word.to_string()))
}

fn label(words: &[&str], usage: &'static str) -> Result<String, CommandError> {
    if words.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    Ok(words.join(" "))
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, rest)) = words.split_first() else {
            return Err(CommandError::Usage("help"));
        };

        match head {
            "step" | "s" => Ok(Command::Step {
                frames: rest.first().map(|w| number(w)).transpose()?.unwrap_or(1),
                millis: rest.get(1).map(|w| number(w)).transpose()?.unwrap_or(16),
            }),
            "run" => match rest {
                [secs] => Ok(Command::Run { secs: number(secs)? }),
                _ => Err(CommandError::Usage("run <seconds>")),
            },
            "frames" => match rest {
                [count, words @ ..] => Ok(Command::Frames {
                    count: number(count)?,
                    label: label(words, "frames <n> <label>")?,
                }),
                _ => Err(CommandError::Usage("frames <n> <label>")),
            },
            "after" => match rest {
                [secs, words @ ..] => Ok(Command::After {
                    secs: number(secs)?,
                    label: label(words, "after <seconds> <label>")?,
                }),
                _ => Err(CommandError::Usage("after <seconds> <label>")),
            },
            "realtime" => match rest {
                [secs, words @ ..] => Ok(Command::Realtime {
                    secs: number(secs)?,
                    label: label(words, "realtime <seconds> <label>")?,
                }),
                _ => Err(CommandError::Usage("realtime <seconds> <label>")),
            },
            "eof" => Ok(Command::EndOfFrame {
                label: label(rest, "eof <label>")?,
            }),
            "fixed" => Ok(Command::Fixed {
                label: label(rest, "fixed <label>")?,
            }),
            "repeat" => match rest {
                [interval, count, words @ ..] => Ok(Command::Repeat {
                    interval: number(interval)?,
                    count: number(count)?,
                    label: label(words, "repeat <interval> <count> <label>")?,
                }),
                _ => Err(CommandError::Usage("repeat <interval> <count> <label>")),
            },
            "chain" => {
                const USAGE: &str = "chain <label>:<seconds>...";
                if rest.is_empty() {
                    return Err(CommandError::Usage(USAGE));
                }
                let entries = rest
                    .iter()
                    .map(|entry| {
                        let (name, secs) = entry.rsplit_once(':').ok_or(CommandError::Usage(USAGE))?;
                        Ok((name.to_string(), number(secs)?))
                    })
                    .collect::<Result<Vec<_>, CommandError>>()?;
                Ok(Command::Chain { entries })
            }
            "stop" => match rest {
                [id] => Ok(Command::Stop { id: number(id)? }),
                _ => Err(CommandError::Usage("stop <task id>")),
            },
            "tasks" | "ls" => Ok(Command::Tasks),
            "scale" => match rest {
                [factor] => Ok(Command::Scale {
                    factor: number(factor)?,
                }),
                _ => Err(CommandError::Usage("scale <factor>")),
            },
            "unload" => Ok(Command::Unload),
            "help" | ":help" => Ok(Command::Help),
            "quit" | "exit" | ":q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Console state: the host loop, the scene owner and every handle handed out.
pub struct Console {
    host: HostLoop,
    scene: Owner,
    handles: Vec<(String, TaskHandle)>,
}

impl Console {
    pub fn new(scheduler: Scheduler) -> Self {
        let scene = scheduler.create_owner("scene");
        Self {
            host: HostLoop::new(scheduler),
            scene,
            handles: Vec::new(),
        }
    }

    /// An action that prints `label` with the current clock.
    fn announce(&self, label: String) -> impl FnMut() + 'static {
        let scheduler = self.host.scheduler().clone();
        move || {
            let now = scheduler.now();
            println!(
                "  [frame {} game {:.3}s real {:.3}s] {label}",
                now.frame,
                now.game.as_secs_f64(),
                now.real.as_secs_f64()
            );
        }
    }

    fn track(&mut self, description: String, handle: TaskHandle) {
        if handle.is_empty() {
            println!("nothing scheduled");
            return;
        }
        println!("task {} scheduled: {description}", self.handles.len());
        self.handles.push((description, handle));
    }

    /// Apply a command. Returns false when the console should exit.
    pub fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Step { frames, millis } => {
                let resumed = self.host.run_frames(frames, Duration::from_millis(millis));
                println!("ran {frames} frame(s), {resumed} resumption(s)");
            }
            Command::Run { secs } => {
                let frames = self.host.run_for(seconds(secs), FRAME);
                println!("ran {frames} frame(s)");
            }
            Command::Frames { count, label } => {
                let handle = self.scene.invoke_frames_delayed(self.announce(label.clone()), count);
                self.track(format!("{label} after {count} frame(s)"), handle);
            }
            Command::After { secs, label } => {
                let handle = self
                    .scene
                    .invoke_seconds_delayed(self.announce(label.clone()), seconds(secs));
                self.track(format!("{label} after {secs}s"), handle);
            }
            Command::Realtime { secs, label } => {
                let handle = self
                    .scene
                    .invoke_realtime_seconds_delayed(self.announce(label.clone()), seconds(secs));
                self.track(format!("{label} after {secs}s real time"), handle);
            }
            Command::EndOfFrame { label } => {
                let handle = self.scene.invoke_end_of_frame(self.announce(label.clone()));
                self.track(format!("{label} at end of frame"), handle);
            }
            Command::Fixed { label } => {
                let handle = self.scene.invoke_fixed_update(self.announce(label.clone()));
                self.track(format!("{label} on fixed step"), handle);
            }
            Command::Repeat {
                interval,
                count,
                label,
            } => {
                let spec = RepeatSpec::from_seconds(interval, count, 0.0);
                let handle = self.scene.invoke_repeating(self.announce(label.clone()), spec);
                self.track(format!("{label} every {interval}s x{count}"), handle);
            }
            Command::Chain { entries } => {
                let names: Vec<String> = entries.iter().map(|(name, _)| name.clone()).collect();
                let mut chain = ChainSpec::new();
                for (name, secs) in entries {
                    chain.push(self.announce(name), seconds(secs));
                }
                let handle = self.scene.chain_actions(chain);
                self.track(format!("chain {}", names.join(" -> ")), handle);
            }
            Command::Stop { id } => match self.handles.get_mut(id) {
                Some((description, handle)) => {
                    self.scene.try_stop(handle);
                    println!("stopped task {id}: {description}");
                }
                None => println!("no task {id}"),
            },
            Command::Tasks => self.print_tasks(),
            Command::Scale { factor } => {
                self.host.set_time_scale(factor);
                println!("time scale {}", self.host.time_scale());
            }
            Command::Unload => {
                let destroyed = self.host.scheduler().transition();
                self.scene = self.host.scheduler().create_owner("scene");
                println!("unloaded {destroyed} owner(s)");
            }
            Command::Help => print_help(),
            Command::Quit => return false,
        }
        true
    }

    fn print_tasks(&self) {
        let now = self.host.scheduler().now();
        println!(
            "frame {} | game {:.3}s | real {:.3}s | active {}",
            now.frame,
            now.game.as_secs_f64(),
            now.real.as_secs_f64(),
            self.host.scheduler().active_task_count()
        );
        for (id, (description, handle)) in self.handles.iter().enumerate() {
            let state = handle
                .state()
                .map_or_else(|| "gone".to_string(), |state| state.to_string());
            println!("  {id:>3} {state:<10} {description}");
        }
    }

    pub fn run(&mut self, editor: &mut DefaultEditor) -> Result<(), ReadlineError> {
        println!("tickwork console. Type `help` for commands.");
        loop {
            match editor.readline("tick> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(line)?;
                    match Command::parse(line) {
                        Ok(command) => {
                            if !self.execute(command) {
                                break;
                            }
                        }
                        Err(err) => println!("Error: {err}"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }
        self.host.scheduler().shutdown();
        Ok(())
    }
}

fn print_help() {
    println!("Scheduling (actions print a label when they run):");
    println!("  frames <n> <label>                 after n frames");
    println!("  after <secs> <label>               after scaled seconds");
    println!("  realtime <secs> <label>            after unscaled seconds");
    println!("  eof <label> | fixed <label>        next end of frame / fixed step");
    println!("  repeat <interval> <count> <label>  count < 0 repeats forever");
    println!("  chain a:1 b:0.5 c:0                labelled actions with delays");
    println!();
    println!("Driving:");
    println!("  step [frames] [ms]                 default 1 frame of 16ms");
    println!("  run <secs>                         16ms frames for that long");
    println!("  scale <factor>                     game time multiplier");
    println!();
    println!("Inspection and control:");
    println!("  tasks                              list tasks and their states");
    println!("  stop <id>                          cancel a task");
    println!("  unload                             destroy the scene owner");
    println!("  help | quit");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickwork=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => SchedulerConfig::load(path)?,
        None => SchedulerConfig::default(),
    };
    let scheduler = Scheduler::try_new(config)?;
    let mut editor = DefaultEditor::new()?;
    Console::new(scheduler).run(&mut editor)?;
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
