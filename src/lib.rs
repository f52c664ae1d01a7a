//! Tickwork - cooperative deferred and repeating actions for tick-driven hosts
//!
//! A host (game loop, simulation, tool) emits three signals: fixed step,
//! frame, end of frame. Work scheduled through an [`Owner`] suspends on cached
//! wait descriptors and resumes from those signals, on the host's thread, in
//! registration order. Destroying an owner cancels everything bound to it.

pub mod clock;
pub mod config;
pub mod detached;
pub mod error;
pub mod host;
pub mod ops;
pub mod scheduler;
pub mod task;
pub mod wait;


// Re-export main public APIs
pub use clock::{FrameClock, Phase, TimeSample};
pub use config::SchedulerConfig;
pub use error::{ConfigError, SchedulerError};
pub use host::{FrameReport, HostLoop};
pub use ops::{ChainAction, ChainSpec, RepeatCount, RepeatSpec};
pub use scheduler::{Owner, OwnerId, Scheduler, TaskHandle};
pub use task::{Routine, Step, Suspension, TaskState};
pub use wait::{Wait, WaitDescriptor, seconds};
