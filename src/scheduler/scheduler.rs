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

//! Central scheduler - the host-facing side of the system.
//! Owns the clock, the owner registry and the default execution context.

use super::owner::{Owner, OwnerCore, OwnerId};
use crate::clock::{FrameClock, Phase, TimeSample};
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use once_cell::unsync::OnceCell;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

struct SchedulerCore {
    config: SchedulerConfig,
    clock: Rc<Cell<FrameClock>>,
    /// Registered owners in creation order
    owners: RefCell<Vec<Weak<OwnerCore>>>,
    /// Lazily created, survives `transition`
    default_owner: RefCell<Option<Owner>>,
    next_owner_id: Cell<u64>,
}

/// Drives every owner's tasks from the host's signals.
///
/// A scheduler is confined to the thread that ticks it. Cloning yields
/// another reference to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    core: Rc<SchedulerCore>,
}

thread_local! {
    static INSTANCE: OnceCell<Scheduler> = const { OnceCell::new() };
}

impl Scheduler {
    /// Create a scheduler. The config is used as given; see [`Scheduler::try_new`].
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            core: Rc::new(SchedulerCore {
                config,
                clock: Rc::new(Cell::new(FrameClock::default())),
                owners: RefCell::new(Vec::new()),
                default_owner: RefCell::new(None),
                next_owner_id: Cell::new(1),
            }),
        }
    }

    /// Create a scheduler after validating `config`.
    pub fn try_new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// The scheduler used by call sites without an explicit owner.
    ///
    /// Created with the default config on first use, once per thread; the
    /// tick thread is the only one expected to use it.
    pub fn instance() -> Scheduler {
        INSTANCE.with(|cell| {
            cell.get_or_init(|| Scheduler::new(SchedulerConfig::default()))
                .clone()
        })
    }

    /// Install a configured instance for this thread. Fails if
    /// [`Scheduler::instance`] was already used or initialized.
    pub fn try_init_instance(config: SchedulerConfig) -> Result<Scheduler> {
        let scheduler = Self::try_new(config)?;
        INSTANCE.with(|cell| {
            cell.set(scheduler.clone())
                .map_err(|_| SchedulerError::InstanceAlreadyInitialized)
        })?;
        Ok(scheduler)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    /// Current clock snapshot.
    pub fn now(&self) -> FrameClock {
        self.core.clock.get()
    }

    pub fn create_owner(&self, name: impl Into<String>) -> Owner {
        let id = OwnerId::new(self.core.next_owner_id.get());
        self.core.next_owner_id.set(id.as_u64() + 1);

        let owner = Owner::new(id, name.into(), self.core.clock.clone());
        self.core.owners.borrow_mut().push(owner.downgrade());
        trace!(owner = %id, name = owner.name(), "owner created");
        owner
    }

    /// The default execution context, created on first use.
    ///
    /// It is persistent (skipped by [`Scheduler::transition`]) and hidden from
    /// [`Scheduler::owners`]. If it was destroyed explicitly, a fresh one is
    /// created.
    pub fn default_owner(&self) -> Owner {
        if let Some(owner) = self.core.default_owner.borrow().as_ref() {
            if owner.is_alive() {
                return owner.clone();
            }
        }

        let owner = self.create_owner(self.core.config.default_owner_name.clone());
        owner.mark_persistent();
        owner.set_hidden(true);
        *self.core.default_owner.borrow_mut() = Some(owner.clone());
        debug!(owner = %owner.id(), name = owner.name(), "default execution context created");
        owner
    }

    /// The default execution context if it exists and is alive. Never
    /// creates one.
    pub fn current_default_owner(&self) -> Option<Owner> {
        self.core
            .default_owner
            .borrow()
            .as_ref()
            .filter(|owner| owner.is_alive())
            .cloned()
    }

    /// Live, visible owners in creation order.
    pub fn owners(&self) -> Vec<Owner> {
        self.live_owners()
            .into_iter()
            .filter(|owner| !owner.is_hidden())
            .collect()
    }

    /// Live owners, hidden ones included.
    pub fn owner_count(&self) -> usize {
        self.live_owners().len()
    }

    /// Non-terminal tasks across all owners.
    pub fn active_task_count(&self) -> usize {
        self.live_owners().iter().map(Owner::active_tasks).sum()
    }

    /// Host signal: a fixed step has advanced.
    pub fn fixed_step(&self) -> usize {
        let clock = self.bump(Phase::FixedStep);
        let resumed = self.run(Phase::FixedStep);
        trace!(fixed = clock.fixed, resumed, "fixed step");
        resumed
    }

    /// Host signal: a new frame began, with the current elapsed times.
    pub fn advance_frame(&self, sample: TimeSample) -> usize {
        let mut clock = self.core.clock.get();
        clock.bump(Phase::Frame);
        if !clock.observe(sample) {
            warn!(
                frame = clock.frame,
                game = ?sample.game,
                real = ?sample.real,
                "elapsed time went backwards; clamping"
            );
        }
        self.core.clock.set(clock);

        let resumed = self.run(Phase::Frame);
        trace!(frame = clock.frame, resumed, "frame advanced");
        resumed
    }

    /// Host signal: the current frame is ending.
    pub fn end_of_frame(&self) -> usize {
        let clock = self.bump(Phase::EndOfFrame);
        let resumed = self.run(Phase::EndOfFrame);
        trace!(end_of_frame = clock.end_of_frame, resumed, "end of frame");
        resumed
    }

    /// A whole frame without fixed steps: advance, then end.
    pub fn tick(&self, sample: TimeSample) -> usize {
        self.advance_frame(sample) + self.end_of_frame()
    }

    /// Scene/context transition: destroy every owner not marked persistent.
    /// Returns how many owners were destroyed.
    pub fn transition(&self) -> usize {
        let doomed: Vec<Owner> = self
            .live_owners()
            .into_iter()
            .filter(|owner| !owner.is_persistent())
            .collect();
        for owner in &doomed {
            owner.destroy();
        }
        debug!(destroyed = doomed.len(), "context transition");
        doomed.len()
    }

    /// Destroy all owners, the default context included.
    pub fn shutdown(&self) {
        for owner in self.live_owners() {
            owner.destroy();
        }
        self.core.default_owner.borrow_mut().take();
        self.core.owners.borrow_mut().clear();
        debug!("scheduler shut down");
    }

    fn bump(&self, phase: Phase) -> FrameClock {
        let mut clock = self.core.clock.get();
        clock.bump(phase);
        self.core.clock.set(clock);
        clock
    }

    fn run(&self, phase: Phase) -> usize {
        self.live_owners()
            .iter()
            .map(|owner| owner.run_pass(phase))
            .sum()
    }

    /// Prune dead registrations and return the rest. The registry borrow is
    /// released before any task runs, so actions may create owners.
    fn live_owners(&self) -> Vec<Owner> {
        let mut owners = self.core.owners.borrow_mut();
        owners.retain(|weak| weak.upgrade().is_some_and(|core| core.is_alive()));
        owners
            .iter()
            .filter_map(Weak::upgrade)
            .map(Owner::from_core)
            .collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("clock", &self.now())
            .field("owners", &self.owner_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_scheduler_singleton() {
        let s1 = Scheduler::instance();
        let s2 = Scheduler::instance();
        assert!(Rc::ptr_eq(&s1.core, &s2.core));
    }

    #[test]
    fn test_try_init_after_use_fails() {
        let _ = Scheduler::instance();
        let err = Scheduler::try_init_instance(SchedulerConfig::default()).unwrap_err();
        assert!(matches!(err, SchedulerError::InstanceAlreadyInitialized));
    }

    #[test]
    fn test_try_init_instance_on_fresh_thread() {
        std::thread::spawn(|| {
            let config = SchedulerConfig {
                default_owner_name: "statics".to_string(),
                ..Default::default()
            };
            let installed = Scheduler::try_init_instance(config).unwrap();
            let fetched = Scheduler::instance();
            assert!(Rc::ptr_eq(&installed.core, &fetched.core));
            assert_eq!(fetched.default_owner().name(), "statics");
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_try_new_validates() {
        let config = SchedulerConfig {
            fixed_timestep: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            Scheduler::try_new(config),
            Err(SchedulerError::Config(_))
        ));
    }

    #[test]
    fn test_default_owner_is_lazy_and_stable() {
        let scheduler = Scheduler::default();
        assert_eq!(scheduler.owner_count(), 0);

        let a = scheduler.default_owner();
        let b = scheduler.default_owner();
        assert_eq!(a, b);
        assert!(a.is_persistent());
        assert!(a.is_hidden());
        assert_eq!(scheduler.owner_count(), 1);
        assert!(scheduler.owners().is_empty());
    }

    #[test]
    fn test_current_default_owner_does_not_create() {
        let scheduler = Scheduler::default();
        assert!(scheduler.current_default_owner().is_none());
        assert_eq!(scheduler.owner_count(), 0);

        let statics = scheduler.default_owner();
        assert_eq!(scheduler.current_default_owner(), Some(statics));

        scheduler.shutdown();
        assert!(scheduler.current_default_owner().is_none());
        assert_eq!(scheduler.owner_count(), 0);
    }

    #[test]
    fn test_default_owner_recreated_after_destroy() {
        let scheduler = Scheduler::default();
        let first = scheduler.default_owner();
        first.destroy();

        let second = scheduler.default_owner();
        assert_ne!(first, second);
        assert!(second.is_alive());
    }

    #[test]
    fn test_transition_spares_persistent_owners() {
        let scheduler = Scheduler::default();
        let level = scheduler.create_owner("level");
        let hud = scheduler.create_owner("hud");
        hud.mark_persistent();
        let statics = scheduler.default_owner();

        assert_eq!(scheduler.transition(), 1);
        assert!(!level.is_alive());
        assert!(hud.is_alive());
        assert!(statics.is_alive());
        assert_eq!(scheduler.owners(), vec![hud]);
    }

    #[test]
    fn test_shutdown_destroys_everything() {
        let scheduler = Scheduler::default();
        let level = scheduler.create_owner("level");
        let statics = scheduler.default_owner();

        scheduler.shutdown();
        assert!(!level.is_alive());
        assert!(!statics.is_alive());
        assert_eq!(scheduler.owner_count(), 0);
    }

    #[test]
    fn test_dropped_owner_is_unregistered() {
        let scheduler = Scheduler::default();
        {
            let _temp = scheduler.create_owner("temp");
            assert_eq!(scheduler.owner_count(), 1);
        }
        assert_eq!(scheduler.owner_count(), 0);
    }

    #[test]
    fn test_signals_advance_clock() {
        let scheduler = Scheduler::default();
        scheduler.fixed_step();
        scheduler.tick(TimeSample::uniform(Duration::from_millis(16)));

        let now = scheduler.now();
        assert_eq!(now.fixed, 1);
        assert_eq!(now.frame, 1);
        assert_eq!(now.end_of_frame, 1);
        assert_eq!(now.game, Duration::from_millis(16));

        // Backwards readings are clamped
        scheduler.advance_frame(TimeSample::uniform(Duration::from_millis(5)));
        assert_eq!(scheduler.now().game, Duration::from_millis(16));
    }
}
