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

//! Interned wait descriptors.
//!
//! A [`WaitDescriptor`] is an immutable suspension specification ("wait two
//! frames", "wait 0.5 scaled seconds", ...). Descriptors are interned in a
//! process-wide cache so that asking twice for the same wait hands back the
//! very same instance. Durations are quantized to [`CACHE_RESOLUTION`] before
//! lookup, so `0.1 + 0.2` and `0.3` seconds share one entry.
//!
//! Reads are lock-free; only the insertion of a new descriptor takes a lock.

use crate::clock::Phase;
use ahash::AHasher;
use boxcar::Vec as BoxcarVec;
use once_cell::sync::Lazy;
use papaya::HashMap;
use std::fmt::{Debug, Display};
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Granularity used when keying time-based descriptors.
pub const CACHE_RESOLUTION: Duration = Duration::from_micros(1);

/// The suspension kinds a descriptor can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WaitKind {
    Frames,
    GameSeconds,
    RealSeconds,
    NextFrame,
    EndOfStep,
    FixedStep,
}

/// What a descriptor waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wait {
    /// Resume after this many frame boundaries (0 behaves like 1).
    Frames(u32),
    /// Resume once scaled (game) time has advanced by at least this much.
    GameSeconds(Duration),
    /// Resume once unscaled (wall clock) time has advanced by at least this much.
    RealSeconds(Duration),
    NextFrame,
    EndOfStep,
    FixedStep,
}

impl Wait {
    pub fn kind(&self) -> WaitKind {
        match self {
            Wait::Frames(_) => WaitKind::Frames,
            Wait::GameSeconds(_) => WaitKind::GameSeconds,
            Wait::RealSeconds(_) => WaitKind::RealSeconds,
            Wait::NextFrame => WaitKind::NextFrame,
            Wait::EndOfStep => WaitKind::EndOfStep,
            Wait::FixedStep => WaitKind::FixedStep,
        }
    }

    /// The host signal on which this wait is checked.
    pub fn phase(&self) -> Phase {
        match self {
            Wait::EndOfStep => Phase::EndOfFrame,
            Wait::FixedStep => Phase::FixedStep,
            _ => Phase::Frame,
        }
    }

    fn key(&self) -> WaitKey {
        let quantum = match self {
            Wait::Frames(n) => u64::from(*n),
            Wait::GameSeconds(d) | Wait::RealSeconds(d) => quantize(*d),
            Wait::NextFrame | Wait::EndOfStep | Wait::FixedStep => 0,
        };
        WaitKey {
            kind: self.kind(),
            quantum,
        }
    }

    /// The value actually stored in the cache: durations snapped to the key.
    fn canonical(self) -> Wait {
        match self {
            Wait::GameSeconds(d) => Wait::GameSeconds(snap(quantize(d))),
            Wait::RealSeconds(d) => Wait::RealSeconds(snap(quantize(d))),
            other => other,
        }
    }
}

impl Display for Wait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Wait::Frames(n) => write!(f, "frames({n})"),
            Wait::GameSeconds(d) => write!(f, "game_seconds({:.6})", d.as_secs_f64()),
            Wait::RealSeconds(d) => write!(f, "real_seconds({:.6})", d.as_secs_f64()),
            Wait::NextFrame => write!(f, "next_frame"),
            Wait::EndOfStep => write!(f, "end_of_step"),
            Wait::FixedStep => write!(f, "fixed_step"),
        }
    }
}

/// Round to the nearest multiple of [`CACHE_RESOLUTION`], counted in
/// resolution units.
fn quantize(d: Duration) -> u64 {
    let resolution = CACHE_RESOLUTION.as_nanos();
    let units = (d.as_nanos() + resolution / 2) / resolution;
    u64::try_from(units).unwrap_or(u64::MAX)
}

/// Duration of `units` resolution units, saturating.
fn snap(units: u64) -> Duration {
    let nanos = u128::from(units) * CACHE_RESOLUTION.as_nanos();
    let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
    let subsec = (nanos % 1_000_000_000) as u32;
    Duration::new(secs, subsec)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WaitKey {
    kind: WaitKind,
    quantum: u64,
}

// ============================================================================
// Global Cache State
// ============================================================================

struct WaitCache {
    /// Key -> index into `descriptors`
    index: HashMap<WaitKey, usize, BuildHasherDefault<AHasher>>,
    /// Append-only storage; entries never move, so references stay valid
    descriptors: BoxcarVec<Wait>,
    /// Serializes insertion of NEW descriptors only
    allocation_lock: Mutex<()>,
}

impl WaitCache {
    fn new() -> Self {
        Self {
            index: Default::default(),
            descriptors: BoxcarVec::new(),
            allocation_lock: Mutex::new(()),
        }
    }

    fn get(&'static self, wait: Wait) -> WaitDescriptor {
        let key = wait.key();
        let guard = self.index.pin();

        if let Some(&slot) = guard.get(&key) {
            return WaitDescriptor(&self.descriptors[slot]);
        }

        let _lock = self
            .allocation_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another thread may have inserted it while we waited for the lock
        if let Some(&slot) = guard.get(&key) {
            return WaitDescriptor(&self.descriptors[slot]);
        }

        let slot = self.descriptors.push(wait.canonical());
        guard.insert(key, slot);
        tracing::trace!(wait = %wait.canonical(), slot, "cached new wait descriptor");

        WaitDescriptor(&self.descriptors[slot])
    }
}

static WAIT_CACHE: Lazy<WaitCache> = Lazy::new(WaitCache::new);

// ============================================================================
// Descriptor Type
// ============================================================================

/// A shared, immutable suspension specification.
///
/// Equality is identity: two descriptors are equal only if they are the same
/// cached instance, which the cache guarantees for equal `(kind, duration)`.
///
/// ```
/// use std::time::Duration;
/// use tickwork::wait::WaitDescriptor;
///
/// let a = WaitDescriptor::game_seconds(Duration::from_millis(250));
/// let b = WaitDescriptor::game_seconds(Duration::from_millis(250));
/// assert!(a.ptr_eq(&b));
/// ```
#[derive(Clone, Copy)]
pub struct WaitDescriptor(&'static Wait);

impl WaitDescriptor {
    /// Fetch (or create) the cached descriptor for `wait`.
    pub fn get(wait: Wait) -> Self {
        WAIT_CACHE.get(wait)
    }

    pub fn frames(count: u32) -> Self {
        Self::get(Wait::Frames(count))
    }

    pub fn game_seconds(duration: Duration) -> Self {
        Self::get(Wait::GameSeconds(duration))
    }

    pub fn real_seconds(duration: Duration) -> Self {
        Self::get(Wait::RealSeconds(duration))
    }

    pub fn next_frame() -> Self {
        Self::get(Wait::NextFrame)
    }

    pub fn end_of_step() -> Self {
        Self::get(Wait::EndOfStep)
    }

    pub fn fixed_step() -> Self {
        Self::get(Wait::FixedStep)
    }

    pub fn wait(&self) -> Wait {
        *self.0
    }

    pub fn kind(&self) -> WaitKind {
        self.0.kind()
    }

    /// True if both descriptors are the same cached instance.
    pub fn ptr_eq(&self, other: &WaitDescriptor) -> bool {
        std::ptr::eq(self.0, other.0)
    }

    /// Number of distinct descriptors created so far in this process.
    pub fn cached_count() -> usize {
        WAIT_CACHE.descriptors.count()
    }
}

impl PartialEq for WaitDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for WaitDescriptor {}

impl Hash for WaitDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.0, state)
    }
}

impl Debug for WaitDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WaitDescriptor").field(self.0).finish()
    }
}

impl Display for WaitDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.0, f)
    }
}

impl From<Wait> for WaitDescriptor {
    fn from(wait: Wait) -> Self {
        WaitDescriptor::get(wait)
    }
}

/// Convert float seconds from host code into a delay.
///
/// Negative, NaN and zero inputs all mean "no wait" and map to
/// `Duration::ZERO`; huge values saturate.
pub fn seconds(value: f32) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(value).unwrap_or(Duration::MAX)
}

/// Scaled-time wait for `delay`, or a plain next-frame wait when it is zero.
pub(crate) fn game_delay(delay: Duration) -> WaitDescriptor {
    if delay.is_zero() {
        WaitDescriptor::next_frame()
    } else {
        WaitDescriptor::game_seconds(delay)
    }
}

/// Unscaled counterpart of [`game_delay`].
pub(crate) fn real_delay(delay: Duration) -> WaitDescriptor {
    if delay.is_zero() {
        WaitDescriptor::next_frame()
    } else {
        WaitDescriptor::real_seconds(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_duration_same_instance() {
        for millis in [0u64, 1, 16, 100, 250, 1_000, 60_000] {
            let d = Duration::from_millis(millis);
            let a = WaitDescriptor::game_seconds(d);
            let b = WaitDescriptor::game_seconds(d);
            assert!(a.ptr_eq(&b), "duplicate descriptor for {millis}ms");
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_different_durations_differ() {
        let a = WaitDescriptor::game_seconds(Duration::from_millis(100));
        let b = WaitDescriptor::game_seconds(Duration::from_millis(200));
        assert_ne!(a, b);
        assert_eq!(a.wait(), Wait::GameSeconds(Duration::from_millis(100)));
    }

    #[test]
    fn test_kinds_are_keyed_separately() {
        let d = Duration::from_millis(333);
        let game = WaitDescriptor::game_seconds(d);
        let real = WaitDescriptor::real_seconds(d);
        assert_ne!(game, real);
        assert_eq!(game.kind(), WaitKind::GameSeconds);
        assert_eq!(real.kind(), WaitKind::RealSeconds);

        // Frames(1) is not the same thing as NextFrame even if it behaves alike
        assert_ne!(WaitDescriptor::frames(1), WaitDescriptor::next_frame());
    }

    #[test]
    fn test_float_noise_is_quantized() {
        // Typical results of adding up float seconds
        let summed = Duration::from_nanos(300_000_012);
        let direct = Duration::from_nanos(299_999_999);

        let a = WaitDescriptor::game_seconds(summed);
        let b = WaitDescriptor::game_seconds(direct);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.wait(), Wait::GameSeconds(Duration::from_micros(300_000)));
    }

    #[test]
    fn test_quantize_follows_resolution() {
        let resolution = CACHE_RESOLUTION;
        assert_eq!(snap(quantize(resolution)), resolution);
        assert_eq!(snap(quantize(resolution * 7 + resolution / 3)), resolution * 7);
        assert_eq!(snap(quantize(resolution * 7 + resolution * 2 / 3)), resolution * 8);
        assert_eq!(quantize(Duration::ZERO), 0);
        assert_eq!(snap(quantize(Duration::from_secs(3))), Duration::from_secs(3));
    }

    #[test]
    fn test_unit_kinds_are_singletons() {
        assert!(WaitDescriptor::next_frame().ptr_eq(&WaitDescriptor::next_frame()));
        assert!(WaitDescriptor::end_of_step().ptr_eq(&WaitDescriptor::end_of_step()));
        assert!(WaitDescriptor::fixed_step().ptr_eq(&WaitDescriptor::fixed_step()));
        assert_eq!(WaitDescriptor::end_of_step().wait().phase(), Phase::EndOfFrame);
        assert_eq!(WaitDescriptor::fixed_step().wait().phase(), Phase::FixedStep);
        assert_eq!(WaitDescriptor::frames(3).wait().phase(), Phase::Frame);
    }

    #[test]
    fn test_cached_count_tracks_new_keys() {
        let before = WaitDescriptor::cached_count();
        WaitDescriptor::real_seconds(Duration::from_micros(987_654_321));
        assert!(WaitDescriptor::cached_count() > before);
    }

    #[test]
    fn test_concurrent_same_descriptor() {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                thread::spawn(|| {
                    (0..50)
                        .map(|_| WaitDescriptor::frames(4242).wait())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for wait in handle.join().unwrap() {
                assert_eq!(wait, Wait::Frames(4242));
            }
        }
        assert!(WaitDescriptor::frames(4242).ptr_eq(&WaitDescriptor::frames(4242)));
    }

    #[test]
    fn test_seconds_normalizes_nonsense() {
        assert_eq!(seconds(-1.0), Duration::ZERO);
        assert_eq!(seconds(0.0), Duration::ZERO);
        assert_eq!(seconds(f32::NAN), Duration::ZERO);
        assert_eq!(seconds(f32::INFINITY), Duration::MAX);
        assert_eq!(seconds(0.5), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_delay_becomes_next_frame() {
        assert_eq!(game_delay(Duration::ZERO), WaitDescriptor::next_frame());
        assert_eq!(real_delay(Duration::ZERO), WaitDescriptor::next_frame());
        assert_eq!(
            game_delay(Duration::from_secs(1)).kind(),
            WaitKind::GameSeconds
        );
    }
}
