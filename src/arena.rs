use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ArenaConfig;
use crate::error::{Error, Result};
use crate::events::{ArenaObserver, NullObserver};
use crate::fast_lane::FastLane;
use crate::handle::{Handle, RegionTag};
use crate::one_way::OneWayLane;
use crate::record::{Hints, Priority};
use crate::region::{Region, Resolved, ResolvedMut};
use crate::slow_lane::SlowLane;

/// State guarded by the single coarse mutex described in spec §5: both
/// lanes and the `OneWayLane` scratch buffer.
struct ArenaInner {
  fast: FastLane,
  slow: SlowLane,
  one_way: OneWayLane,
}

/// Facade owning exactly one FastLane, one SlowLane, and the OneWayLane
/// wired between them, plus the policy engine (spec §4.5).
///
/// Every public method locks a single `parking_lot::Mutex` covering both
/// lanes and the migration scratch buffer before touching any state, so
/// operations on an `Arena` are always serialised — spec §5's "single
/// coarse mutex" concurrency model. `resolve`/`with_bytes`/`with_bytes_mut`
/// run their caller-supplied closure while that lock is held and never let
/// a borrow of the underlying buffer escape it, which is how this crate
/// enforces spec §5's "callers of the arena hold the lock" rule — the
/// borrow checker refuses to compile code that tries to keep the slice
/// after the guard is dropped.
pub struct Arena {
  inner: Mutex<ArenaInner>,
  config: ArenaConfig,
}

impl Arena {
  /// Builds an Arena from `config`, with no observer wired (events are
  /// still logged ambiently via the `log` facade from within each lane;
  /// see spec §4's ambient logging note).
  pub fn new(config: ArenaConfig) -> Result<Self> {
    Self::with_observer(config, Arc::new(NullObserver))
  }

  /// As [`Arena::new`], additionally reporting `on_compaction` /
  /// `on_migration` / `on_record_table_growth` to `observer`.
  pub fn with_observer(config: ArenaConfig, observer: Arc<dyn ArenaObserver>) -> Result<Self> {
    config.validate()?;
    let fast = FastLane::with_observer(config.fast_lane_size, observer.clone());
    let slow = SlowLane::with_observer(config.slow_lane_size, config.slow_lane_safety_margin, observer.clone());
    let one_way = OneWayLane::with_observer(config.buffer_size, observer);
    Ok(Self { inner: Mutex::new(ArenaInner { fast, slow, one_way }), config })
  }

  /// The configuration this Arena was built with.
  pub fn config(&self) -> &ArenaConfig {
    &self.config
  }

  /// Routes to the FastLane when `size <= config.threshold` and it has
  /// room, otherwise to the SlowLane, otherwise fails with
  /// [`Error::OutOfCapacity`] (spec §4.5).
  pub fn allocate(
    &self,
    size: usize,
    priority: Priority,
    hints: Hints,
    debug_name: Option<String>,
    frame: u64,
  ) -> Result<Handle> {
    let mut inner = self.inner.lock();
    if size <= self.config.threshold && inner.fast.can_allocate(size) {
      return inner.fast.allocate(size, priority, hints, debug_name, frame);
    }
    if inner.slow.can_allocate(size) {
      return inner.slow.allocate(size, priority, hints, debug_name, frame);
    }
    Err(Error::OutOfCapacity {
      requested: size,
      available: inner.fast.free_space().max(inner.slow.free_space()),
    })
  }

  /// Copies a handle's current bytes out into a fresh `Vec`. A convenience
  /// built on [`Arena::with_bytes`] for callers that don't need zero-copy
  /// access; see that method's documentation for the locking story.
  pub fn resolve(&self, handle: Handle) -> Result<Vec<u8>> {
    self.with_bytes(handle, |bytes| bytes.to_vec())
  }

  /// Runs `f` against `handle`'s live bytes while the Arena's mutex is
  /// held, following one stub redirect if necessary (spec §4.5: FastLane
  /// stubs resolved transparently chase their `redirect_to` on the
  /// SlowLane). The redirect target is never itself a stub — migrations
  /// only ever create fresh SlowLane allocations — so at most one hop is
  /// ever followed; a second hop would mean a dangling/corrupt stub and is
  /// reported as [`Error::DanglingStub`].
  pub fn with_bytes<R>(&self, handle: Handle, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
    let inner = self.inner.lock();
    match handle.region() {
      RegionTag::Fast => match inner.fast.resolve(handle)? {
        Resolved::Bytes(bytes) => Ok(f(bytes)),
        Resolved::Redirect(target) => match inner.slow.resolve(target) {
          Ok(Resolved::Bytes(bytes)) => Ok(f(bytes)),
          Ok(Resolved::Redirect(_)) | Err(Error::InvalidHandle(_)) => Err(Error::DanglingStub),
          Err(other) => Err(other),
        },
      },
      RegionTag::Slow => match inner.slow.resolve(handle)? {
        Resolved::Bytes(bytes) => Ok(f(bytes)),
        Resolved::Redirect(_) => Err(Error::DanglingStub),
      },
    }
  }

  /// As [`Arena::with_bytes`] but mutable, for writing into a live
  /// allocation without a defensive copy.
  pub fn with_bytes_mut<R>(&self, handle: Handle, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
    let mut inner = self.inner.lock();
    match handle.region() {
      RegionTag::Fast => match inner.fast.resolve_mut(handle)? {
        ResolvedMut::Bytes(bytes) => Ok(f(bytes)),
        ResolvedMut::Redirect(target) => match inner.slow.resolve_mut(target) {
          Ok(ResolvedMut::Bytes(bytes)) => Ok(f(bytes)),
          Ok(ResolvedMut::Redirect(_)) | Err(Error::InvalidHandle(_)) => Err(Error::DanglingStub),
          Err(other) => Err(other),
        },
      },
      RegionTag::Slow => match inner.slow.resolve_mut(handle)? {
        ResolvedMut::Bytes(bytes) => Ok(f(bytes)),
        ResolvedMut::Redirect(_) => Err(Error::DanglingStub),
      },
    }
  }

  /// Updates `last_access_frame` on the record backing `handle`.
  pub fn touch(&self, handle: Handle, frame: u64) -> Result<()> {
    let mut inner = self.inner.lock();
    match handle.region() {
      RegionTag::Fast => inner.fast.touch(handle, frame),
      RegionTag::Slow => inner.slow.touch(handle, frame),
    }
  }

  /// Frees `handle`, routed by its region tag. If the record was a stub,
  /// also frees the handle it redirected to (spec §4.1).
  pub fn free(&self, handle: Handle) -> Result<()> {
    let mut inner = self.inner.lock();
    Self::free_locked(&mut inner, handle)
  }

  fn free_locked(inner: &mut ArenaInner, handle: Handle) -> Result<()> {
    let redirect = match handle.region() {
      RegionTag::Fast => inner.fast.free(handle)?,
      RegionTag::Slow => inner.slow.free(handle)?,
    };
    if let Some(target) = redirect {
      Self::free_locked(inner, target)?;
    }
    Ok(())
  }

  /// Frees each handle in order under a single lock acquisition; a failure
  /// aborts the batch, leaving the frees already applied in place (spec
  /// §7).
  pub fn free_many(&self, handles: &[Handle]) -> Result<()> {
    let mut inner = self.inner.lock();
    for &h in handles {
      Self::free_locked(&mut inner, h)?;
    }
    Ok(())
  }

  /// Explicit promotion: allocates in the SlowLane, copies `handle`'s
  /// bytes, and turns the FastLane record into a stub. Delegates to the
  /// Arena's `OneWayLane` (spec §4.5).
  pub fn move_fast_to_slow(&self, handle: Handle) -> Result<()> {
    let mut inner = self.inner.lock();
    if handle.region() != RegionTag::Fast {
      return Err(Error::InvalidHandle(handle));
    }
    let size = match inner.fast.get_record(handle) {
      Ok(rec) if !rec.is_stub() => rec.size(),
      _ => return Err(Error::InvalidHandle(handle)),
    };
    let moved = inner.one_way.move_from_fast_to_slow(&mut inner.fast, &mut inner.slow, handle)?;
    if moved {
      Ok(())
    } else {
      // `has_handle` above already ruled out the unknown/stub cases that
      // `move_from_fast_to_slow` also reports as `Ok(false)`, so the
      // remaining possibility is that the SlowLane had no room.
      Err(Error::OutOfCapacity { requested: size, available: inner.slow.free_space() })
    }
  }

  /// Reverse promotion: allocates in the FastLane, copies `handle`'s bytes,
  /// and frees the original SlowLane allocation, returning the new handle.
  /// Deliberately does not reuse the `OneWayLane` scratch buffer — the
  /// operator is one-way by construction (spec §4.4) — so this copies
  /// directly between the two buffers instead.
  pub fn move_slow_to_fast(&self, handle: Handle) -> Result<Handle> {
    let mut inner = self.inner.lock();
    if handle.region() != RegionTag::Slow {
      return Err(Error::InvalidHandle(handle));
    }
    let record = inner.slow.get_record(handle)?.clone();
    if record.is_stub() {
      return Err(Error::InvalidHandle(handle));
    }
    if !inner.fast.can_allocate(record.size()) {
      return Err(Error::OutOfCapacity { requested: record.size(), available: inner.fast.free_space() });
    }
    let new_handle = inner.fast.allocate(
      record.size(),
      record.priority(),
      record.hints(),
      record.debug_name().map(str::to_owned),
      record.allocation_frame(),
    )?;
    let bytes = match inner.slow.resolve(handle)? {
      Resolved::Bytes(bytes) => bytes.to_vec(),
      Resolved::Redirect(_) => unreachable!("a non-stub record never redirects"),
    };
    if let ResolvedMut::Bytes(dst) = inner.fast.resolve_mut(new_handle)? {
      dst.copy_from_slice(&bytes);
    }
    inner.slow.free(handle)?;
    Ok(new_handle)
  }

  /// Compacts the FastLane (offering candidates to the OneWayLane first,
  /// per spec §4.2) then the SlowLane, in that order (spec §4.5).
  pub fn compact_all(&self) -> Result<()> {
    let mut inner = self.inner.lock();
    let threshold = self.config.fast_lane_large_entry_threshold;
    inner.fast.compact_with_migration(Some(&mut inner.one_way), &mut inner.slow, threshold)?;
    inner.slow.compact();
    Ok(())
  }

  /// Runs the policy engine once (spec §4.5): a no-op when
  /// `enable_auto_compaction` is `false`. Otherwise: if the FastLane's
  /// usage ratio exceeds `fast_lane_usage_threshold`, offers its migration
  /// candidates to the SlowLane and compacts it; if the SlowLane's usage
  /// ratio exceeds `slow_lane_usage_threshold`, compacts it only if doing
  /// so would not cut into its safety margin. A pure function of current
  /// metrics: re-running it with no intervening allocations is a no-op the
  /// second time, because the first run already migrated every eligible
  /// entry and compaction does not change how many bytes are live.
  pub fn run_maintenance_cycle(&self) -> Result<()> {
    if !self.config.enable_auto_compaction {
      return Ok(());
    }
    let mut inner = self.inner.lock();

    if inner.fast.usage_ratio() > self.config.fast_lane_usage_threshold {
      inner.fast.compact_with_migration(
        Some(&mut inner.one_way),
        &mut inner.slow,
        self.config.fast_lane_large_entry_threshold,
      )?;
    }

    if inner.slow.usage_ratio() > self.config.slow_lane_usage_threshold {
      let predicted_free_ratio = inner.slow.free_space() as f64 / inner.slow.capacity() as f64;
      if predicted_free_ratio >= self.config.slow_lane_safety_margin {
        inner.slow.compact();
      } else {
        log::debug!(
          target: "lanearena",
          "skipping slow lane compaction: predicted free ratio {predicted_free_ratio:.3} below safety margin {:.3}",
          self.config.slow_lane_safety_margin
        );
      }
    }

    Ok(())
  }

  /// A multi-line human-readable dump of both lanes, for debugging.
  pub fn debug_dump(&self) -> String {
    let inner = self.inner.lock();
    format!("{}{}", inner.fast.debug_dump(), inner.slow.debug_dump())
  }

  /// The FastLane's current usage ratio, for diagnostics and tests that
  /// need to observe the policy engine's effect directly rather than just
  /// that a later operation still succeeds.
  pub fn fast_lane_usage_ratio(&self) -> f64 {
    self.inner.lock().fast.usage_ratio()
  }

  /// The SlowLane's current usage ratio; see
  /// [`Arena::fast_lane_usage_ratio`].
  pub fn slow_lane_usage_ratio(&self) -> f64 {
    self.inner.lock().slow.usage_ratio()
  }

  /// `true` if `handle`'s own record is a stub (i.e. it has migrated and
  /// now redirects elsewhere), `false` if it still holds live bytes.
  pub fn is_stub(&self, handle: Handle) -> Result<bool> {
    let inner = self.inner.lock();
    let is_stub = match handle.region() {
      RegionTag::Fast => inner.fast.get_record(handle)?.is_stub(),
      RegionTag::Slow => inner.slow.get_record(handle)?.is_stub(),
    };
    Ok(is_stub)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_config() -> ArenaConfig {
    ArenaConfig::default()
  }

  #[test]
  fn s1_basic_allocate_resolve_free_in_fast_lane() {
    let arena = Arena::new(test_config()).unwrap();
    let h = arena.allocate(32 * 1024, Priority::Normal, Hints::empty(), None, 0).unwrap();
    assert!(h.id() > 0);
    assert!(arena.resolve(h).is_ok());

    arena.free(h).unwrap();
    assert!(matches!(arena.resolve(h), Err(Error::InvalidHandle(_))));
  }

  #[test]
  fn s2_routing_by_threshold() {
    let config = ArenaConfig { threshold: 64 * 1024, ..test_config() };
    let arena = Arena::new(config).unwrap();
    let h1 = arena.allocate(32 * 1024, Priority::Normal, Hints::empty(), None, 0).unwrap();
    let h2 = arena.allocate(128 * 1024, Priority::Normal, Hints::empty(), None, 0).unwrap();
    assert!(h1.id() > 0);
    assert!(h2.id() < 0);
  }

  #[test]
  fn s3_migration_preserves_data() {
    let arena = Arena::new(test_config()).unwrap();
    let h = arena.allocate(32 * 1024, Priority::Normal, Hints::empty(), None, 0).unwrap();
    arena.with_bytes_mut(h, |bytes| {
      for (i, b) in bytes.iter_mut().enumerate() {
        *b = (0xAB + i as u8).wrapping_add(0xCD);
      }
    }).unwrap();
    let before = arena.resolve(h).unwrap();

    arena.move_fast_to_slow(h).unwrap();

    let after = arena.resolve(h).unwrap();
    assert_eq!(before, after);
  }

  #[test]
  fn s4_compaction_preserves_handles() {
    let arena = Arena::new(test_config()).unwrap();
    let handles: Vec<Handle> = (0..6)
      .map(|i| arena.allocate(128, Priority::Normal, Hints::empty(), Some(format!("e{i}")), 0).unwrap())
      .collect();
    for (idx, h) in handles.iter().enumerate() {
      arena.with_bytes_mut(*h, |b| b.fill(idx as u8)).unwrap();
    }

    arena.free(handles[1]).unwrap();
    arena.free(handles[3]).unwrap();

    arena.compact_all().unwrap();

    for idx in [0usize, 2, 4, 5] {
      let bytes = arena.resolve(handles[idx]).unwrap();
      assert!(bytes.iter().all(|&b| b == idx as u8));
    }
  }

  #[test]
  fn s5_safety_margin_enforcement() {
    let config = ArenaConfig {
      slow_lane_size: 1024 * 1024,
      slow_lane_safety_margin: 0.10,
      threshold: 0,
      ..test_config()
    };
    let arena = Arena::new(config).unwrap();
    arena.allocate(900 * 1024, Priority::Normal, Hints::empty(), None, 0).unwrap();
    let err = arena.allocate(50 * 1024, Priority::Normal, Hints::empty(), None, 0).unwrap_err();
    assert!(matches!(err, Error::OutOfCapacity { .. }));
  }

  #[test]
  fn s6_maintenance_migrates_cold_entries() {
    let config = ArenaConfig {
      fast_lane_size: 64 * 1024,
      fast_lane_usage_threshold: 0.90,
      threshold: 64 * 1024,
      buffer_size: 4096,
      ..test_config()
    };
    let arena = Arena::new(config).unwrap();

    // Fill past 90% usage.
    let mut handles = Vec::new();
    for _ in 0..58 {
      handles.push(arena.allocate(1024, Priority::Normal, Hints::empty(), None, 0).unwrap());
    }
    let cold = arena.allocate(1024, Priority::Normal, Hints::COLD, None, 0).unwrap();

    arena.run_maintenance_cycle().unwrap();

    // The cold entry's own FastLane record must have become a stub
    // redirecting into SlowLane, not merely still resolvable (resolve/
    // with_bytes follow stubs transparently and would pass either way).
    assert!(arena.is_stub(cold).unwrap(), "cold entry did not migrate to a stub: {}", arena.debug_dump());
    assert!(arena.fast_lane_usage_ratio() <= 0.90, "FastLane usage stayed above threshold after maintenance");
    assert!(arena.resolve(cold).is_ok());
    assert!(arena.with_bytes(cold, |_| ()).is_ok());
  }

  #[test]
  fn idempotent_policy_second_run_is_a_no_op() {
    let config = ArenaConfig {
      fast_lane_size: 64 * 1024,
      threshold: 64 * 1024,
      buffer_size: 4096,
      ..test_config()
    };
    let arena = Arena::new(config).unwrap();
    for _ in 0..15 {
      arena.allocate(4 * 1024, Priority::Low, Hints::empty(), None, 0).unwrap();
    }
    arena.run_maintenance_cycle().unwrap();
    let dump_after_first = arena.debug_dump();
    arena.run_maintenance_cycle().unwrap();
    let dump_after_second = arena.debug_dump();
    assert_eq!(dump_after_first, dump_after_second);
  }

  #[test]
  fn zero_size_allocation_resolves_to_empty_slice() {
    let arena = Arena::new(test_config()).unwrap();
    let h = arena.allocate(0, Priority::Normal, Hints::empty(), None, 0).unwrap();
    let bytes = arena.resolve(h).unwrap();
    assert!(bytes.is_empty());
  }

  #[test]
  fn free_of_stub_frees_redirect_target() {
    let arena = Arena::new(test_config()).unwrap();
    let h = arena.allocate(1024, Priority::Normal, Hints::empty(), None, 0).unwrap();
    arena.move_fast_to_slow(h).unwrap();
    arena.free(h).unwrap();
    assert!(matches!(arena.resolve(h), Err(Error::InvalidHandle(_))));
  }

  #[test]
  fn exact_capacity_then_one_more_byte() {
    let config = ArenaConfig {
      fast_lane_size: 4096,
      threshold: 4096,
      slow_lane_size: 4096,
      buffer_size: 256,
      ..test_config()
    };
    let arena = Arena::new(config).unwrap();
    arena.allocate(4096, Priority::Normal, Hints::empty(), None, 0).unwrap();
    let err = arena.allocate(1, Priority::Normal, Hints::empty(), None, 0).unwrap_err();
    assert!(matches!(err, Error::OutOfCapacity { .. }));
  }
}
