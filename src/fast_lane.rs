use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{ArenaObserver, NullObserver};
use crate::handle::{Handle, RegionTag};
use crate::one_way::OneWayLane;
use crate::record::{AllocationRecord, Hints, Priority};
use crate::region::{Region, RegionState, Resolved, ResolvedMut};
use crate::slow_lane::SlowLane;

/// Region specialisation for small, short-lived entries (spec §4.2).
/// Positive id space; no reserved safety margin; its `compact()` may offer
/// cold/old/low-priority entries to a wired `OneWayLane` before closing
/// gaps.
pub struct FastLane {
  state: RegionState,
  observer: Arc<dyn ArenaObserver>,
}

impl FastLane {
  /// Creates a FastLane with the given byte capacity and no observer.
  pub fn new(capacity: usize) -> Self {
    Self::with_observer(capacity, Arc::new(NullObserver))
  }

  /// Creates a FastLane that reports events to `observer`.
  pub fn with_observer(capacity: usize, observer: Arc<dyn ArenaObserver>) -> Self {
    Self { state: RegionState::new("fast", RegionTag::Fast, capacity), observer }
  }

  /// Turns a live record into a stub redirecting to `slow_handle`. Fails
  /// with [`Error::InvalidHandle`] if `fast_handle` is unknown or already a
  /// stub (spec §4.2).
  pub fn replace_with_stub(&mut self, fast_handle: Handle, slow_handle: Handle) -> Result<()> {
    let rec = self.state.get(fast_handle.id())?;
    if rec.is_stub() {
      return Err(Error::InvalidHandle(fast_handle));
    }
    let rec = self.state.remove(fast_handle.id())?;
    self.state.replace(rec.into_stub(slow_handle));
    Ok(())
  }

  /// Implements the full compaction policy from spec §4.2: entries whose
  /// hints include `Cold`/`Old`, whose priority is `Low`, or whose size
  /// exceeds `large_entry_threshold` are first offered to `one_way` for
  /// migration to `slow`. Every migration decision for this call is made
  /// before any bytes are physically relocated, so compaction never sees a
  /// record mid-migration. Entries `one_way` could not place (or for which
  /// no `one_way` is wired) simply fall through to ordinary relocation.
  pub fn compact_with_migration(
    &mut self,
    one_way: Option<&mut OneWayLane>,
    slow: &mut SlowLane,
    large_entry_threshold: usize,
  ) -> Result<()> {
    if let Some(one_way) = one_way {
      let candidates =
        self.state.live_ids_matching(|r| r.is_migration_candidate(large_entry_threshold));
      for id in candidates {
        let handle = Handle::new(id, RegionTag::Fast);
        match one_way.move_from_fast_to_slow(self, slow, handle) {
          Ok(_) => {}
          // A recoverable migration failure: leave the entry live in the
          // FastLane, it will be relocated by the relocation pass below.
          Err(Error::BufferTooSmall { size, capacity }) => {
            log::debug!(
              target: "lanearena",
              "migration candidate id={id} region={} skipped: entry of {size} bytes exceeds scratch buffer ({capacity} bytes)",
              self.state.name
            );
          }
          Err(other) => return Err(other),
        }
      }
    }
    self.state.compact_in_place();
    self.observer.on_compaction(self.state.name);
    Ok(())
  }
}

impl Region for FastLane {
  fn name(&self) -> &'static str {
    self.state.name
  }

  fn capacity(&self) -> usize {
    self.state.capacity()
  }

  fn allocate(
    &mut self,
    size: usize,
    priority: Priority,
    hints: Hints,
    debug_name: Option<String>,
    frame: u64,
  ) -> Result<Handle> {
    self.state.allocate_record(size, priority, hints, debug_name, frame, &*self.observer)
  }

  fn can_allocate(&self, size: usize) -> bool {
    self.state.can_place(size)
  }

  fn resolve(&self, handle: Handle) -> Result<Resolved<'_>> {
    let rec = self.state.get(handle.id())?;
    if rec.is_stub() {
      return Ok(Resolved::Redirect(rec.redirect_to().ok_or(Error::DanglingStub)?));
    }
    Ok(Resolved::Bytes(self.state.bytes(rec)))
  }

  fn resolve_mut(&mut self, handle: Handle) -> Result<ResolvedMut<'_>> {
    let rec = self.state.get(handle.id())?.clone();
    if rec.is_stub() {
      return Ok(ResolvedMut::Redirect(rec.redirect_to().ok_or(Error::DanglingStub)?));
    }
    Ok(ResolvedMut::Bytes(self.state.bytes_mut(&rec)))
  }

  fn touch(&mut self, handle: Handle, frame: u64) -> Result<()> {
    self.state.get_mut(handle.id())?.last_access_frame = frame;
    Ok(())
  }

  fn free(&mut self, handle: Handle) -> Result<Option<Handle>> {
    let rec = self.state.remove(handle.id())?;
    Ok(rec.redirect_to())
  }

  fn compact(&mut self) {
    self.state.compact_in_place();
    self.observer.on_compaction(self.state.name);
  }

  fn has_handle(&self, handle: Handle) -> bool {
    self.state.has(handle.id())
  }

  fn get_record(&self, handle: Handle) -> Result<&AllocationRecord> {
    self.state.get(handle.id())
  }

  fn usage_ratio(&self) -> f64 {
    self.state.usage_ratio()
  }

  fn free_space(&self) -> usize {
    self.state.free_space()
  }

  fn stub_count(&self) -> usize {
    self.state.stub_count()
  }

  fn estimated_fragmentation_percent(&self) -> f64 {
    self.state.estimated_fragmentation_percent()
  }

  fn debug_dump(&self) -> String {
    self.state.debug_dump()
  }

  fn visual_map(&self) -> String {
    self.state.visual_map(64)
  }
}
