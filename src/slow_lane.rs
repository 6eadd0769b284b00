use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{ArenaObserver, NullObserver};
use crate::handle::{Handle, RegionTag};
use crate::record::{AllocationRecord, Hints, Priority};
use crate::region::{Region, RegionState, Resolved, ResolvedMut};

/// Region specialisation for long-lived or large entries (spec §4.3).
/// Negative id space; reserves `safety_margin` of its capacity so
/// migrations and compaction always have scratch room to work with.
pub struct SlowLane {
  state: RegionState,
  safety_margin: f64,
  observer: Arc<dyn ArenaObserver>,
}

impl SlowLane {
  /// Creates a SlowLane with the given byte capacity, safety margin
  /// (fraction of capacity kept unused, `[0, 1]`), and no observer.
  pub fn new(capacity: usize, safety_margin: f64) -> Self {
    Self::with_observer(capacity, safety_margin, Arc::new(NullObserver))
  }

  /// Creates a SlowLane that reports events to `observer`.
  pub fn with_observer(capacity: usize, safety_margin: f64, observer: Arc<dyn ArenaObserver>) -> Self {
    Self {
      state: RegionState::new("slow", RegionTag::Slow, capacity),
      safety_margin,
      observer,
    }
  }

  /// The byte budget below which `used + size` must stay: `capacity * (1 -
  /// safety_margin)`.
  fn margin_budget(&self) -> usize {
    (self.capacity() as f64 * (1.0 - self.safety_margin)).floor() as usize
  }

  /// The fraction of capacity currently reserved as safety margin.
  pub fn safety_margin(&self) -> f64 {
    self.safety_margin
  }
}

impl Region for SlowLane {
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
    if !self.can_allocate(size) {
      return Err(Error::OutOfCapacity {
        requested: size,
        available: self.margin_budget().saturating_sub(self.state.used()),
      });
    }
    self.state.allocate_record(size, priority, hints, debug_name, frame, &*self.observer)
  }

  fn can_allocate(&self, size: usize) -> bool {
    let budget = self.margin_budget();
    let used = self.state.used();
    used.saturating_add(size) <= budget && self.state.can_place(size)
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

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn safety_margin_rejects_allocation_past_budget() {
    let mut slow = SlowLane::new(1024 * 1024, 0.10);
    slow.allocate(900 * 1024, Priority::Normal, Hints::empty(), None, 0).unwrap();
    let err = slow.allocate(50 * 1024, Priority::Normal, Hints::empty(), None, 0).unwrap_err();
    assert!(matches!(err, Error::OutOfCapacity { .. }));
  }
}
