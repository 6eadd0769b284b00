use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::{ArenaObserver, NullObserver};
use crate::fast_lane::FastLane;
use crate::handle::Handle;
use crate::region::{Region, Resolved, ResolvedMut};
use crate::slow_lane::SlowLane;

/// Migration operator that promotes an entry from the FastLane to the
/// SlowLane, leaving a stub behind (spec §4.4).
///
/// One-way by construction: nothing here ever copies SlowLane bytes back
/// into the FastLane. `Arena::move_slow_to_fast` is a distinct operation
/// with its own allocation and does not share this scratch buffer, so the
/// two paths can never alias each other's in-flight copy.
pub struct OneWayLane {
  scratch: Vec<u8>,
  observer: Arc<dyn ArenaObserver>,
}

impl OneWayLane {
  /// Creates an operator with a scratch buffer of `capacity` bytes and no
  /// observer.
  pub fn new(capacity: usize) -> Self {
    Self::with_observer(capacity, Arc::new(NullObserver))
  }

  /// Creates an operator that reports `on_migration` to `observer`.
  pub fn with_observer(capacity: usize, observer: Arc<dyn ArenaObserver>) -> Self {
    Self { scratch: vec![0u8; capacity], observer }
  }

  /// Capacity of the scratch buffer.
  pub fn capacity(&self) -> usize {
    self.scratch.len()
  }

  /// Moves `fast_handle`'s bytes from `fast` to a fresh allocation in
  /// `slow`, then turns the FastLane record into a stub pointing at the
  /// new handle.
  ///
  /// Returns `Ok(true)` on success, `Ok(false)` if `fast_handle` is
  /// unknown to `fast`, already a stub, or `slow` has no room — in every
  /// `Ok(false)` case neither region was mutated. Fails with
  /// [`Error::BufferTooSmall`] if the entry is larger than the scratch
  /// buffer; this is reported as an error rather than `Ok(false)` because
  /// it reflects a configuration problem, not routine capacity pressure.
  pub fn move_from_fast_to_slow(
    &mut self,
    fast: &mut FastLane,
    slow: &mut SlowLane,
    fast_handle: Handle,
  ) -> Result<bool> {
    let record = match fast.get_record(fast_handle) {
      Ok(rec) if !rec.is_stub() => rec.clone(),
      _ => return Ok(false),
    };

    let size = record.size();
    if size > self.scratch.len() {
      return Err(Error::BufferTooSmall { size, capacity: self.scratch.len() });
    }

    let slow_handle = match slow.allocate(
      size,
      record.priority(),
      record.hints(),
      record.debug_name().map(str::to_owned),
      record.allocation_frame(),
    ) {
      Ok(handle) => handle,
      Err(Error::OutOfCapacity { .. }) => return Ok(false),
      Err(other) => return Err(other),
    };

    // Resolve is infallible here: both handles were just minted and neither
    // region has touched them since.
    let src = match fast.resolve(fast_handle).expect("fast_handle was just validated") {
      Resolved::Bytes(bytes) => bytes,
      Resolved::Redirect(_) => unreachable!("already checked not a stub"),
    };
    self.scratch[..size].copy_from_slice(src);

    match slow.resolve_mut(slow_handle).expect("slow_handle was just allocated") {
      ResolvedMut::Bytes(dst) => dst.copy_from_slice(&self.scratch[..size]),
      ResolvedMut::Redirect(_) => unreachable!("fresh allocation is never a stub"),
    }

    fast
      .replace_with_stub(fast_handle, slow_handle)
      .expect("fast_handle was just validated as a live, non-stub record");

    self.observer.on_migration(fast.name(), slow.name(), size);
    Ok(true)
  }
}
