use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::events::ArenaObserver;
use crate::handle::{Handle, RegionTag};
use crate::record::{AllocationRecord, Hints, Priority};

/// A record table starts with room for this many entries before its first
/// geometric growth; mirrors the teacher's `min_segment_size`-style small
/// constant rather than allocating for a worst case up front.
const INITIAL_TABLE_CAPACITY: usize = 16;

/// What a successful `resolve` found: either the live bytes themselves, or,
/// for a stub, the handle to resolve next. Only [`Arena`](crate::arena::Arena)
/// is in a position to look up that second handle — a single region never
/// reaches across into another region's buffer (spec §5: "no aliasing
/// across regions").
#[derive(Debug)]
pub enum Resolved<'a> {
  /// Live bytes owned by this region.
  Bytes(&'a [u8]),
  /// This record is a stub; resolve `Handle` on its owning region instead.
  /// Never itself a stub (migrations only ever target a fresh allocation).
  Redirect(Handle),
}

/// As [`Resolved`], but yielding a mutable slice for in-place writes.
#[derive(Debug)]
pub enum ResolvedMut<'a> {
  /// Live bytes owned by this region.
  Bytes(&'a mut [u8]),
  /// See [`Resolved::Redirect`].
  Redirect(Handle),
}

/// Shared contract implemented by [`FastLane`](crate::fast_lane::FastLane)
/// and [`SlowLane`](crate::slow_lane::SlowLane). See spec §4.1.
pub trait Region {
  /// A short, stable name used in diagnostics and observer callbacks
  /// (e.g. `"fast"`, `"slow"`).
  fn name(&self) -> &'static str;

  /// The region's fixed byte capacity.
  fn capacity(&self) -> usize;

  /// Appends a new live record and mints a handle for it. Fails with
  /// [`Error::OutOfCapacity`] when [`Region::can_allocate`] would return
  /// `false`.
  fn allocate(
    &mut self,
    size: usize,
    priority: Priority,
    hints: Hints,
    debug_name: Option<String>,
    frame: u64,
  ) -> Result<Handle>;

  /// Cheap prediction of whether `allocate(size, ..)` would currently
  /// succeed.
  fn can_allocate(&self, size: usize) -> bool;

  /// Resolves a handle minted by this region to its bytes, or to the
  /// handle a stub redirects to.
  fn resolve(&self, handle: Handle) -> Result<Resolved<'_>>;

  /// As [`Region::resolve`] but mutable, for writing into a live
  /// allocation.
  fn resolve_mut(&mut self, handle: Handle) -> Result<ResolvedMut<'_>>;

  /// Updates `last_access_frame` for diagnostics. Does not change
  /// eligibility for migration by itself — hints are client-supplied.
  fn touch(&mut self, handle: Handle, frame: u64) -> Result<()>;

  /// Removes the record. If it was a stub, returns the handle its
  /// `redirect_to` pointed at so the caller (only `Arena` can reach across
  /// regions) can free it too.
  fn free(&mut self, handle: Handle) -> Result<Option<Handle>>;

  /// Frees each handle in order; a failure aborts the batch, leaving the
  /// frees already applied in place. Returns the redirect of every freed
  /// stub, in the same order, for the caller to cascade.
  fn free_many(&mut self, handles: &[Handle]) -> Result<Vec<Option<Handle>>> {
    let mut redirects = Vec::with_capacity(handles.len());
    for &h in handles {
      redirects.push(self.free(h)?);
    }
    Ok(redirects)
  }

  /// Rewrites live, non-stub records so they occupy a contiguous prefix of
  /// the buffer in ascending-offset order, zeroing the vacated tail. Stubs
  /// are left exactly as they are (`offset = size = 0`, unaffected by
  /// compaction).
  fn compact(&mut self);

  /// `true` iff this region currently holds a record (live or stub) for
  /// `handle`'s id.
  fn has_handle(&self, handle: Handle) -> bool;

  /// The record backing `handle`.
  fn get_record(&self, handle: Handle) -> Result<&AllocationRecord>;

  /// `handle`'s allocation size (`0` for stubs, matching their invariant).
  fn allocation_size(&self, handle: Handle) -> Result<usize> {
    self.get_record(handle).map(AllocationRecord::size)
  }

  /// Live (non-stub) bytes in use, divided by capacity.
  fn usage_ratio(&self) -> f64;

  /// Capacity minus live bytes in use.
  fn free_space(&self) -> usize;

  /// Number of stub records currently held.
  fn stub_count(&self) -> usize;

  /// `100 * (free_space - largest_single_gap) / free_space`, i.e. how much
  /// of the free space is *not* reachable as one contiguous run; `0.0` when
  /// there is no free space to fragment.
  fn estimated_fragmentation_percent(&self) -> f64;

  /// A multi-line human-readable dump of every record, for debugging.
  fn debug_dump(&self) -> String;

  /// A single-line ASCII bar: `#` for live bytes, ` ` for everything else
  /// (free space and stub markers alike — a stub carries no bytes, so it
  /// renders indistinguishably from free space), scaled to a fixed width.
  fn visual_map(&self) -> String;
}

/// Shared state and algorithms used by both lane specialisations: the byte
/// buffer, the record table, id minting, the first-fit scan, and
/// compaction. `FastLane`/`SlowLane` each hold one of these and add their
/// own policy on top (safety margin, migration offers, table growth
/// events).
pub(crate) struct RegionState {
  pub(crate) name: &'static str,
  tag: RegionTag,
  direction: i64,
  capacity: u32,
  buffer: Vec<u8>,
  records: IndexMap<i64, AllocationRecord>,
  free_id_pool: Vec<i64>,
  next_id: i64,
  table_capacity: usize,
}

impl RegionState {
  pub(crate) fn new(name: &'static str, tag: RegionTag, capacity: usize) -> Self {
    assert!(capacity <= u32::MAX as usize, "region capacity exceeds u32::MAX");
    let direction = match tag {
      RegionTag::Fast => 1,
      RegionTag::Slow => -1,
    };
    Self {
      name,
      tag,
      direction,
      capacity: capacity as u32,
      buffer: vec![0u8; capacity],
      records: IndexMap::with_capacity(INITIAL_TABLE_CAPACITY),
      free_id_pool: Vec::new(),
      next_id: direction,
      table_capacity: INITIAL_TABLE_CAPACITY,
    }
  }

  pub(crate) fn capacity(&self) -> usize {
    self.capacity as usize
  }

  /// Sum of non-stub record sizes currently live.
  pub(crate) fn used(&self) -> usize {
    self.records.values().filter(|r| !r.is_stub).map(|r| r.size as usize).sum()
  }

  pub(crate) fn free_space(&self) -> usize {
    self.capacity as usize - self.used()
  }

  pub(crate) fn usage_ratio(&self) -> f64 {
    if self.capacity == 0 {
      return 0.0;
    }
    self.used() as f64 / self.capacity as f64
  }

  pub(crate) fn stub_count(&self) -> usize {
    self.records.values().filter(|r| r.is_stub).count()
  }

  /// Ids of live, non-stub records matching `predicate`, in insertion
  /// order. Collected eagerly so callers can mutate the table (or another
  /// region entirely) while iterating the result.
  pub(crate) fn live_ids_matching(&self, predicate: impl Fn(&AllocationRecord) -> bool) -> Vec<i64> {
    self.records.values().filter(|r| !r.is_stub && predicate(r)).map(|r| r.id).collect()
  }

  fn live_sorted_by_offset(&self) -> Vec<i64> {
    let mut ids: Vec<i64> =
      self.records.values().filter(|r| !r.is_stub).map(|r| r.id).collect();
    ids.sort_by_key(|id| self.records[id].offset);
    ids
  }

  /// First-fit scan over live records sorted by ascending offset: returns
  /// the lowest-offset gap `>= size`, trying the span before the first
  /// record, between consecutive records, and after the last record up to
  /// capacity, in that order. `size == 0` always fits at offset `0` — an
  /// empty interval never overlaps anything.
  pub(crate) fn find_first_fit(&self, size: u32) -> Option<u32> {
    if size == 0 {
      return Some(0);
    }
    let mut cursor: u32 = 0;
    for id in self.live_sorted_by_offset() {
      let rec = &self.records[&id];
      let gap = rec.offset.saturating_sub(cursor);
      if gap >= size {
        return Some(cursor);
      }
      cursor = cursor.max(rec.end());
    }
    let tail = self.capacity.saturating_sub(cursor);
    if tail >= size {
      Some(cursor)
    } else {
      None
    }
  }

  pub(crate) fn can_place(&self, size: usize) -> bool {
    match u32::try_from(size) {
      Ok(size) => self.find_first_fit(size).is_some(),
      Err(_) => false,
    }
  }

  fn mint_id(&mut self) -> i64 {
    if let Some(id) = self.free_id_pool.pop() {
      return id;
    }
    let id = self.next_id;
    self.next_id += self.direction;
    id
  }

  fn maybe_grow_table(&mut self, observer: &dyn ArenaObserver) {
    if self.records.len() + 1 > self.table_capacity {
      let old_capacity = self.table_capacity;
      let new_capacity = (old_capacity * 2).max(INITIAL_TABLE_CAPACITY);
      self.records.reserve(new_capacity.saturating_sub(self.records.capacity()));
      self.table_capacity = new_capacity;
      observer.on_record_table_growth(self.name, old_capacity, new_capacity);
    }
  }

  pub(crate) fn allocate_record(
    &mut self,
    size: usize,
    priority: Priority,
    hints: Hints,
    debug_name: Option<String>,
    frame: u64,
    observer: &dyn ArenaObserver,
  ) -> Result<Handle> {
    let size_u32 = u32::try_from(size)
      .map_err(|_| Error::OutOfCapacity { requested: size, available: self.free_space() })?;
    let offset = self
      .find_first_fit(size_u32)
      .ok_or(Error::OutOfCapacity { requested: size, available: self.free_space() })?;
    self.maybe_grow_table(observer);
    let id = self.mint_id();
    let record = AllocationRecord::new(id, offset, size_u32, priority, hints, debug_name, frame);
    self.records.insert(id, record);
    log::trace!(target: "lanearena", "allocate region={} id={} size={} offset={}", self.name, id, size, offset);
    Ok(Handle::new(id, self.tag))
  }

  pub(crate) fn get(&self, id: i64) -> Result<&AllocationRecord> {
    self.records.get(&id).ok_or(Error::InvalidHandle(Handle::new_unchecked(id, self.tag)))
  }

  pub(crate) fn get_mut(&mut self, id: i64) -> Result<&mut AllocationRecord> {
    let tag = self.tag;
    self.records.get_mut(&id).ok_or(Error::InvalidHandle(Handle::new_unchecked(id, tag)))
  }

  pub(crate) fn has(&self, id: i64) -> bool {
    self.records.contains_key(&id)
  }

  pub(crate) fn bytes(&self, record: &AllocationRecord) -> &[u8] {
    let start = record.offset();
    &self.buffer[start..start + record.size()]
  }

  pub(crate) fn bytes_mut(&mut self, record: &AllocationRecord) -> &mut [u8] {
    let start = record.offset();
    let end = start + record.size();
    &mut self.buffer[start..end]
  }

  /// Removes the record for `id`, returning it, and returns the freed id to
  /// the pool.
  pub(crate) fn remove(&mut self, id: i64) -> Result<AllocationRecord> {
    let tag = self.tag;
    let rec = self
      .records
      .shift_remove(&id)
      .ok_or(Error::InvalidHandle(Handle::new_unchecked(id, tag)))?;
    self.free_id_pool.push(id);
    log::trace!(target: "lanearena", "free region={} id={}", self.name, id);
    Ok(rec)
  }

  /// Installs a fresh record, preserving the existing id (used when turning
  /// a live record into a stub).
  pub(crate) fn replace(&mut self, record: AllocationRecord) {
    self.records.insert(record.id, record);
  }

  /// Rewrites live, non-stub records into a gap-free prefix in
  /// ascending-offset order, zeroing the vacated tail. Stubs carry no bytes
  /// and are left untouched.
  pub(crate) fn compact_in_place(&mut self) {
    let ids = self.live_sorted_by_offset();
    let mut new_buffer = vec![0u8; self.buffer.len()];
    let mut cursor: u32 = 0;
    for id in ids {
      let rec = self.records.get_mut(&id).expect("id came from this table");
      let size = rec.size;
      if size > 0 {
        let src = rec.offset as usize;
        let dst = cursor as usize;
        new_buffer[dst..dst + size as usize].copy_from_slice(&self.buffer[src..src + size as usize]);
      }
      rec.offset = cursor;
      cursor += size;
    }
    self.buffer = new_buffer;
    log::debug!(target: "lanearena", "compact region={} live_bytes={}", self.name, cursor);
  }

  fn largest_gap(&self) -> u32 {
    let mut cursor: u32 = 0;
    let mut largest: u32 = 0;
    for id in self.live_sorted_by_offset() {
      let rec = &self.records[&id];
      let gap = rec.offset.saturating_sub(cursor);
      largest = largest.max(gap);
      cursor = cursor.max(rec.end());
    }
    largest.max(self.capacity.saturating_sub(cursor))
  }

  pub(crate) fn estimated_fragmentation_percent(&self) -> f64 {
    let free = self.free_space();
    if free == 0 {
      return 0.0;
    }
    let largest = self.largest_gap() as usize;
    ((free.saturating_sub(largest)) as f64 / free as f64) * 100.0
  }

  pub(crate) fn debug_dump(&self) -> String {
    use core::fmt::Write;
    let mut out = String::new();
    let _ = writeln!(
      out,
      "region={} capacity={} used={} free={} stubs={} records={}",
      self.name,
      self.capacity,
      self.used(),
      self.free_space(),
      self.stub_count(),
      self.records.len()
    );
    for rec in self.records.values() {
      if rec.is_stub {
        let _ = writeln!(
          out,
          "  id={} STUB -> {:?} name={:?}",
          rec.id,
          rec.redirect_to,
          rec.debug_name
        );
      } else {
        let _ = writeln!(
          out,
          "  id={} offset={} size={} priority={:?} hints={:?} name={:?}",
          rec.id, rec.offset, rec.size, rec.priority, rec.hints, rec.debug_name
        );
      }
    }
    out
  }

  pub(crate) fn visual_map(&self, width: usize) -> String {
    if self.capacity == 0 || width == 0 {
      return String::new();
    }
    let mut cells = vec![' '; width];
    let scale = self.capacity as f64 / width as f64;
    for rec in self.records.values() {
      if rec.is_stub {
        continue;
      }
      let ch = '#';
      let start_cell = (rec.offset as f64 / scale).floor() as usize;
      let end_cell = ((rec.end() as f64) / scale).ceil() as usize;
      for cell in cells.iter_mut().take(end_cell.min(width)).skip(start_cell) {
        *cell = ch;
      }
    }
    cells.into_iter().collect()
  }
}
