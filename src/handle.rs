use core::fmt;

/// Which lane minted a [`Handle`].
///
/// The spec's source material encodes this as the sign of the id and
/// suggests, as a redesign, carrying the tag explicitly instead of giving a
/// handle a back-reference to its minting lane. We do both: `id`'s sign is
/// still the routing convention the rest of the system relies on (so it
/// round-trips through the wire shape `{ id, region_tag }` unchanged), but
/// `region` is stored directly so routing never has to branch on sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegionTag {
  /// Positive id space, minted by the FastLane.
  Fast = 0,
  /// Negative id space, minted by the SlowLane.
  Slow = 1,
}

/// An opaque, stable external identifier for an allocation.
///
/// A handle carries no pointer and no reference back to the region that
/// minted it; it is a plain value, `Copy`, comparable, and hashable. It is
/// valid for as long as its owning region holds an [`AllocationRecord`]
/// with the same id ([`crate::record::AllocationRecord`]) — `free` is the
/// only operation that may end that validity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
  id: i64,
  region: RegionTag,
}

impl Handle {
  /// The reserved, always-invalid handle.
  pub const INVALID: Handle = Handle { id: 0, region: RegionTag::Fast };

  /// Constructs a handle for a freshly minted id. `id` must be non-zero and
  /// its sign must agree with `region` (positive ⇒ `Fast`, negative ⇒
  /// `Slow`); this is only called by the region that owns `id`.
  pub(crate) fn new(id: i64, region: RegionTag) -> Self {
    debug_assert_ne!(id, 0, "id 0 is reserved for the invalid handle");
    debug_assert_eq!(
      id > 0,
      matches!(region, RegionTag::Fast),
      "handle id sign must agree with its region tag"
    );
    Self { id, region }
  }

  /// Builds a handle without asserting the id/region sign convention; used
  /// to report `InvalidHandle` for an id a region's table does not
  /// recognise, where the convention may not hold (e.g. id `0`).
  pub(crate) fn new_unchecked(id: i64, region: RegionTag) -> Self {
    Self { id, region }
  }

  /// The id. Positive for FastLane handles, negative for SlowLane handles,
  /// zero only for [`Handle::INVALID`].
  #[inline]
  pub const fn id(&self) -> i64 {
    self.id
  }

  /// Which lane minted this handle.
  #[inline]
  pub const fn region(&self) -> RegionTag {
    self.region
  }

  /// `true` for every handle except [`Handle::INVALID`].
  #[inline]
  pub const fn is_valid_shape(&self) -> bool {
    self.id != 0
  }
}

impl fmt::Debug for Handle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Handle").field("id", &self.id).field("region", &self.region).finish()
  }
}

/// The wire shape from spec §6: `{ id: i64, region_tag: u8 }`. IDs are not
/// stable across `Arena` lifetimes, so this is only meaningful within a
/// single process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleWire {
  /// The handle's id.
  pub id: i64,
  /// `0` for FastLane, `1` for SlowLane.
  pub region_tag: u8,
}

impl From<Handle> for HandleWire {
  fn from(h: Handle) -> Self {
    HandleWire { id: h.id, region_tag: h.region as u8 }
  }
}
