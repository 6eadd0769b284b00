use crate::handle::Handle;

/// Errors returned at the public API boundary.
///
/// Every operation either succeeds and leaves the arena's invariants intact,
/// or fails and returns one of these without mutating any region (the sole
/// exception is [`Arena::free_many`](crate::arena::Arena::free_many), which
/// commits a prefix of frees before reporting the failing one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  /// The handle's id is unknown to the region its tag routes to, or the id
  /// is the reserved zero value.
  #[error("handle {0:?} is not known to its owning region")]
  InvalidHandle(Handle),

  /// The allocation cannot be satisfied by any region given the current fit
  /// policy and, for the SlowLane, its reserved safety margin.
  #[error("allocation of {requested} bytes exceeds available capacity ({available} bytes free)")]
  OutOfCapacity {
    /// Bytes requested by the caller.
    requested: usize,
    /// Bytes the region (or arena) could actually place right now.
    available: usize,
  },

  /// A record is a stub but its `redirect_to` is absent or unknown to the
  /// region it should point at.
  #[error("record is a stub with a dangling redirect")]
  DanglingStub,

  /// The supplied [`ArenaConfig`](crate::config::ArenaConfig) violates one
  /// of its invariants.
  #[error("invalid arena configuration: {0}")]
  InvalidConfig(&'static str),

  /// The `OneWayLane` scratch buffer is smaller than the entry being
  /// migrated.
  #[error("entry of {size} bytes exceeds the migration scratch buffer ({capacity} bytes)")]
  BufferTooSmall {
    /// Size of the entry that failed to migrate.
    size: usize,
    /// Capacity of the scratch buffer.
    capacity: usize,
  },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
