//! Two-tier, handle-indirected arena memory manager.
//!
//! An [`Arena`] owns a [`FastLane`] for small, short-lived allocations and a
//! [`SlowLane`] for long-lived or large ones, with a [`OneWayLane`] wired
//! between them to promote cold FastLane entries without giving out
//! pointers that could dangle across a compaction. Every external identity
//! is a [`Handle`]: a `{id, region}` pair decoupled from the allocation's
//! physical offset, which is the only thing compaction is allowed to move.
//!
//! ```
//! use lanearena::{Arena, ArenaConfig, Hints, Priority};
//!
//! let arena = Arena::new(ArenaConfig::default()).unwrap();
//! let handle = arena.allocate(64, Priority::Normal, Hints::empty(), None, 0).unwrap();
//! arena.with_bytes_mut(handle, |bytes| bytes.fill(0x42)).unwrap();
//! assert_eq!(arena.resolve(handle).unwrap(), vec![0x42; 64]);
//! arena.free(handle).unwrap();
//! ```

mod arena;
mod config;
mod error;
mod events;
mod fast_lane;
mod handle;
mod one_way;
mod record;
mod region;
mod slow_lane;

pub use arena::Arena;
pub use config::ArenaConfig;
pub use error::{Error, Result};
pub use events::{ArenaObserver, LoggingObserver, NullObserver};
pub use fast_lane::FastLane;
pub use handle::{Handle, HandleWire, RegionTag};
pub use one_way::OneWayLane;
pub use record::{AllocationRecord, Hints, Priority};
pub use region::{Region, Resolved, ResolvedMut};
pub use slow_lane::SlowLane;
