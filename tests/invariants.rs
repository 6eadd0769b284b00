//! Generative tests for the invariants in spec §8, grounded in the same
//! proptest-over-operation-sequences style used for allocator testing in
//! `econic-ai-massive-graph` and in the `tachyon-beep-murk` /
//! `backtrace-labs-slitter` manifests from the reference pack.

use lanearena::{Arena, ArenaConfig, FastLane, Handle, Hints, OneWayLane, Priority, Region, SlowLane};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn intervals_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
  a.0 < b.1 && b.0 < a.1
}

/// Lets `RUST_LOG` surface the `lanearena` target's own `log::trace!`/
/// `debug!`/`info!` call sites while debugging a failing run of these
/// tests. Safe to call more than once per process (`try_init` just reports
/// the repeat).
fn init_logging() {
  let _ = env_logger::try_init();
}

/// Invariant 1 — no overlap: replays a random mix of allocate/free calls
/// against a single FastLane and asserts every pair of live records has
/// disjoint `[offset, offset + size)` intervals after every step.
#[test]
fn no_overlap_under_random_allocate_free_sequences() {
  init_logging();
  let mut rng = StdRng::seed_from_u64(0xC0FFEE);
  for _trial in 0..64 {
    let mut lane = FastLane::new(16 * 1024);
    let mut live: Vec<Handle> = Vec::new();

    for _step in 0..200 {
      if live.is_empty() || rng.gen_bool(0.65) {
        let size = rng.gen_range(0..=512);
        if let Ok(h) = lane.allocate(size, Priority::Normal, Hints::empty(), None, 0) {
          live.push(h);
        }
      } else {
        let idx = rng.gen_range(0..live.len());
        let h = live.swap_remove(idx);
        lane.free(h).unwrap();
      }

      let mut spans: Vec<(usize, usize)> = live
        .iter()
        .map(|h| {
          let rec = lane.get_record(*h).unwrap();
          (rec.offset(), rec.offset() + rec.size())
        })
        .collect();
      spans.sort_by_key(|s| s.0);
      for window in spans.windows(2) {
        assert!(!intervals_overlap(window[0], window[1]), "overlapping live records: {spans:?}");
      }
    }
  }
}

proptest! {
  /// Invariant 5 — safety margin: after any sequence of allocations that
  /// respect `can_allocate`, `used` never exceeds `capacity * (1 -
  /// safety_margin)`.
  #[test]
  fn safety_margin_holds_after_any_accepted_allocation(sizes in prop::collection::vec(1usize..=4096, 0..64)) {
    init_logging();
    let mut slow = SlowLane::new(64 * 1024, 0.15);
    let budget = (64.0 * 1024.0 * 0.85).floor() as usize;
    for size in sizes {
      if slow.can_allocate(size) {
        slow.allocate(size, Priority::Normal, Hints::empty(), None, 0).unwrap();
      }
      prop_assert!(64 * 1024 - slow.free_space() <= budget);
    }
  }
}

/// Invariant 2 — round-trip: bytes read through `resolve` are bit-identical
/// before and after a compaction that relocates the record.
#[test]
fn compaction_preserves_bytes_at_resolve() {
  init_logging();
  let arena = Arena::new(ArenaConfig::default()).unwrap();
  let mut handles = Vec::new();
  for i in 0..8 {
    let h = arena.allocate(256, Priority::Normal, Hints::empty(), None, 0).unwrap();
    arena.with_bytes_mut(h, |b| b.fill(i as u8)).unwrap();
    handles.push(h);
  }
  // Free every other entry so compaction has gaps to close.
  for h in handles.iter().step_by(2) {
    arena.free(*h).unwrap();
  }
  let before: Vec<(Handle, Vec<u8>)> =
    handles.iter().skip(1).step_by(2).map(|&h| (h, arena.resolve(h).unwrap())).collect();

  arena.compact_all().unwrap();

  for (h, bytes) in before {
    assert_eq!(arena.resolve(h).unwrap(), bytes, "bytes changed across compaction for {h:?}");
  }
}

/// Invariant 3 — id/region sign law: every FastLane handle has a positive
/// id and every SlowLane handle a negative one, and after migration the
/// FastLane record becomes a stub redirecting to a negative id.
#[test]
fn id_sign_matches_minting_region_before_and_after_migration() {
  init_logging();
  let mut fast = FastLane::new(16 * 1024);
  let mut slow = SlowLane::new(64 * 1024, 0.10);
  let mut one_way = OneWayLane::new(4096);

  let h = fast.allocate(128, Priority::Normal, Hints::empty(), None, 0).unwrap();
  assert!(h.id() > 0);
  assert!(fast.has_handle(h));

  let h2 = slow.allocate(128, Priority::Normal, Hints::empty(), None, 0).unwrap();
  assert!(h2.id() < 0);
  assert!(slow.has_handle(h2));

  assert!(one_way.move_from_fast_to_slow(&mut fast, &mut slow, h).unwrap());
  let rec = fast.get_record(h).unwrap();
  assert!(rec.is_stub());
  assert!(rec.redirect_to().unwrap().id() < 0);
}

/// Invariant 4 — stub invariant: every stub created by a migration has
/// `size == 0` and a valid (non-zero-id) `redirect_to`.
#[test]
fn every_stub_has_zero_size_and_a_valid_redirect() {
  init_logging();
  let mut fast = FastLane::new(32 * 1024);
  let mut slow = SlowLane::new(64 * 1024, 0.10);
  let mut one_way = OneWayLane::new(4096);

  let mut handles = Vec::new();
  for _ in 0..10 {
    handles.push(fast.allocate(256, Priority::Normal, Hints::empty(), None, 0).unwrap());
  }
  for h in &handles {
    assert!(one_way.move_from_fast_to_slow(&mut fast, &mut slow, *h).unwrap());
  }
  for h in &handles {
    let rec = fast.get_record(*h).unwrap();
    assert!(rec.is_stub());
    assert_eq!(rec.size(), 0);
    assert!(rec.redirect_to().unwrap().is_valid_shape());
  }
}

/// Invariant 6 — idempotent policy: running maintenance twice with no
/// intervening mutation leaves the Arena's debug dump unchanged.
#[test]
fn maintenance_is_idempotent_across_mixed_hints() {
  init_logging();
  let config = ArenaConfig {
    fast_lane_size: 32 * 1024,
    threshold: 32 * 1024,
    buffer_size: 4096,
    ..ArenaConfig::default()
  };
  let arena = Arena::new(config).unwrap();
  for i in 0..20 {
    let hints = if i % 3 == 0 { Hints::COLD } else { Hints::empty() };
    arena.allocate(512, Priority::Normal, hints, None, 0).unwrap();
  }
  arena.run_maintenance_cycle().unwrap();
  let first = arena.debug_dump();
  arena.run_maintenance_cycle().unwrap();
  assert_eq!(first, arena.debug_dump());
}

/// Boundary: allocating exactly `capacity` bytes into an empty region
/// succeeds; one more byte fails.
#[test]
fn exact_capacity_boundary() {
  init_logging();
  let mut lane = FastLane::new(1024);
  lane.allocate(1024, Priority::Normal, Hints::empty(), None, 0).unwrap();
  assert!(lane.allocate(1, Priority::Normal, Hints::empty(), None, 0).is_err());
}

/// Boundary: freeing a stub frees its redirect target too, and the stub
/// itself becomes unresolvable afterwards.
#[test]
fn freeing_a_stub_cascades_to_its_redirect() {
  init_logging();
  let arena = Arena::new(ArenaConfig::default()).unwrap();
  let h = arena.allocate(128, Priority::Normal, Hints::empty(), None, 0).unwrap();
  arena.move_fast_to_slow(h).unwrap();
  arena.free(h).unwrap();
  assert!(arena.resolve(h).is_err());
}
