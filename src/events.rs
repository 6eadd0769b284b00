/// Optional observer hooks for the notifications spec §4.1 and §6 call out:
/// `compacted(region_name)`, migration, and record-table growth.
///
/// Core never requires an observer — every method defaults to a no-op — and
/// never picks a sink for you; wiring this to metrics, tracing spans, or a
/// UI overlay is an application-layer concern (spec §1 scopes "logging/trace
/// sinks" out of core). What core *does* own is calling these hooks at the
/// right moments, and a built-in [`LoggingObserver`] that forwards to the
/// `log` facade so the crate is useful with zero setup.
pub trait ArenaObserver: Send + Sync {
  /// A region finished a `compact()` call.
  fn on_compaction(&self, _region_name: &str) {}

  /// An entry of `size` bytes moved from `region_from` to `region_to`.
  fn on_migration(&self, _region_from: &str, _region_to: &str, _size: usize) {}

  /// A region's record table grew from `old_capacity` to `new_capacity`.
  fn on_record_table_growth(&self, _region_name: &str, _old_capacity: usize, _new_capacity: usize) {}
}

/// An observer that does nothing. Used when no observer is configured so
/// the Arena never has to branch on `Option<Arc<dyn ArenaObserver>>` at call
/// sites.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ArenaObserver for NullObserver {}

/// Forwards every event to the `log` facade at a level matching its
/// significance: compaction and growth are routine (`debug`), migration is
/// noteworthy (`info`). Grounded in `mmtk-mmtk-core`'s and
/// `econic-ai-massive-graph`'s use of `log`/`debug_log!` for allocator
/// diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ArenaObserver for LoggingObserver {
  fn on_compaction(&self, region_name: &str) {
    log::debug!(target: "lanearena", "compacted region={region_name}");
  }

  fn on_migration(&self, region_from: &str, region_to: &str, size: usize) {
    log::info!(target: "lanearena", "migrated {size} bytes from={region_from} to={region_to}");
  }

  fn on_record_table_growth(&self, region_name: &str, old_capacity: usize, new_capacity: usize) {
    log::debug!(
      target: "lanearena",
      "record table grew region={region_name} old_capacity={old_capacity} new_capacity={new_capacity}"
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Default)]
  struct CountingObserver {
    compactions: AtomicUsize,
    migrations: AtomicUsize,
    growths: AtomicUsize,
  }

  impl ArenaObserver for CountingObserver {
    fn on_compaction(&self, _region_name: &str) {
      self.compactions.fetch_add(1, Ordering::Relaxed);
    }
    fn on_migration(&self, _region_from: &str, _region_to: &str, _size: usize) {
      self.migrations.fetch_add(1, Ordering::Relaxed);
    }
    fn on_record_table_growth(&self, _region_name: &str, _old: usize, _new: usize) {
      self.growths.fetch_add(1, Ordering::Relaxed);
    }
  }

  #[test]
  fn counting_observer_tracks_each_event_kind() {
    let obs = CountingObserver::default();
    obs.on_compaction("fast");
    obs.on_migration("fast", "slow", 128);
    obs.on_record_table_growth("fast", 16, 32);
    assert_eq!(obs.compactions.load(Ordering::Relaxed), 1);
    assert_eq!(obs.migrations.load(Ordering::Relaxed), 1);
    assert_eq!(obs.growths.load(Ordering::Relaxed), 1);
  }

  #[test]
  fn null_observer_is_inert() {
    let obs = NullObserver;
    obs.on_compaction("fast");
    obs.on_migration("fast", "slow", 1);
    obs.on_record_table_growth("fast", 1, 2);
  }
}
