use crate::error::{Error, Result};

/// Plain configuration value consumed by [`Arena::new`](crate::arena::Arena::new).
///
/// Loading this from a file or environment is explicitly out of core scope
/// (spec §1) — callers build this struct however they like and hand it in.
/// Defaults match spec §6.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaConfig {
  /// FastLane capacity in bytes.
  pub fast_lane_size: usize,
  /// SlowLane capacity in bytes.
  pub slow_lane_size: usize,
  /// `OneWayLane` scratch buffer capacity in bytes.
  pub buffer_size: usize,
  /// Routing cutoff: requests `<= threshold` prefer the FastLane.
  pub threshold: usize,
  /// FastLane `usage_ratio` above which maintenance compacts it.
  pub fast_lane_usage_threshold: f64,
  /// FastLane entries larger than this are migration candidates.
  pub fast_lane_large_entry_threshold: usize,
  /// SlowLane `usage_ratio` above which maintenance considers compacting it.
  pub slow_lane_usage_threshold: f64,
  /// Fraction of SlowLane capacity permanently reserved.
  pub slow_lane_safety_margin: f64,
  /// Global maintenance gate: predicted post-compaction free ratio must
  /// meet this for the SlowLane compaction to proceed.
  pub compaction_threshold: f64,
  /// Suggested timer period for an external scheduler to call
  /// `run_maintenance_cycle`, in milliseconds. Zero disables the timer.
  /// Core does not own a timer; this is carried purely as a configuration
  /// value for whatever wires one up (spec §1's out-of-core collaborators).
  pub policy_check_interval_ms: u64,
  /// Master switch: when `false`, `run_maintenance_cycle` is a no-op.
  pub enable_auto_compaction: bool,
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self {
      fast_lane_size: 1024 * 1024,
      slow_lane_size: 8 * 1024 * 1024,
      buffer_size: 256 * 1024,
      threshold: 256 * 1024,
      fast_lane_usage_threshold: 0.90,
      fast_lane_large_entry_threshold: 4 * 1024,
      slow_lane_usage_threshold: 0.85,
      slow_lane_safety_margin: 0.10,
      compaction_threshold: 0.80,
      policy_check_interval_ms: 1000,
      enable_auto_compaction: true,
    }
  }
}

impl ArenaConfig {
  /// Validates the invariants spec §7 calls out for `InvalidConfig`:
  /// non-zero lane/scratch sizes, a scratch buffer no larger than either
  /// lane, a threshold that fits within the FastLane, and ratios in
  /// `[0, 1]`.
  pub fn validate(&self) -> Result<()> {
    if self.fast_lane_size == 0 {
      return Err(Error::InvalidConfig("fast_lane_size must be non-zero"));
    }
    if self.slow_lane_size == 0 {
      return Err(Error::InvalidConfig("slow_lane_size must be non-zero"));
    }
    if self.buffer_size == 0 {
      return Err(Error::InvalidConfig("buffer_size must be non-zero"));
    }
    if self.buffer_size > self.fast_lane_size || self.buffer_size > self.slow_lane_size {
      return Err(Error::InvalidConfig(
        "buffer_size must not exceed either lane's capacity",
      ));
    }
    if self.threshold > self.fast_lane_size {
      return Err(Error::InvalidConfig(
        "threshold must not exceed fast_lane_size",
      ));
    }
    for (name, ratio) in [
      ("fast_lane_usage_threshold", self.fast_lane_usage_threshold),
      ("slow_lane_usage_threshold", self.slow_lane_usage_threshold),
      ("slow_lane_safety_margin", self.slow_lane_safety_margin),
      ("compaction_threshold", self.compaction_threshold),
    ] {
      if !(0.0..=1.0).contains(&ratio) {
        return Err(Error::InvalidConfig(ratio_out_of_range_message(name)));
      }
    }
    Ok(())
  }
}

/// Returns a `'static` message for a ratio out of `[0, 1]`. A small lookup
/// rather than `format!` keeps `Error` `Copy` (see spec §7: configs fail
/// fast, no allocation needed to report why).
fn ratio_out_of_range_message(name: &'static str) -> &'static str {
  match name {
    "fast_lane_usage_threshold" => "fast_lane_usage_threshold must be in [0, 1]",
    "slow_lane_usage_threshold" => "slow_lane_usage_threshold must be in [0, 1]",
    "slow_lane_safety_margin" => "slow_lane_safety_margin must be in [0, 1]",
    "compaction_threshold" => "compaction_threshold must be in [0, 1]",
    _ => "ratio must be in [0, 1]",
  }
}
