use std::{
  cmp::{min, Ordering},
  ops::Sub,
};

use serde_derive::Serialize;

/// Resolution used when a combined note file doesn't say otherwise.
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// Largest resolution a metrical SMF header can carry (15 bits).
pub const MAX_TICKS_PER_BEAT: u16 = 0x7fff;

/// Absolute position or length measured in stream ticks.
#[derive(Debug, Eq, Copy, Clone, Serialize)]
#[serde(transparent)]
pub struct TicksTime(u64);

impl TicksTime {
  pub fn new(ticks: u64) -> TicksTime {
    TicksTime(ticks)
  }

  pub fn zero() -> TicksTime {
    TicksTime(0)
  }

  pub fn get_ticks(&self) -> u64 {
    self.0
  }

  pub fn advance(&mut self, delta: u32) {
    self.0 = self.0.saturating_add(u64::from(delta));
  }
}

impl Default for TicksTime {
  fn default() -> Self {
    TicksTime::zero()
  }
}

impl Ord for TicksTime {
  fn cmp(&self, other: &TicksTime) -> Ordering {
    self.0.cmp(&other.0)
  }
}

impl PartialOrd for TicksTime {
  fn partial_cmp(&self, other: &TicksTime) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for TicksTime {
  fn eq(&self, other: &TicksTime) -> bool {
    self.0 == other.0
  }
}

impl Sub for TicksTime {
  type Output = TicksTime;
  fn sub(self, rhs: TicksTime) -> Self {
    TicksTime::new(self.0 - min(self.0, rhs.0))
  }
}
