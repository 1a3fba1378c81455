use serde_derive::Serialize;

use crate::midi::{EventKind, TimedEvent};
use crate::time::TicksTime;

const NUM_KEYS: usize = 128;

/// A note found in a stream: where it starts and how long it sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoteRecord {
  pub pitch: u8,
  pub position: TicksTime,
  pub duration: TicksTime,
}

/// Pairs note-ons with their note-offs while walking a stream once.
///
/// A second note-on for a key that is still sounding replaces the first
/// onset. Note-ons that never get closed produce nothing.
pub struct NoteExtractor {
  current_time: TicksTime,
  open: [Option<TicksTime>; NUM_KEYS],
}

impl Default for NoteExtractor {
  fn default() -> Self {
    NoteExtractor {
      current_time: TicksTime::zero(),
      open: [None; NUM_KEYS],
    }
  }
}

impl NoteExtractor {
  pub fn new() -> NoteExtractor {
    NoteExtractor::default()
  }

  pub fn current_time(&self) -> TicksTime {
    self.current_time
  }

  pub fn push(&mut self, event: &TimedEvent) -> Option<NoteRecord> {
    self.current_time.advance(event.delta);

    match event.kind {
      EventKind::NoteOn { key, velocity, .. } if velocity > 0 => {
        if let Some(slot) = self.open.get_mut(usize::from(key)) {
          *slot = Some(self.current_time);
        }
        None
      }
      EventKind::NoteOn { key, .. } | EventKind::NoteOff { key, .. } => self.close(key),
      _ => None,
    }
  }

  fn close(&mut self, key: u8) -> Option<NoteRecord> {
    let current_time = self.current_time;
    self
      .open
      .get_mut(usize::from(key))
      .and_then(Option::take)
      .map(|start| NoteRecord {
        pitch: key,
        position: start,
        duration: current_time - start,
      })
  }
}

/// Notes of a whole stream, in the order they end.
pub fn extract_notes<'e, 'a: 'e, I>(events: I) -> Vec<NoteRecord>
where
  I: IntoIterator<Item = &'e TimedEvent<'a>>,
{
  let mut extractor = NoteExtractor::new();
  events
    .into_iter()
    .filter_map(|event| extractor.push(event))
    .collect()
}
