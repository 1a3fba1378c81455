use failure::Fail;
use log::debug;

use midly::Smf;

use crate::instrument::program_for_label;
use crate::midi::file::{parallel_header, write_smf, NoteFileResult};
use crate::midi::TimedEvent;
use crate::time::DEFAULT_TICKS_PER_BEAT;

#[derive(Debug, Fail, PartialEq)]
pub enum MergeError {
  #[fail(display = "No note stream available for {}", label)]
  MissingSource { label: String },
}

/// One instrument's part in a combined stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Track<'a> {
  pub label: String,
  pub program: u8,
  pub events: Vec<TimedEvent<'a>>,
}

/// Tracks sharing a tick resolution, each on its own time line.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedStream<'a> {
  ticks_per_beat: u16,
  tracks: Vec<Track<'a>>,
}

impl<'a> CombinedStream<'a> {
  pub fn new(ticks_per_beat: u16) -> CombinedStream<'a> {
    CombinedStream {
      ticks_per_beat,
      tracks: Vec::new(),
    }
  }

  pub fn ticks_per_beat(&self) -> u16 {
    self.ticks_per_beat
  }

  pub fn tracks(&self) -> &[Track<'a>] {
    &self.tracks
  }

  pub fn track(&self, index: usize) -> Option<&Track<'a>> {
    self.tracks.get(index)
  }

  pub fn push(&mut self, track: Track<'a>) {
    self.tracks.push(track);
  }

  pub fn to_smf(&self) -> Smf<'a> {
    Smf {
      header: parallel_header(self.ticks_per_beat),
      tracks: self
        .tracks
        .iter()
        .map(|track| track.events.iter().map(TimedEvent::to_track_event).collect())
        .collect(),
    }
  }

  pub fn write(&self) -> NoteFileResult<Vec<u8>> {
    write_smf(&self.to_smf())
  }
}

pub struct TrackMerger {
  ticks_per_beat: u16,
}

impl Default for TrackMerger {
  fn default() -> Self {
    TrackMerger::new(DEFAULT_TICKS_PER_BEAT)
  }
}

impl TrackMerger {
  pub fn new(ticks_per_beat: u16) -> TrackMerger {
    TrackMerger { ticks_per_beat }
  }

  /// Builds the track for one source: a program change for the label's
  /// instrument followed by the source events as they are.
  pub fn track<'a, L, S>(&self, label: L, source: S) -> Track<'a>
  where
    L: Into<String>,
    S: IntoIterator<Item = TimedEvent<'a>>,
  {
    let label = label.into();
    let program = program_for_label(&label);
    debug!("Adding track {} with program {}", label, program);

    let mut events = vec![TimedEvent::program_change(0, program)];
    events.extend(source);

    Track {
      label,
      program,
      events,
    }
  }

  /// One output track per `(label, stream)` pair, in the given order.
  pub fn merge<'a, I, L, S>(&self, sources: I) -> CombinedStream<'a>
  where
    I: IntoIterator<Item = (L, S)>,
    L: Into<String>,
    S: IntoIterator<Item = TimedEvent<'a>>,
  {
    let mut combined = CombinedStream::new(self.ticks_per_beat);
    for (label, source) in sources.into_iter() {
      combined.push(self.track(label, source));
    }
    combined
  }

  /// Like `merge`, looking up each label's stream. The first label without
  /// a stream fails the whole merge.
  pub fn merge_from<'a, L, F, S>(
    &self,
    labels: &[L],
    mut lookup: F,
  ) -> Result<CombinedStream<'a>, MergeError>
  where
    L: AsRef<str>,
    F: FnMut(&str) -> Option<S>,
    S: IntoIterator<Item = TimedEvent<'a>>,
  {
    let mut combined = CombinedStream::new(self.ticks_per_beat);
    for label in labels.iter() {
      let label = label.as_ref();
      let source = lookup(label).ok_or_else(|| MergeError::MissingSource {
        label: label.to_string(),
      })?;
      combined.push(self.track(label, source));
    }
    Ok(combined)
  }
}
