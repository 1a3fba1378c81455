use std::fs;
use std::path::Path;

use failure::Fail;
use log::debug;

use midly::num::u7;
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::midi::event::{EventKind, TimedEvent};

#[derive(Debug, Fail)]
pub enum NoteFileError {
  #[fail(display = "Failed to read note file {}: {}", path, cause)]
  Read { path: String, cause: String },

  #[fail(display = "Failed to parse note file: {}", cause)]
  Parse { cause: String },

  #[fail(display = "Failed to write note file: {}", cause)]
  Write { cause: String },
}

pub type NoteFileResult<T> = Result<T, NoteFileError>;

/// The raw bytes of a Standard MIDI File. Parsed views borrow from it.
#[derive(Debug, Clone)]
pub struct NoteFile {
  bytes: Vec<u8>,
}

impl NoteFile {
  pub fn open<P>(path: P) -> NoteFileResult<NoteFile>
  where
    P: AsRef<Path>,
  {
    let path = path.as_ref();
    debug!("Loading note file {:?} ...", path);
    fs::read(path)
      .map(NoteFile::from_bytes)
      .map_err(|err| NoteFileError::Read {
        path: path.display().to_string(),
        cause: err.to_string(),
      })
  }

  pub fn from_bytes(bytes: Vec<u8>) -> NoteFile {
    NoteFile { bytes }
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn parse(&self) -> NoteFileResult<Smf<'_>> {
    Smf::parse(&self.bytes).map_err(|err| NoteFileError::Parse {
      cause: err.to_string(),
    })
  }

  pub fn ticks_per_beat(&self) -> NoteFileResult<Option<u16>> {
    self.parse().map(|smf| match smf.header.timing {
      Timing::Metrical(ticks) => Some(ticks.as_int()),
      Timing::Timecode(..) => None,
    })
  }

  /// All the tracks of the file as a single stream ordered by absolute time.
  ///
  /// Events at the same tick keep the order of their tracks in the file.
  /// End-of-track markers are dropped and a single one closes the stream.
  pub fn events(&self) -> NoteFileResult<Vec<TimedEvent<'_>>> {
    let smf = self.parse()?;
    Ok(merge_tracks(&smf.tracks))
  }

  /// Rewrites every program change of every track to `program`.
  ///
  /// Returns the new file contents and how many events were rewritten.
  pub fn relabel_program(&self, program: u8) -> NoteFileResult<(Vec<u8>, usize)> {
    let mut smf = self.parse()?;
    let program = u7::from_int_lossy(program);
    let mut count = 0;

    for track in smf.tracks.iter_mut() {
      for event in track.iter_mut() {
        if let TrackEventKind::Midi {
          message: MidiMessage::ProgramChange { program: ref mut current },
          ..
        } = event.kind
        {
          *current = program;
          count += 1;
        }
      }
    }

    write_smf(&smf).map(|bytes| (bytes, count))
  }
}

pub fn merge_tracks<'a>(tracks: &[Vec<TrackEvent<'a>>]) -> Vec<TimedEvent<'a>> {
  let mut timeline: Vec<(u64, TimedEvent<'a>)> = Vec::new();

  for track in tracks.iter() {
    let mut time = 0u64;
    for event in track.iter() {
      time += u64::from(event.delta.as_int());
      let event = TimedEvent::from(event);
      if !event.is_end_of_track() {
        timeline.push((time, event));
      }
    }
  }

  // stable: same-tick events keep their track order
  timeline.sort_by_key(|(time, _)| *time);

  let mut events = Vec::with_capacity(timeline.len() + 1);
  let mut last = 0u64;
  for (time, event) in timeline.into_iter() {
    events.push(TimedEvent::new(delta_between(last, time), event.kind));
    last = time;
  }

  let end = tracks
    .iter()
    .map(|track| {
      track
        .iter()
        .map(|event| u64::from(event.delta.as_int()))
        .sum::<u64>()
    })
    .max()
    .unwrap_or(0);

  events.push(TimedEvent::new(
    delta_between(last, end.max(last)),
    end_of_track(),
  ));

  events
}

pub fn write_smf(smf: &Smf<'_>) -> NoteFileResult<Vec<u8>> {
  let mut bytes = Vec::new();
  smf
    .write_std(&mut bytes)
    .map_err(|err| NoteFileError::Write {
      cause: err.to_string(),
    })?;
  Ok(bytes)
}

pub fn parallel_header(ticks_per_beat: u16) -> Header {
  Header::new(
    Format::Parallel,
    Timing::Metrical(midly::num::u15::from_int_lossy(ticks_per_beat)),
  )
}

fn end_of_track<'a>() -> EventKind<'a> {
  EventKind::Other(TrackEventKind::Meta(MetaMessage::EndOfTrack))
}

fn delta_between(from: u64, to: u64) -> u32 {
  let delta = to.saturating_sub(from);
  if delta > u64::from(u32::max_value()) {
    u32::max_value()
  } else {
    delta as u32
  }
}

#[cfg(test)]
mod test {

  use super::{merge_tracks, parallel_header, write_smf, NoteFile, NoteFileError};
  use crate::midi::event::{EventKind, TimedEvent};
  use midly::num::{u28, u4, u7};
  use midly::{MetaMessage, MidiMessage, Smf, TrackEvent, TrackEventKind};

  fn note(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
    TrackEvent {
      delta: u28::from_int_lossy(delta),
      kind: TrackEventKind::Midi {
        channel: u4::from_int_lossy(0),
        message: MidiMessage::NoteOn {
          key: u7::from_int_lossy(key),
          vel: u7::from_int_lossy(vel),
        },
      },
    }
  }

  fn program(delta: u32, program: u8) -> TrackEvent<'static> {
    TrackEvent {
      delta: u28::from_int_lossy(delta),
      kind: TrackEventKind::Midi {
        channel: u4::from_int_lossy(0),
        message: MidiMessage::ProgramChange {
          program: u7::from_int_lossy(program),
        },
      },
    }
  }

  fn end(delta: u32) -> TrackEvent<'static> {
    TrackEvent {
      delta: u28::from_int_lossy(delta),
      kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
  }

  fn file(tracks: Vec<Vec<TrackEvent<'static>>>) -> NoteFile {
    let smf = Smf {
      header: parallel_header(220),
      tracks,
    };
    NoteFile::from_bytes(write_smf(&smf).unwrap())
  }

  #[test]
  fn merge_single_track() {
    let tracks = vec![vec![note(0, 60, 90), note(100, 60, 0), end(20)]];
    let events = merge_tracks(&tracks);
    assert_eq!(
      events,
      vec![
        TimedEvent::note_on(0, 60, 90),
        TimedEvent::note_on(100, 60, 0),
        TimedEvent::new(20, EventKind::Other(TrackEventKind::Meta(MetaMessage::EndOfTrack))),
      ]
    );
  }

  #[test]
  fn merge_interleaves_tracks_by_absolute_time() {
    let tracks = vec![
      vec![note(0, 60, 90), note(100, 60, 0), end(0)],
      vec![note(50, 64, 80), note(100, 64, 0), end(0)],
    ];
    let events = merge_tracks(&tracks);
    let expected = vec![
      TimedEvent::note_on(0, 60, 90),
      TimedEvent::note_on(50, 64, 80),
      TimedEvent::note_on(50, 60, 0),
      TimedEvent::note_on(50, 64, 0),
    ];
    assert_eq!(&events[..4], &expected[..]);
    assert!(events[4].is_end_of_track());
    assert_eq!(events[4].delta, 0);
    assert_eq!(events.len(), 5);
  }

  #[test]
  fn merge_keeps_track_order_for_same_tick() {
    let tracks = vec![vec![note(10, 60, 90), end(0)], vec![note(10, 62, 90), end(0)]];
    let events = merge_tracks(&tracks);
    assert_eq!(events[0], TimedEvent::note_on(10, 60, 90));
    assert_eq!(events[1], TimedEvent::note_on(0, 62, 90));
  }

  #[test]
  fn merge_empty() {
    let events = merge_tracks(&[]);
    assert_eq!(events.len(), 1);
    assert!(events[0].is_end_of_track());
  }

  #[test]
  fn events_from_file() {
    let note_file = file(vec![vec![program(0, 5), note(0, 60, 90), note(480, 60, 0), end(0)]]);
    assert_eq!(note_file.ticks_per_beat().unwrap(), Some(220));
    let events = note_file.events().unwrap();
    assert_eq!(events[0], TimedEvent::program_change(0, 5));
    assert_eq!(events[2], TimedEvent::note_on(480, 60, 0));
  }

  #[test]
  fn parse_garbage() {
    let note_file = NoteFile::from_bytes(b"definitely not a midi file".to_vec());
    match note_file.events() {
      Err(NoteFileError::Parse { .. }) => {}
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[test]
  fn open_missing_file() {
    match NoteFile::open("/this/path/does/not/exist.midi") {
      Err(NoteFileError::Read { path, .. }) => assert!(path.ends_with("exist.midi")),
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[test]
  fn open_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("piano.midi");
    let source = file(vec![vec![note(0, 60, 90), note(10, 60, 0), end(0)]]);
    std::fs::write(&path, source.bytes()).unwrap();
    let loaded = NoteFile::open(&path).unwrap();
    assert_eq!(loaded.bytes(), source.bytes());
  }

  #[test]
  fn relabel_program_rewrites_every_program_change() {
    let note_file = file(vec![
      vec![program(0, 5), note(0, 60, 90), note(10, 60, 0), end(0)],
      vec![program(0, 7), program(20, 9), end(0)],
    ]);
    let (bytes, count) = note_file.relabel_program(32).unwrap();
    assert_eq!(count, 3);

    let relabelled = NoteFile::from_bytes(bytes);
    let programs: Vec<u8> = relabelled
      .events()
      .unwrap()
      .iter()
      .filter_map(|event| match event.kind {
        EventKind::ProgramChange { program, .. } => Some(program),
        _ => None,
      })
      .collect();
    assert_eq!(programs, vec![32, 32, 32]);
  }

  #[test]
  fn relabel_program_without_program_changes() {
    let note_file = file(vec![vec![note(0, 60, 90), note(10, 60, 0), end(0)]]);
    let (bytes, count) = note_file.relabel_program(24).unwrap();
    assert_eq!(count, 0);
    assert_eq!(
      NoteFile::from_bytes(bytes).events().unwrap(),
      note_file.events().unwrap()
    );
  }
}
