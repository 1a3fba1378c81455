use midly::num::{u28, u4, u7};
use midly::{MidiMessage, TrackEvent, TrackEventKind};

pub type U4 = u8;
pub type U7 = u8;

/// Largest delta an SMF variable-length quantity can hold.
pub const MAX_DELTA: u32 = 0x0fff_ffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind<'a> {
  NoteOn { channel: U4, key: U7, velocity: U7 },

  NoteOff { channel: U4, key: U7, velocity: U7 },

  ProgramChange { channel: U4, program: U7 },

  /// Anything else found in a note file, kept untouched so it can be written back.
  Other(TrackEventKind<'a>),
}

/// One event of a stream, `delta` ticks after the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent<'a> {
  pub delta: u32,
  pub kind: EventKind<'a>,
}

impl<'a> TimedEvent<'a> {
  pub fn new(delta: u32, kind: EventKind<'a>) -> TimedEvent<'a> {
    TimedEvent {
      delta: delta.min(MAX_DELTA),
      kind,
    }
  }

  pub fn note_on(delta: u32, key: U7, velocity: U7) -> TimedEvent<'a> {
    TimedEvent::new(
      delta,
      EventKind::NoteOn {
        channel: 0,
        key,
        velocity,
      },
    )
  }

  pub fn note_off(delta: u32, key: U7) -> TimedEvent<'a> {
    TimedEvent::new(
      delta,
      EventKind::NoteOff {
        channel: 0,
        key,
        velocity: 0,
      },
    )
  }

  pub fn program_change(delta: u32, program: U7) -> TimedEvent<'a> {
    TimedEvent::new(
      delta,
      EventKind::ProgramChange {
        channel: 0,
        program,
      },
    )
  }

  pub fn is_end_of_track(&self) -> bool {
    match self.kind {
      EventKind::Other(TrackEventKind::Meta(midly::MetaMessage::EndOfTrack)) => true,
      _ => false,
    }
  }

  pub fn to_track_event(&self) -> TrackEvent<'a> {
    let kind = match self.kind {
      EventKind::NoteOn {
        channel,
        key,
        velocity,
      } => TrackEventKind::Midi {
        channel: u4::from_int_lossy(channel),
        message: MidiMessage::NoteOn {
          key: u7::from_int_lossy(key),
          vel: u7::from_int_lossy(velocity),
        },
      },
      EventKind::NoteOff {
        channel,
        key,
        velocity,
      } => TrackEventKind::Midi {
        channel: u4::from_int_lossy(channel),
        message: MidiMessage::NoteOff {
          key: u7::from_int_lossy(key),
          vel: u7::from_int_lossy(velocity),
        },
      },
      EventKind::ProgramChange { channel, program } => TrackEventKind::Midi {
        channel: u4::from_int_lossy(channel),
        message: MidiMessage::ProgramChange {
          program: u7::from_int_lossy(program),
        },
      },
      EventKind::Other(kind) => kind,
    };

    TrackEvent {
      delta: u28::from_int_lossy(self.delta.min(MAX_DELTA)),
      kind,
    }
  }
}

impl<'a> From<TrackEventKind<'a>> for EventKind<'a> {
  fn from(kind: TrackEventKind<'a>) -> Self {
    match kind {
      TrackEventKind::Midi { channel, message } => match message {
        MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
          channel: channel.as_int(),
          key: key.as_int(),
          velocity: vel.as_int(),
        },
        MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
          channel: channel.as_int(),
          key: key.as_int(),
          velocity: vel.as_int(),
        },
        MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
          channel: channel.as_int(),
          program: program.as_int(),
        },
        _ => EventKind::Other(kind),
      },
      _ => EventKind::Other(kind),
    }
  }
}

impl<'a> From<TrackEvent<'a>> for TimedEvent<'a> {
  fn from(event: TrackEvent<'a>) -> Self {
    TimedEvent {
      delta: event.delta.as_int(),
      kind: EventKind::from(event.kind),
    }
  }
}

impl<'a> From<&TrackEvent<'a>> for TimedEvent<'a> {
  fn from(event: &TrackEvent<'a>) -> Self {
    TimedEvent::from(*event)
  }
}

#[cfg(test)]
mod test {

  use super::{EventKind, TimedEvent, MAX_DELTA};
  use midly::num::{u28, u4, u7};
  use midly::{MetaMessage, MidiMessage, TrackEvent, TrackEventKind};

  fn midi(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
    TrackEvent {
      delta: u28::from_int_lossy(delta),
      kind: TrackEventKind::Midi {
        channel: u4::from_int_lossy(channel),
        message,
      },
    }
  }

  #[test]
  fn from_note_on() {
    let event = midi(
      10,
      3,
      MidiMessage::NoteOn {
        key: u7::from_int_lossy(60),
        vel: u7::from_int_lossy(90),
      },
    );
    assert_eq!(
      TimedEvent::from(event),
      TimedEvent {
        delta: 10,
        kind: EventKind::NoteOn {
          channel: 3,
          key: 60,
          velocity: 90
        }
      }
    );
  }

  #[test]
  fn from_note_off_and_program_change() {
    let off = midi(
      0,
      1,
      MidiMessage::NoteOff {
        key: u7::from_int_lossy(61),
        vel: u7::from_int_lossy(64),
      },
    );
    assert_eq!(
      TimedEvent::from(off).kind,
      EventKind::NoteOff {
        channel: 1,
        key: 61,
        velocity: 64
      }
    );

    let program = midi(
      5,
      0,
      MidiMessage::ProgramChange {
        program: u7::from_int_lossy(24),
      },
    );
    assert_eq!(TimedEvent::from(program), TimedEvent::program_change(5, 24));
  }

  #[test]
  fn other_kinds_are_kept_verbatim() {
    let controller = midi(
      7,
      2,
      MidiMessage::Controller {
        controller: u7::from_int_lossy(64),
        value: u7::from_int_lossy(127),
      },
    );
    let event = TimedEvent::from(controller);
    assert_eq!(event.kind, EventKind::Other(controller.kind));
    assert_eq!(event.to_track_event(), controller);

    let tempo = TrackEvent {
      delta: u28::from_int_lossy(0),
      kind: TrackEventKind::Meta(MetaMessage::Tempo(midly::num::u24::from_int_lossy(500_000))),
    };
    assert_eq!(TimedEvent::from(tempo).to_track_event(), tempo);
  }

  #[test]
  fn to_track_event_keeps_channel_and_values() {
    let event = TimedEvent::new(
      96,
      EventKind::NoteOn {
        channel: 9,
        key: 36,
        velocity: 100,
      },
    );
    assert_eq!(
      event.to_track_event(),
      midi(
        96,
        9,
        MidiMessage::NoteOn {
          key: u7::from_int_lossy(36),
          vel: u7::from_int_lossy(100),
        }
      )
    );
  }

  #[test]
  fn new_clamps_delta() {
    let event = TimedEvent::note_off(u32::max_value(), 60);
    assert_eq!(event.delta, MAX_DELTA);
  }

  #[test]
  fn end_of_track() {
    let event = TimedEvent::new(0, EventKind::Other(TrackEventKind::Meta(MetaMessage::EndOfTrack)));
    assert!(event.is_end_of_track());
    assert!(!TimedEvent::note_on(0, 60, 1).is_end_of_track());
  }
}
