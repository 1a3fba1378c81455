use std::fmt;

/// The pitched stems that get transcribed, with their General MIDI program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Instrument {
  Piano,
  Guitar,
  Bass,
}

/// Program used for labels outside the instrument table.
pub const DEFAULT_PROGRAM: u8 = 0;

impl Instrument {
  pub const ALL: [Instrument; 3] = [Instrument::Piano, Instrument::Guitar, Instrument::Bass];

  pub fn label(self) -> &'static str {
    match self {
      Instrument::Piano => "piano",
      Instrument::Guitar => "guitar",
      Instrument::Bass => "bass",
    }
  }

  pub fn program(self) -> u8 {
    match self {
      Instrument::Piano => 0,   // Acoustic Grand Piano
      Instrument::Guitar => 24, // Acoustic Guitar (nylon)
      Instrument::Bass => 32,   // Acoustic Bass
    }
  }

  pub fn from_label(label: &str) -> Option<Instrument> {
    Self::ALL
      .iter()
      .cloned()
      .find(|instrument| instrument.label().eq_ignore_ascii_case(label.trim()))
  }

  /// Finds the instrument whose label appears anywhere in a stem file name.
  pub fn match_stem(file_name: &str) -> Option<Instrument> {
    let file_name = file_name.to_lowercase();
    Self::ALL
      .iter()
      .cloned()
      .find(|instrument| file_name.contains(instrument.label()))
  }
}

impl fmt::Display for Instrument {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.label())
  }
}

pub fn program_for_label(label: &str) -> u8 {
  Instrument::from_label(label)
    .map(Instrument::program)
    .unwrap_or(DEFAULT_PROGRAM)
}
