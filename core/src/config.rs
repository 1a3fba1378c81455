use failure::Fail;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::layout::StemLayout;
use crate::time::{DEFAULT_TICKS_PER_BEAT, MAX_TICKS_PER_BEAT};

#[derive(Debug, Fail)]
pub enum ConfigError {
  #[fail(display = "Failed to read the configuration from {}: {}", path, cause)]
  Read { path: String, cause: String },

  #[fail(display = "Invalid configuration: {}", cause)]
  Parse { cause: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Storage {
  pub upload_dir: PathBuf,
  pub separated_root: PathBuf,
  pub model: String,
  pub audio_extension: String,
  pub note_extension: String,
}

impl Default for Storage {
  fn default() -> Storage {
    Storage {
      upload_dir: PathBuf::from("./uploads"),
      separated_root: PathBuf::from("./separated"),
      model: "htdemucs_6s".to_string(),
      audio_extension: "mp3".to_string(),
      note_extension: "midi".to_string(),
    }
  }
}

impl Storage {
  /// Where the separation model leaves one directory per upload.
  pub fn stems_root(&self) -> PathBuf {
    self.separated_root.join(&self.model)
  }

  pub fn layout(&self) -> StemLayout {
    StemLayout::new(
      self.stems_root(),
      self.audio_extension.as_str(),
      self.note_extension.as_str(),
    )
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Midi {
  pub ticks_per_beat: u16,
}

impl Default for Midi {
  fn default() -> Midi {
    Midi {
      ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
    }
  }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
  pub storage: Storage,
  pub midi: Midi,
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> ConfigResult<Config>
  where
    T: Into<&'a str>,
  {
    let path_str = path.into();
    let mut content = String::new();
    File::open(path_str)
      .and_then(|mut file| file.read_to_string(&mut content))
      .map_err(|err| ConfigError::Read {
        path: path_str.to_string(),
        cause: err.to_string(),
      })?;
    Config::from_str(content.as_str())
  }

  pub fn from_str<'a, T>(content: T) -> ConfigResult<Config>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into()).map_err(|err| ConfigError::Parse {
      cause: err.to_string(),
    })?;

    let ticks_per_beat = config.midi.ticks_per_beat;
    if ticks_per_beat == 0 || ticks_per_beat > MAX_TICKS_PER_BEAT {
      return Err(ConfigError::Parse {
        cause: format!(
          "midi.ticks_per_beat must be between 1 and {}, found {}",
          MAX_TICKS_PER_BEAT, ticks_per_beat
        ),
      });
    }

    Ok(config)
  }
}

#[cfg(test)]
mod test {

  use super::{Config, ConfigError};
  use std::path::PathBuf;

  #[test]
  pub fn defaults() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config.storage.upload_dir, PathBuf::from("./uploads"));
    assert_eq!(
      config.storage.stems_root(),
      PathBuf::from("./separated/htdemucs_6s")
    );
    assert_eq!(config.storage.audio_extension, "mp3");
    assert_eq!(config.storage.note_extension, "midi");
    assert_eq!(config.midi.ticks_per_beat, 480);
  }

  #[test]
  pub fn partial_sections() {
    let config = Config::from_str(
      r#"
      [storage]
      model = "htdemucs"
      note_extension = "mid"

      [midi]
      ticks_per_beat = 960

      [http]
      port = 8080
      "#,
    )
    .unwrap();
    assert_eq!(config.storage.model, "htdemucs");
    assert_eq!(config.storage.audio_extension, "mp3");
    assert_eq!(config.storage.note_extension, "mid");
    assert_eq!(config.midi.ticks_per_beat, 960);
  }

  #[test]
  pub fn invalid_content() {
    match Config::from_str("[midi]\nticks_per_beat = \"many\"") {
      Err(ConfigError::Parse { .. }) => {}
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[test]
  pub fn ticks_per_beat_out_of_range() {
    for value in &[0u32, 32768, 40000] {
      let content = format!("[midi]\nticks_per_beat = {}", value);
      match Config::from_str(content.as_str()) {
        Err(ConfigError::Parse { cause }) => assert!(cause.contains("ticks_per_beat")),
        other => panic!("unexpected result {:?}", other),
      }
    }

    let config = Config::from_str("[midi]\nticks_per_beat = 32767").unwrap();
    assert_eq!(config.midi.ticks_per_beat, 32767);
  }

  #[test]
  pub fn missing_file() {
    match Config::from_file("/no/such/stemscribe.toml") {
      Err(ConfigError::Read { path, .. }) => assert_eq!(path, "/no/such/stemscribe.toml"),
      other => panic!("unexpected result {:?}", other),
    }
  }
}
