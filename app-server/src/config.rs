use failure::Fail;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

#[derive(Debug, Fail)]
pub enum AppConfigError {
  #[fail(display = "Failed to read the configuration from {}: {}", path, cause)]
  Read { path: String, cause: String },

  #[fail(display = "Invalid configuration: {}", cause)]
  Parse { cause: String },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
  pub http: Http,
  pub separation: Separation,
  pub transcription: Transcription,
  pub mixer: Mixer,
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, AppConfigError>
  where
    T: Into<&'a str>,
  {
    let path_str = path.into();
    let mut content = String::new();
    File::open(path_str)
      .and_then(|mut file| file.read_to_string(&mut content))
      .map_err(|err| AppConfigError::Read {
        path: path_str.to_string(),
        cause: err.to_string(),
      })?;
    Config::from_str(content.as_str())
  }

  pub fn from_str<'a, T>(content: T) -> Result<Config, AppConfigError>
  where
    T: Into<&'a str>,
  {
    toml::from_str(content.into()).map_err(|err| AppConfigError::Parse {
      cause: err.to_string(),
    })
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Http {
  pub host: String,
  pub port: u16,
  pub static_dir: PathBuf,
  pub max_upload_bytes: usize,
}

impl Default for Http {
  fn default() -> Http {
    Http {
      host: "127.0.0.1".to_string(),
      port: 5000,
      static_dir: PathBuf::from("./static"),
      max_upload_bytes: 256 * 1024 * 1024,
    }
  }
}

impl Http {
  pub fn address(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Separation {
  pub program: String,
  pub device: String,
  pub extra_args: Vec<String>,
}

impl Default for Separation {
  fn default() -> Separation {
    Separation {
      program: "demucs".to_string(),
      device: "cpu".to_string(),
      extra_args: Vec::new(),
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Transcription {
  pub program: String,
  pub device: String,
  pub extra_args: Vec<String>,
  pub workers: usize,
}

impl Default for Transcription {
  fn default() -> Transcription {
    Transcription {
      program: "transkun".to_string(),
      device: "cpu".to_string(),
      extra_args: Vec::new(),
      workers: 2,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Mixer {
  pub program: String,
}

impl Default for Mixer {
  fn default() -> Mixer {
    Mixer {
      program: "ffmpeg".to_string(),
    }
  }
}
