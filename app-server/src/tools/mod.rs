mod command;
mod demucs;
mod ffmpeg;
mod transkun;

pub use self::command::{Command, CommandOutput};
pub use self::demucs::DemucsSeparator;
pub use self::ffmpeg::FfmpegMixer;
pub use self::transkun::TranskunTranscriber;

use std::path::{Path, PathBuf};

use failure::Fail;

#[derive(Debug, Fail)]
pub enum ToolError {
  #[fail(display = "Failed to launch {}: {}", program, cause)]
  Launch { program: String, cause: String },

  #[fail(display = "{} failed with {}", program, status)]
  Failed {
    program: String,
    status: String,
    stderr: String,
  },

  #[fail(display = "{} did not produce {}", program, path)]
  MissingOutput { program: String, path: String },

  #[fail(display = "Nothing to mix")]
  NoInputs,
}

impl ToolError {
  /// Diagnostic output captured from the failing tool, if any.
  pub fn details(&self) -> Option<&str> {
    match self {
      ToolError::Failed { stderr, .. } => Some(stderr.as_str()),
      _ => None,
    }
  }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Splits a song into stems and returns the directory holding them.
pub trait Separator: Send + Sync {
  fn separate(&self, input: &Path) -> ToolResult<PathBuf>;
}

/// Writes the note file transcribed from one stem.
pub trait Transcriber: Send + Sync {
  fn transcribe(&self, audio: &Path, notes: &Path) -> ToolResult<()>;
}

/// Overlays audio files and returns the encoded result.
pub trait Mixer: Send + Sync {
  fn mix(&self, inputs: &[PathBuf]) -> ToolResult<Vec<u8>>;
}
