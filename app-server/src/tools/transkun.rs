use std::path::Path;

use log::info;

use super::{Command, ToolError, ToolResult, Transcriber};
use crate::config::Transcription;

/// Runs the transkun command line: `transkun <audio> <notes> --device <device>`.
pub struct TranskunTranscriber {
  program: String,
  device: String,
  extra_args: Vec<String>,
}

impl TranskunTranscriber {
  pub fn new(config: &Transcription) -> TranskunTranscriber {
    TranskunTranscriber {
      program: config.program.clone(),
      device: config.device.clone(),
      extra_args: config.extra_args.clone(),
    }
  }

  pub fn command(&self, audio: &Path, notes: &Path) -> Command {
    Command::new(self.program.as_str())
      .arg(audio.as_os_str())
      .arg(notes.as_os_str())
      .arg("--device")
      .arg(self.device.as_str())
      .args(self.extra_args.iter().map(String::as_str))
  }
}

impl Transcriber for TranskunTranscriber {
  fn transcribe(&self, audio: &Path, notes: &Path) -> ToolResult<()> {
    info!("Transcribing {:?} into {:?} ...", audio, notes);

    self.command(audio, notes).run_logged()?;

    if notes.is_file() {
      Ok(())
    } else {
      Err(ToolError::MissingOutput {
        program: self.program.clone(),
        path: notes.display().to_string(),
      })
    }
  }
}
