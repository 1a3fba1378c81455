use std::path::PathBuf;

use log::info;

use super::{Command, Mixer, ToolError, ToolResult};
use crate::config;

/// Overlays stems sample by sample with ffmpeg's `amix` and encodes mp3.
///
/// The mix lasts as long as the first input and keeps the original levels.
pub struct FfmpegMixer {
  program: String,
}

impl FfmpegMixer {
  pub fn new(config: &config::Mixer) -> FfmpegMixer {
    FfmpegMixer {
      program: config.program.clone(),
    }
  }

  pub fn command(&self, inputs: &[PathBuf]) -> Command {
    let mut command = Command::new(self.program.as_str())
      .arg("-hide_banner")
      .arg("-loglevel")
      .arg("error");

    for input in inputs.iter() {
      command = command.arg("-i").arg(input.as_os_str());
    }

    command
      .arg("-filter_complex")
      .arg(format!(
        "amix=inputs={}:duration=first:normalize=0",
        inputs.len()
      ))
      .arg("-f")
      .arg("mp3")
      .arg("pipe:1")
  }
}

impl Mixer for FfmpegMixer {
  fn mix(&self, inputs: &[PathBuf]) -> ToolResult<Vec<u8>> {
    if inputs.is_empty() {
      return Err(ToolError::NoInputs);
    }

    info!("Mixing {} stems ...", inputs.len());
    self.command(inputs).run().map(|output| output.stdout)
  }
}
