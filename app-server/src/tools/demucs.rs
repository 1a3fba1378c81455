use std::path::{Path, PathBuf};

use log::info;

use stemscribe_core::config::Storage;

use super::{Command, Separator, ToolError, ToolResult};
use crate::config::Separation;

/// Runs the demucs command line, which writes one directory per input under
/// `<output root>/<model>/<input base name>`.
pub struct DemucsSeparator {
  program: String,
  model: String,
  device: String,
  output_root: PathBuf,
  extra_args: Vec<String>,
}

impl DemucsSeparator {
  pub fn new(config: &Separation, storage: &Storage) -> DemucsSeparator {
    DemucsSeparator {
      program: config.program.clone(),
      model: storage.model.clone(),
      device: config.device.clone(),
      output_root: storage.separated_root.clone(),
      extra_args: config.extra_args.clone(),
    }
  }

  pub fn command(&self, input: &Path) -> Command {
    Command::new(self.program.as_str())
      .arg("--mp3")
      .arg("-n")
      .arg(self.model.as_str())
      .arg("-d")
      .arg(self.device.as_str())
      .arg("-o")
      .arg(self.output_root.as_os_str())
      .args(self.extra_args.iter().map(String::as_str))
      .arg(input.as_os_str())
  }

  pub fn output_dir(&self, input: &Path) -> PathBuf {
    let base_name = input
      .file_stem()
      .map(|stem| stem.to_os_string())
      .unwrap_or_default();
    self.output_root.join(&self.model).join(base_name)
  }
}

impl Separator for DemucsSeparator {
  fn separate(&self, input: &Path) -> ToolResult<PathBuf> {
    info!("Separating {:?} with {} ...", input, self.model);

    self.command(input).run_logged()?;

    let output_dir = self.output_dir(input);
    if output_dir.is_dir() {
      Ok(output_dir)
    } else {
      Err(ToolError::MissingOutput {
        program: self.program.clone(),
        path: output_dir.display().to_string(),
      })
    }
  }
}
