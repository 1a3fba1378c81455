use std::ffi::OsString;
use std::process;

use log::{debug, trace};

use super::{ToolError, ToolResult};

pub struct CommandOutput {
  pub stdout: Vec<u8>,
  pub stderr: String,
}

/// An external program run to completion with its output captured.
#[derive(Debug, Clone)]
pub struct Command {
  program: String,
  args: Vec<OsString>,
}

impl Command {
  pub fn new<T>(program: T) -> Command
  where
    T: Into<String>,
  {
    Command {
      program: program.into(),
      args: Vec::new(),
    }
  }

  pub fn arg<T>(mut self, arg: T) -> Command
  where
    T: Into<OsString>,
  {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, T>(mut self, args: I) -> Command
  where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn run(&self) -> ToolResult<CommandOutput> {
    debug!("Running {} {:?} ...", self.program, self.args);

    let output = process::Command::new(&self.program)
      .args(&self.args)
      .stdin(process::Stdio::null())
      .output()
      .map_err(|err| ToolError::Launch {
        program: self.program.clone(),
        cause: err.to_string(),
      })?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    trace!("{} stderr: {}", self.program, stderr);

    if output.status.success() {
      Ok(CommandOutput {
        stdout: output.stdout,
        stderr,
      })
    } else {
      debug!("{} failed: {}", self.program, stderr);
      Err(ToolError::Failed {
        program: self.program.clone(),
        status: output.status.to_string(),
        stderr,
      })
    }
  }

  /// Runs the command and logs its textual output.
  pub fn run_logged(&self) -> ToolResult<()> {
    self.run().map(|output| {
      debug!(
        "{} output: {}",
        self.program,
        String::from_utf8_lossy(&output.stdout)
      );
    })
  }
}
