use std::process::Command;

use crate::config::Elevation;
use crate::error::CommandError;

/// Synchronous request-and-wait execution of a shell script with elevated
/// privileges. May block for as long as the OS credential prompt is open.
pub trait ElevatedExecutor: Send {
    /// Returns trimmed stdout on success.
    fn run(&self, script: &str) -> Result<String, CommandError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ShellElevator {
    elevation: Elevation,
}

impl ShellElevator {
    pub fn new(elevation: Elevation) -> Self {
        Self {
            elevation: elevation.resolve(),
        }
    }

    fn command(&self, script: &str) -> Command {
        match self.elevation {
            Elevation::Osascript => {
                let mut cmd = Command::new("osascript");
                cmd.arg("-e").arg(format!(
                    "do shell script \"{}\" with administrator privileges",
                    applescript_escape(script)
                ));
                cmd
            }
            Elevation::Pkexec | Elevation::Sudo => {
                let program = if self.elevation == Elevation::Sudo {
                    "sudo"
                } else {
                    "pkexec"
                };
                let mut cmd = Command::new(program);
                cmd.args(["sh", "-c", script]);
                cmd
            }
            Elevation::Direct | Elevation::Auto => {
                let mut cmd = Command::new("sh");
                cmd.args(["-c", script]);
                cmd
            }
        }
    }
}

fn applescript_escape(script: &str) -> String {
    script.replace('\\', "\\\\").replace('"', "\\\"")
}

impl ElevatedExecutor for ShellElevator {
    fn run(&self, script: &str) -> Result<String, CommandError> {
        let mut cmd = self.command(script);
        let program = cmd.get_program().to_string_lossy().into_owned();
        tracing::debug!(program = %program, "running elevated command");

        let output = cmd.output().map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
