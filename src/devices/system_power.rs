//! Host halt/reboot through external commands

use crate::config::PowerConfig;
use crate::core::driver::PowerControl;
use crate::error::{Error, Result};
use std::process::Command;

/// Runs the configured shutdown program (by default `sudo shutdown -h now`).
///
/// `shutdown` returns as soon as the request is queued, so a zero exit status
/// means the OS accepted it. Anything else is reported as a failed action.
pub struct SystemPower {
    halt_command: Vec<String>,
    reboot_command: Vec<String>,
}

impl SystemPower {
    pub fn new(config: &PowerConfig) -> Self {
        Self {
            halt_command: config.halt_command.clone(),
            reboot_command: config.reboot_command.clone(),
        }
    }

    fn run(action: &'static str, command: &[String]) -> Result<()> {
        let Some((program, args)) = command.split_first() else {
            return Err(Error::PrivilegedAction {
                action,
                message: "no command configured".to_string(),
            });
        };

        log::warn!("Requesting host {}: {}", action, command.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::PrivilegedAction {
                action,
                message: format!("failed to spawn {}: {}", program, e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::info!("{}: {}", program, stdout.trim());
        }
        if output.status.success() {
            return Ok(());
        }
        Err(Error::PrivilegedAction {
            action,
            message: format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        })
    }
}

impl PowerControl for SystemPower {
    fn halt_now(&self) -> Result<()> {
        Self::run("halt", &self.halt_command)
    }

    fn reboot_now(&self) -> Result<()> {
        Self::run("reboot", &self.reboot_command)
    }
}
