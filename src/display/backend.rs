//! Display Utility Backend
//!
//! Command/query boundary to the external display-configuration utility.
//! Every invocation is bounded by a timeout so a hung utility cannot stall
//! the session task.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::DisplayConfig;
use crate::display::types::{Orientation, RelativePosition, Resolution};
use crate::display::{DisplayError, Result};

/// Mode selection for [`OutputCommand::SetMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelection {
    /// Let the utility negotiate the preferred mode
    Auto,
    /// Force a specific mode
    Explicit(Resolution),
}

/// Output power state for [`OutputCommand::SetPower`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Enable the output at its preferred mode
    On,
    /// Disable the output
    Off,
}

/// A single mutating command against one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputCommand {
    /// Drive the output at auto or an explicit mode
    SetMode {
        /// Target output
        output: String,
        /// Mode to use
        mode: ModeSelection,
    },

    /// Place the output relative to a reference output
    SetPosition {
        /// Target output
        output: String,
        /// Relation to the reference; must be placeable
        relation: RelativePosition,
        /// Reference output (normally the primary)
        reference: String,
    },

    /// Rotate the output
    SetRotation {
        /// Target output
        output: String,
        /// New orientation
        orientation: Orientation,
    },

    /// Power the output on or off
    SetPower {
        /// Target output
        output: String,
        /// New power state
        state: PowerState,
    },
}

impl OutputCommand {
    /// Target output of this command
    pub fn output(&self) -> &str {
        match self {
            OutputCommand::SetMode { output, .. }
            | OutputCommand::SetPosition { output, .. }
            | OutputCommand::SetRotation { output, .. }
            | OutputCommand::SetPower { output, .. } => output,
        }
    }

    /// Short action description used in notifications and errors
    pub fn action(&self) -> String {
        match self {
            OutputCommand::SetMode { mode: ModeSelection::Auto, .. } => "auto-negotiate mode".into(),
            OutputCommand::SetMode { mode: ModeSelection::Explicit(res), .. } => {
                format!("set mode {}", res)
            }
            OutputCommand::SetPosition { relation, reference, .. } => {
                format!("place {} {}", relation, reference)
            }
            OutputCommand::SetRotation { orientation, .. } => format!("rotate to {}", orientation),
            OutputCommand::SetPower { state: PowerState::On, .. } => "power on".into(),
            OutputCommand::SetPower { state: PowerState::Off, .. } => "power off".into(),
        }
    }

    /// xrandr argument vector for this command
    pub fn to_xrandr_args(&self) -> Result<Vec<String>> {
        let mut args = vec!["--output".to_string(), self.output().to_string()];

        match self {
            OutputCommand::SetMode { mode: ModeSelection::Auto, .. } => {
                args.push("--auto".into());
            }
            OutputCommand::SetMode { mode: ModeSelection::Explicit(res), .. } => {
                args.push("--mode".into());
                args.push(res.to_string());
            }
            OutputCommand::SetPosition { relation, reference, .. } => {
                if !relation.is_placeable() {
                    return Err(DisplayError::InvalidRequest(format!(
                        "cannot place {} with relation {}",
                        self.output(),
                        relation
                    )));
                }
                args.push(format!("--{}", relation.as_str()));
                args.push(reference.clone());
            }
            OutputCommand::SetRotation { orientation, .. } => {
                args.push("--rotate".into());
                args.push(orientation.as_str().into());
            }
            OutputCommand::SetPower { state: PowerState::On, .. } => {
                args.push("--auto".into());
            }
            OutputCommand::SetPower { state: PowerState::Off, .. } => {
                args.push("--off".into());
            }
        }

        Ok(args)
    }
}

impl fmt::Display for OutputCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.action(), self.output())
    }
}

/// Capability the display core depends on
///
/// Implementations talk to the real utility ([`XrandrBackend`]) or serve
/// canned reports in tests.
#[async_trait]
pub trait DisplayBackend: Send + Sync {
    /// "list outputs" report
    async fn list_outputs(&self) -> Result<String>;

    /// Verbose report carrying orientation keywords
    async fn list_outputs_verbose(&self) -> Result<String>;

    /// Run one mutating command
    async fn execute(&self, command: &OutputCommand) -> Result<()>;
}

/// xrandr-backed implementation
#[derive(Debug, Clone)]
pub struct XrandrBackend {
    /// Path or name of the xrandr binary
    program: PathBuf,

    /// Upper bound for every invocation
    timeout: Duration,
}

impl XrandrBackend {
    /// Create a backend for the given binary and timeout
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Create from display configuration
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(&config.xrandr_path, config.command_timeout())
    }

    /// Run the utility with a bounded timeout. The child is killed when the
    /// timeout drops the future.
    async fn run(&self, args: &[String]) -> std::result::Result<Output, String> {
        let mut command = Command::new(&self.program);
        command.args(args).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(format!("failed to run {}: {}", self.program.display(), e)),
            Err(_) => Err(format!(
                "{} did not finish within {:?}",
                self.program.display(),
                self.timeout
            )),
        }
    }

    async fn query(&self, args: &[String]) -> Result<String> {
        let output = self.run(args).await.map_err(DisplayError::QueryFailed)?;

        if !output.status.success() {
            return Err(DisplayError::QueryFailed(format!(
                "{} {} exited with {}: {}",
                self.program.display(),
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl DisplayBackend for XrandrBackend {
    async fn list_outputs(&self) -> Result<String> {
        self.query(&["--query".to_string()]).await
    }

    async fn list_outputs_verbose(&self) -> Result<String> {
        self.query(&["--verbose".to_string()]).await
    }

    async fn execute(&self, command: &OutputCommand) -> Result<()> {
        let args = command.to_xrandr_args()?;
        debug!("Executing: {} {}", self.program.display(), args.join(" "));

        let failed = |message: String| DisplayError::CommandFailed {
            action: command.action(),
            output: command.output().to_string(),
            message,
        };

        let output = self.run(&args).await.map_err(failed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("xrandr {} failed: {}", args.join(" "), stderr);
            return Err(failed(if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory backend

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Serves queued reports and records every command
    ///
    /// Reports are consumed one per read; the last one is served repeatedly,
    /// so a steady topology needs a single push.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        reports: Mutex<VecDeque<Result<(String, String)>>>,
        current: Mutex<(String, String)>,
        commands: Mutex<Vec<OutputCommand>>,
        failing: Mutex<Vec<OutputCommand>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(query: &str, verbose: &str) -> Self {
            let backend = Self::default();
            backend.push_report(query, verbose);
            backend
        }

        pub(crate) fn push_report(&self, query: &str, verbose: &str) {
            self.reports
                .lock()
                .push_back(Ok((query.to_string(), verbose.to_string())));
        }

        pub(crate) fn push_failure(&self) {
            self.reports
                .lock()
                .push_back(Err(DisplayError::QueryFailed("scripted failure".into())));
        }

        /// Make every later execution of `command` fail
        pub(crate) fn fail_on(&self, command: OutputCommand) {
            self.failing.lock().push(command);
        }

        pub(crate) fn commands(&self) -> Vec<OutputCommand> {
            self.commands.lock().clone()
        }

        pub(crate) fn take_commands(&self) -> Vec<OutputCommand> {
            std::mem::take(&mut *self.commands.lock())
        }

        fn next_report(&self) -> Result<(String, String)> {
            let mut reports = self.reports.lock();
            let next = if reports.len() > 1 {
                reports.pop_front()
            } else {
                reports.front().cloned()
            };
            next.unwrap_or_else(|| Ok(Default::default()))
        }
    }

    #[async_trait]
    impl DisplayBackend for ScriptedBackend {
        async fn list_outputs(&self) -> Result<String> {
            let (query, verbose) = self.next_report()?;
            *self.current.lock() = (query.clone(), verbose);
            Ok(query)
        }

        async fn list_outputs_verbose(&self) -> Result<String> {
            Ok(self.current.lock().1.clone())
        }

        async fn execute(&self, command: &OutputCommand) -> Result<()> {
            command.to_xrandr_args()?;
            self.commands.lock().push(command.clone());
            if self.failing.lock().contains(command) {
                return Err(DisplayError::CommandFailed {
                    action: command.action(),
                    output: command.output().to_string(),
                    message: "scripted failure".into(),
                });
            }
            Ok(())
        }
    }
}
