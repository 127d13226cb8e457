//! Side-effecting operations triggered by command topics
//!
//! The mirror switch is handled in-process (currently a logging stub). Every
//! other action runs a shell script by fixed name from the configured scripts
//! directory, without arguments.
//!
//! Scripts run without a timeout. The executor is awaited on the event loop
//! task, so a script that never exits stalls all further command handling.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Operations the bridge can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MirrorOn,
    MirrorOff,
    DisplayOn,
    DisplayOff,
    StartFirefox,
    KillFirefox,
    Reboot,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::MirrorOn,
        Action::MirrorOff,
        Action::DisplayOn,
        Action::DisplayOff,
        Action::StartFirefox,
        Action::KillFirefox,
        Action::Reboot,
    ];

    /// Name of the script implementing this action, `None` for in-process actions
    pub fn script(self) -> Option<&'static str> {
        match self {
            Action::MirrorOn | Action::MirrorOff => None,
            Action::DisplayOn => Some("screen-on"),
            Action::DisplayOff => Some("screen-off"),
            Action::StartFirefox => Some("start-HA-Firefox-kiosk"),
            Action::KillFirefox => Some("kill-firefox"),
            Action::Reboot => Some("reboot"),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Action::MirrorOn => "turning on the mirror",
            Action::MirrorOff => "turning off the mirror",
            Action::DisplayOn => "turning on the display",
            Action::DisplayOff => "turning off the display",
            Action::StartFirefox => "starting Firefox",
            Action::KillFirefox => "killing Firefox",
            Action::Reboot => "rebooting the device",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Result type alias for action execution
pub type ActionResult = Result<(), ActionError>;

/// Errors that can occur while executing an action
#[derive(Debug)]
pub enum ActionError {
    /// The script file does not exist
    ScriptNotFound(PathBuf),

    /// The script exited unsuccessfully
    ScriptFailed { script: PathBuf, status: ExitStatus },

    /// Spawning or waiting for the script failed
    IoError(io::Error),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::ScriptNotFound(path) => {
                write!(f, "script {} not found", path.display())
            }
            ActionError::ScriptFailed { script, status } => {
                write!(f, "script {} failed with {}", script.display(), status)
            }
            ActionError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActionError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ActionError {
    fn from(err: io::Error) -> Self {
        ActionError::IoError(err)
    }
}

/// Performs actions on behalf of the command dispatcher
///
/// Implementations must be `Send + Sync`; the dispatcher awaits them on the
/// connection driver's task.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: Action) -> ActionResult;
}

/// Executor backed by shell scripts in a fixed directory
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    scripts_dir: PathBuf,
}

impl ScriptExecutor {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn script_path(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(format!("{name}.sh"))
    }

    async fn run_script(&self, name: &str) -> ActionResult {
        let script = self.script_path(name);
        run(&script).await
    }
}

async fn run(script: &Path) -> ActionResult {
    debug!("running {}", script.display());

    // The script dies with the session task if shutdown aborts it
    let status = match Command::new(script).kill_on_drop(true).status().await {
        Ok(status) => status,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ActionError::ScriptNotFound(script.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    if !status.success() {
        return Err(ActionError::ScriptFailed {
            script: script.to_path_buf(),
            status,
        });
    }

    Ok(())
}

#[async_trait]
impl ActionExecutor for ScriptExecutor {
    async fn execute(&self, action: Action) -> ActionResult {
        info!("{action}");

        match action.script() {
            Some(name) => self.run_script(name).await,
            // Mirror control has no hardware hook yet
            None => Ok(()),
        }
    }
}
