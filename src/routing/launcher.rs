//! Fire-and-forget launching of external lookup processes.
//!
//! A launch is submitted, not awaited: `launch()` returns as soon as the
//! process has been spawned. The exit outcome is delivered later through the
//! returned [`LaunchHandle`], which callers are free to drop.

use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::LaunchError;
use crate::routing::registry::LaunchTarget;

/// How a finished lookup process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Ticket for a submitted launch.
#[derive(Debug)]
pub struct LaunchHandle {
    pub id: Uuid,
    outcome: oneshot::Receiver<Result<LaunchOutcome, LaunchError>>,
}

impl LaunchHandle {
    /// New handle plus the sender used to report its outcome.
    pub fn new() -> (Self, oneshot::Sender<Result<LaunchOutcome, LaunchError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                id: Uuid::new_v4(),
                outcome: rx,
            },
            tx,
        )
    }

    /// Wait for the process to finish.
    pub async fn wait(self) -> Result<LaunchOutcome, LaunchError> {
        self.outcome
            .await
            .map_err(|_| LaunchError::Wait("supervisor dropped before reporting".to_string()))?
    }
}

/// Capability to start an external lookup for a category item.
pub trait Launcher: Send + Sync {
    /// Submit a lookup. Must not block on the lookup itself.
    fn launch(
        &self,
        item_type: &str,
        target: &LaunchTarget,
        item_name: &str,
    ) -> Result<LaunchHandle, LaunchError>;
}

/// Runs `program <script> <item name>` as a detached child process.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Launcher for ProcessLauncher {
    fn launch(
        &self,
        item_type: &str,
        target: &LaunchTarget,
        item_name: &str,
    ) -> Result<LaunchHandle, LaunchError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LaunchError::NoRuntime)?;

        let mut child = Command::new(&target.program)
            .arg(&target.script)
            .arg(item_name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LaunchError::Spawn {
                program: target.program.clone(),
                script: target.script.display().to_string(),
                reason: e.to_string(),
            })?;

        let (handle, tx) = LaunchHandle::new();
        let task_id = handle.id;
        let item_type = item_type.to_string();
        let item_name = item_name.to_string();

        tracing::info!(
            %task_id,
            item_type = %item_type,
            item_name = %item_name,
            script = %target.script.display(),
            "Lookup process launched"
        );

        runtime.spawn(async move {
            let result = match child.wait().await {
                Ok(status) => {
                    let outcome = LaunchOutcome {
                        success: status.success(),
                        exit_code: status.code(),
                    };
                    if outcome.success {
                        tracing::info!(%task_id, item_type = %item_type, "Lookup process finished");
                    } else {
                        tracing::warn!(
                            %task_id,
                            item_type = %item_type,
                            item_name = %item_name,
                            exit_code = ?outcome.exit_code,
                            "Lookup process exited with failure"
                        );
                    }
                    Ok(outcome)
                }
                Err(e) => {
                    tracing::error!(%task_id, error = %e, "Failed to wait for lookup process");
                    Err(LaunchError::Wait(e.to_string()))
                }
            };
            // Nobody listening is the normal fire-and-forget case.
            let _ = tx.send(result);
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_without_runtime_is_reported() {
        let target = LaunchTarget::new("sh", "script.sh");
        let err = ProcessLauncher::new().launch("Serie", &target, "Dark").unwrap_err();
        assert!(matches!(err, LaunchError::NoRuntime));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let target = LaunchTarget::new("/nonexistent/interpreter-for-tests", "script.py");
        let err = ProcessLauncher::new()
            .launch("Libro", &target, "Dune")
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { ref program, .. } if program.contains("nonexistent")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_script_and_item_name_as_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("lookup.sh");
        let out = dir.path().join("out.txt");
        std::fs::write(&script, format!("printf '%s' \"$1\" > {}\n", out.display())).unwrap();

        let target = LaunchTarget::new("sh", &script);
        let handle = ProcessLauncher::new()
            .launch("Película", &target, "El Padrino")
            .unwrap();
        let outcome = handle.wait().await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "El Padrino");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_script_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "exit 3\n").unwrap();

        let handle = ProcessLauncher::new()
            .launch("Juego", &LaunchTarget::new("sh", &script), "Celeste")
            .unwrap();
        let outcome = handle.wait().await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[tokio::test]
    async fn dropped_sender_is_wait_error() {
        let (handle, tx) = LaunchHandle::new();
        drop(tx);
        assert!(matches!(handle.wait().await, Err(LaunchError::Wait(_))));
    }
}
