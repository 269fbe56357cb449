//! RAII guard for Docker container cleanup.
//!
//! `docker run --rm` removes the container when the client exits normally.
//! If the client is interrupted first, the guard force-removes it.

use std::time::Duration;
use wait_timeout::ChildExt;

/// Upper bound on the cleanup `docker rm -f`
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Force-removes a named container on drop unless disarmed.
pub(super) struct ContainerGuard {
    name: String,
    armed: bool,
}

impl ContainerGuard {
    pub(super) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            armed: true,
        }
    }

    /// The client finished on its own; `--rm` handles removal
    pub(super) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // spawn + wait_timeout: an unresponsive daemon must not hang drop
        let mut child = match std::process::Command::new("docker")
            .args(["rm", "-f", &self.name])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::debug!("cannot spawn docker to remove '{}': {}", self.name, e);
                return;
            }
        };

        match child.wait_timeout(CLEANUP_TIMEOUT) {
            Ok(Some(status)) if !status.success() => {
                log::debug!(
                    "docker rm -f {} exited with {}",
                    self.name,
                    status.code().unwrap_or(-1)
                );
            }
            Ok(Some(_)) => log::debug!("removed container {}", self.name),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!(
                    "timed out removing container '{}' after {} seconds; Docker daemon may be down",
                    self.name,
                    CLEANUP_TIMEOUT.as_secs()
                );
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

/// Unique container name for one run of `tool`
pub(super) fn container_name(tool: &str) -> String {
    format!("{}-devtool-{}", tool, uuid::Uuid::new_v4())
}
