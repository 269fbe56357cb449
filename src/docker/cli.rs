//! [`ContainerRuntime`] backed by the `docker` command line client.

use super::guard::{ContainerGuard, container_name};
use super::runtime::{BuildRequest, ContainerRuntime, RunRequest};
use crate::error::{DevtoolError, ImageBuildError, ProcessError, Result};
use crate::exec::{self, Invocation, OutputSink, ProcessRunner};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Timeout for the `docker info` availability check
pub const DOCKER_INFO_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(target_os = "macos")]
const DOCKER_START_HELP: &str = "Start Docker Desktop from Applications or Spotlight";

#[cfg(target_os = "linux")]
const DOCKER_START_HELP: &str = "Start Docker daemon: sudo systemctl start docker";

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
const DOCKER_START_HELP: &str = "Start Docker Desktop";

/// Shells out to `docker` for every runtime operation
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerCli {
    runner: ProcessRunner,
}

impl DockerCli {
    /// Create a client with the given output verbosity
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }

    /// Checks if Docker is installed and the daemon is running.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Docker is available
    /// * `Err` - Docker is not installed, the daemon is down, or it did not
    ///   answer within [`DOCKER_INFO_TIMEOUT`]
    pub async fn check_available(&self) -> Result<()> {
        let status = timeout(
            DOCKER_INFO_TIMEOUT,
            Command::new("docker")
                .arg("info")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status(),
        )
        .await;

        match status {
            Err(_) => Err(DevtoolError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!(
                    "Docker daemon check timed out after {} seconds. {}",
                    DOCKER_INFO_TIMEOUT.as_secs(),
                    DOCKER_START_HELP
                ),
            ))),
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(ProcessError::Failed {
                command: "docker info".to_string(),
                code: status.code().unwrap_or(1),
                stdout: String::new(),
                stderr: format!("Docker daemon is not responding. {}", DOCKER_START_HELP),
            }
            .into()),
            Ok(Err(e)) => Err(ProcessError::NotStarted {
                command: "docker info".to_string(),
                source: e,
            }
            .into()),
        }
    }

    /// Run `docker <args>`, capturing output unless verbose.
    ///
    /// A failed run carries its captured output in the returned error.
    async fn run_quiet_on_success(&self, args: Vec<String>) -> std::result::Result<(), ProcessError> {
        let invocation = Invocation::new("docker", args);

        if self.runner.is_verbose() {
            return self.runner.run_verbose(invocation).await;
        }

        let invocation = invocation
            .stdout(OutputSink::Capture)
            .stderr(OutputSink::Capture);
        exec::execute(&invocation).await.map(|_| ())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect_architecture(&self, image: &str) -> Result<Option<String>> {
        let invocation = Invocation::new(
            "docker",
            ["image", "inspect", "--format", "{{.Architecture}}", image],
        )
        .stderr(OutputSink::Discard);

        match self.runner.output(invocation).await {
            Ok(arch) => Ok(Some(arch.trim().to_string())),
            // Non-zero exit: image not present locally
            Err(ProcessError::Failed { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn build(&self, request: &BuildRequest) -> Result<()> {
        log::info!("building {} (stage {:?}) for linux/{}", request.image, request.target, request.arch);

        match self.run_quiet_on_success(request.docker_args()).await {
            Ok(()) => Ok(()),
            Err(e @ ProcessError::NotStarted { .. }) => Err(e.into()),
            Err(e) => Err(ImageBuildError::BuildFailed {
                tool: request.tool.clone(),
                image: request.image.clone(),
                code: e.exit_code(),
                log: e.captured_output(),
            }
            .into()),
        }
    }

    async fn pull(&self, image: &str) -> Result<()> {
        log::info!("pulling {}", image);

        let args = vec!["pull".to_string(), image.to_string()];
        match self.run_quiet_on_success(args).await {
            Ok(()) => Ok(()),
            Err(e @ ProcessError::NotStarted { .. }) => Err(e.into()),
            Err(e) => Err(ImageBuildError::PullFailed {
                image: image.to_string(),
                code: e.exit_code(),
                log: e.captured_output(),
            }
            .into()),
        }
    }

    async fn run(&self, request: &RunRequest) -> Result<()> {
        let name = container_name(&request.tool);
        let mut guard = ContainerGuard::new(name.clone());

        let invocation =
            Invocation::new("docker", request.docker_args(&name)).envs(request.client_env.clone());
        let result = if request.live_output {
            self.runner.run_verbose(invocation).await
        } else {
            self.runner.run(invocation).await
        };

        // The client returned: --rm has removed the container, or it never
        // existed. The guard only fires if this future is dropped mid-run.
        guard.disarm();
        result.map_err(Into::into)
    }
}
