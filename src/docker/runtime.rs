//! Container runtime capability and the requests passed through it.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;

/// The operations devtools need from a container engine.
///
/// [`super::DockerCli`] shells out to the `docker` client; tests substitute
/// an in-memory recorder. Implementations must be safe to share between
/// concurrent dispatches.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + Debug {
    /// Architecture of a locally available image, `None` if absent
    async fn inspect_architecture(&self, image: &str) -> Result<Option<String>>;

    /// Build an image and load it into the local store
    async fn build(&self, request: &BuildRequest) -> Result<()>;

    /// Pull an image from its registry
    async fn pull(&self, image: &str) -> Result<()>;

    /// Run a container to completion, propagating its exit code
    async fn run(&self, request: &RunRequest) -> Result<()>;
}

/// A single-platform `buildx` build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Tool the image is for
    pub tool: String,
    /// Tag to apply
    pub image: String,
    /// Dockerfile path
    pub dockerfile: PathBuf,
    /// Build context directory
    pub context: PathBuf,
    /// Stage to build; the last stage when `None`
    pub target: Option<String>,
    /// Docker-style architecture to build for
    pub arch: String,
    /// `--build-arg` pairs in order
    pub build_args: Vec<(String, String)>,
}

impl BuildRequest {
    /// Arguments for the `docker` client
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            "buildx".to_string(),
            "build".to_string(),
            "--platform".to_string(),
            format!("linux/{}", self.arch),
            "-f".to_string(),
            self.dockerfile.to_string_lossy().into_owned(),
        ];
        if let Some(target) = &self.target {
            args.push("--target".to_string());
            args.push(target.clone());
        }
        args.extend(["-t".to_string(), self.image.clone(), "--load".to_string()]);
        for (key, value) in &self.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(self.context.to_string_lossy().into_owned());
        args
    }
}

/// A `docker run --rm` invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Tool being run, used for the container name
    pub tool: String,
    /// Image reference
    pub image: String,
    /// `(host, container)` bind mounts in order
    pub volumes: Vec<(String, String)>,
    /// Container environment in order
    pub env: Vec<(String, String)>,
    /// Working directory inside the container
    pub workdir: Option<String>,
    /// Further `docker run` flags, placed before the image
    pub extra_args: Vec<String>,
    /// Command after the image; the image entrypoint when `None`
    pub command: Option<String>,
    /// Arguments for the command
    pub args: Vec<String>,
    /// Environment overlay for the `docker` client process itself
    pub client_env: BTreeMap<String, String>,
    /// Stream the container's stdout even when not verbose
    pub live_output: bool,
}

impl RunRequest {
    /// Arguments for the `docker` client, naming the container `name`
    pub fn docker_args(&self, name: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];
        for (host, container) in &self.volumes {
            args.push("--volume".to_string());
            args.push(format!("{}:{}", host, container));
        }
        for (key, value) in &self.env {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        if let Some(workdir) = &self.workdir {
            args.push("--workdir".to_string());
            args.push(workdir.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(self.image.clone());
        if let Some(command) = &self.command {
            args.push(command.clone());
        }
        args.extend(self.args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_shape() {
        let request = BuildRequest {
            tool: "tflint".to_string(),
            image: "ocreg.invalid/devtool/tflint-devtool:0.50.3".to_string(),
            dockerfile: PathBuf::from("var/tflint.abc.Dockerfile"),
            context: PathBuf::from("var/tflint-context-xyz"),
            target: Some("tflint".to_string()),
            arch: "arm64".to_string(),
            build_args: vec![
                ("TARGETARCH".to_string(), "arm64".to_string()),
                ("TFLINT_VERSION".to_string(), "0.50.3".to_string()),
            ],
        };
        assert_eq!(
            request.docker_args(),
            [
                "buildx",
                "build",
                "--platform",
                "linux/arm64",
                "-f",
                "var/tflint.abc.Dockerfile",
                "--target",
                "tflint",
                "-t",
                "ocreg.invalid/devtool/tflint-devtool:0.50.3",
                "--load",
                "--build-arg",
                "TARGETARCH=arm64",
                "--build-arg",
                "TFLINT_VERSION=0.50.3",
                "var/tflint-context-xyz",
            ]
        );
    }

    #[test]
    fn test_run_args_order() {
        let request = RunRequest {
            tool: "golangci-lint".to_string(),
            image: "img:1".to_string(),
            volumes: vec![("/src".to_string(), "/app".to_string())],
            env: vec![("GOMODCACHE".to_string(), "/go/pkg/mod".to_string())],
            workdir: Some("/app".to_string()),
            extra_args: vec!["--add-host".to_string(), "host.docker.internal:host-gateway".to_string()],
            command: Some("golangci-lint".to_string()),
            args: vec!["run".to_string()],
            client_env: BTreeMap::new(),
            live_output: false,
        };
        assert_eq!(
            request.docker_args("golangci-lint-devtool-1"),
            [
                "run",
                "--rm",
                "--name",
                "golangci-lint-devtool-1",
                "--volume",
                "/src:/app",
                "--env",
                "GOMODCACHE=/go/pkg/mod",
                "--workdir",
                "/app",
                "--add-host",
                "host.docker.internal:host-gateway",
                "img:1",
                "golangci-lint",
                "run",
            ]
        );
    }

    #[test]
    fn test_run_args_entrypoint() {
        let request = RunRequest {
            image: "img:1".to_string(),
            args: vec!["fmt".to_string()],
            ..RunRequest::default()
        };
        let args = request.docker_args("n");
        assert_eq!(&args[args.len() - 2..], ["img:1", "fmt"]);
    }
}
