//! Devtool dispatch: run a tool natively when the host has a compliant
//! binary, otherwise inside its pinned container image.
//!
//! The decision is made afresh on every call:
//!
//! 1. forced onto the container path? → container
//! 2. binary on PATH? no → container
//! 3. installed version within the tool's rule? no → container
//! 4. run natively
//!
//! Only a failure in steps 2 and 3 is turned into a fallback. Every other
//! error is returned with the tool name attached.

pub mod catalog;
pub mod mounts;

pub use catalog::{NativeSpec, ToolSpec};
pub use mounts::{HostPaths, MountPlan, MountProfile};

use crate::config::DevtoolConfig;
use crate::docker::{ContainerRuntime, DockerCli, ImageBuilder, RunRequest};
use crate::error::{DevtoolError, Result};
use crate::exec::{Invocation, OutputSink, ProcessRunner};
use crate::manifest::ManifestSource;
use crate::version;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// What the caller wants run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRequest {
    /// Environment for the tool; overrides the inherited one natively and
    /// is passed with `--env` to containers
    pub env: BTreeMap<String, String>,
    /// Working directory; the source root when empty
    pub workdir: PathBuf,
    /// Arguments after the tool's default ones
    pub args: Vec<String>,
}

impl ToolRequest {
    /// Request with the given arguments
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the environment
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Set the working directory
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }
}

/// Where one invocation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// Host binary
    Native {
        /// Resolved binary path
        binary: PathBuf,
    },
    /// Devtool container
    Containerized {
        /// Image to run
        image: String,
        /// Mounts, environment and workdir
        plan: MountPlan,
    },
}

/// Runs devtools natively or in containers.
///
/// Holds no per-call state; share it freely across concurrent dispatches.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: DevtoolConfig,
    runtime: Arc<dyn ContainerRuntime>,
    manifest: ManifestSource,
    runner: ProcessRunner,
}

impl Dispatcher {
    /// Dispatcher over `runtime` using the embedded manifest
    pub fn new(config: DevtoolConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let runner = ProcessRunner::new(config.verbose);
        Self {
            config,
            runtime,
            manifest: ManifestSource::embedded(),
            runner,
        }
    }

    /// Dispatcher backed by the `docker` client
    pub fn docker(config: DevtoolConfig) -> Self {
        let runtime = Arc::new(DockerCli::new(ProcessRunner::new(config.verbose)));
        Self::new(config, runtime)
    }

    /// Use `manifest` instead of the embedded one
    pub fn with_manifest(mut self, manifest: ManifestSource) -> Self {
        self.manifest = manifest;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &DevtoolConfig {
        &self.config
    }

    /// Manifest pinning tool versions
    pub fn manifest(&self) -> &ManifestSource {
        &self.manifest
    }

    /// Image builder sharing this dispatcher's runtime
    pub fn images(&self) -> ImageBuilder {
        ImageBuilder::new(self.config.clone(), self.runtime.clone())
    }

    /// Run built-in tool `tool`
    pub async fn run(&self, tool: &str, request: ToolRequest) -> Result<()> {
        let spec = catalog::lookup(tool)?;
        self.run_spec(&spec, request).await
    }

    /// Run `spec`, choosing the execution path first
    pub async fn run_spec(&self, spec: &ToolSpec, request: ToolRequest) -> Result<()> {
        let target = self.select_target(spec, &request).await?;
        self.execute(spec, target, request)
            .await
            .map_err(|e| e.context(spec.name))
    }

    /// Make the image for `spec` available and return its reference
    pub async fn ensure_image(&self, spec: &ToolSpec) -> Result<String> {
        self.images()
            .ensure_image(spec.name, &self.manifest, spec.image)
            .await
            .map_err(|e| e.context(format!("{}: ensure image", spec.name)))
    }

    /// Host binary for `spec`, if it is on the search path
    pub fn resolve_native(&self, native: &NativeSpec) -> Option<PathBuf> {
        let found = match &self.config.search_path {
            Some(path) => which::which_in(native.binary, Some(path), &self.config.source_root),
            None => which::which(native.binary),
        };
        found.ok()
    }

    /// Check the installed version of `spec` against its rule
    pub async fn version_ok(&self, spec: &ToolSpec) -> Result<()> {
        let native = spec.native.as_ref().ok_or_else(|| {
            crate::error::VersionCheckError::NoNativeBinary {
                tool: spec.name.to_string(),
            }
        })?;
        let binary = self.resolve_native(native).ok_or_else(|| {
            crate::error::ProcessError::NotStarted {
                command: native.binary.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found on PATH"),
            }
        })?;
        let declared = self.manifest.tool(spec.name)?;
        version::version_ok(&binary, &native.probe, &native.rule, &declared.version).await?;
        Ok(())
    }

    /// Decide where `spec` runs; builds or pulls the image for the
    /// container path.
    pub async fn select_target(&self, spec: &ToolSpec, request: &ToolRequest) -> Result<ExecutionTarget> {
        if let Some(binary) = self.native_target(spec).await {
            log::info!("using native {}", spec.name);
            return Ok(ExecutionTarget::Native { binary });
        }

        let image = self.ensure_image(spec).await?;
        log::info!("running {} in container {}", spec.name, image);
        let host = self.host_paths(spec).await;
        let plan = MountPlan::build(spec, &host, request, self.config.github_token.as_deref());
        Ok(ExecutionTarget::Containerized { image, plan })
    }

    /// Native binary if every native check passes; logs the reason otherwise
    async fn native_target(&self, spec: &ToolSpec) -> Option<PathBuf> {
        let Some(native) = &spec.native else {
            log::info!("{} runs in a container only", spec.name);
            return None;
        };

        if self.config.forces_container(spec.name) {
            log::info!("forcing {} into a container (DEVTOOL_FORCE_CONTAINER)", spec.name);
            return None;
        }
        if let Some((var, value)) = spec.force_env {
            if std::env::var(var).is_ok_and(|v| v == value) {
                log::info!("forcing {} into a container because {}={}", spec.name, var, value);
                return None;
            }
        }

        let Some(binary) = self.resolve_native(native) else {
            match spec.install_hint {
                Some(hint) => log::info!(
                    "{} not found on PATH, falling back to container (install with '{}')",
                    native.binary,
                    hint
                ),
                None => log::info!("{} not found on PATH, falling back to container", native.binary),
            }
            return None;
        };

        if let Err(e) = self.version_ok(spec).await {
            log::warn!(
                "{} does not meet version constraints, falling back to container: {}",
                spec.name,
                e
            );
            return None;
        }
        Some(binary)
    }

    async fn host_paths(&self, spec: &ToolSpec) -> HostPaths {
        let host = HostPaths::new(&self.config.source_root);
        if !spec.mounts.needs_go_mod_cache() {
            return host;
        }

        let invocation = Invocation::new("go", ["env", "GOMODCACHE"]).stderr(OutputSink::Discard);
        let cache = match self.runner.output(invocation).await {
            Ok(path) if !path.trim().is_empty() => Some(PathBuf::from(path.trim())),
            Ok(_) | Err(_) => {
                log::debug!("go env GOMODCACHE unavailable, using $HOME/go/pkg/mod");
                None
            }
        };
        host.with_go_mod_cache(cache)
    }

    async fn execute(&self, spec: &ToolSpec, target: ExecutionTarget, request: ToolRequest) -> Result<()> {
        let args: Vec<String> = spec
            .default_args
            .iter()
            .map(|a| a.to_string())
            .chain(request.args)
            .collect();

        match target {
            ExecutionTarget::Native { binary } => {
                let invocation = Invocation::new(binary.to_string_lossy(), args)
                    .envs(request.env)
                    .working_dir(request.workdir);
                let result = if spec.live_output {
                    self.runner.run_verbose(invocation).await
                } else {
                    self.runner.run(invocation).await
                };
                result.map_err(DevtoolError::from)
            }
            ExecutionTarget::Containerized { image, plan } => {
                let run = RunRequest {
                    tool: spec.name.to_string(),
                    image,
                    volumes: plan.volumes,
                    env: plan.env,
                    workdir: Some(plan.workdir),
                    extra_args: plan.extra_args,
                    command: spec.container_command.map(str::to_string),
                    args,
                    client_env: request.env,
                    live_output: spec.live_output,
                };
                self.runtime.run(&run).await
            }
        }
    }
}
