//! Container mount plans.
//!
//! A containerized tool should see the same caches and credentials as a
//! native one would, so each profile mirrors the relevant host directories.

use super::ToolRequest;
use super::catalog::ToolSpec;
use crate::config::GITHUB_TOKEN_ENV;
use std::path::{Component, Path, PathBuf};

/// Where the source tree is mounted inside every devtool container
pub const CONTAINER_SOURCE_ROOT: &str = "/app";

/// In-container Go module cache
pub const CONTAINER_GOMODCACHE: &str = "/go/pkg/mod";

/// Host state a tool needs inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountProfile {
    /// Go toolchain: module cache, build caches, git/ssh credentials and the
    /// Docker socket for testcontainers
    Go,
    /// Go linters: module cache and build/lint caches
    GoLint,
    /// Terraform credentials and plugin cache
    Terraform,
    /// tflint plugins, kept apart from the host's own plugin dir
    TfLint,
    /// trivy vulnerability database
    Trivy,
    /// Source tree only
    Plain,
}

impl MountProfile {
    /// Whether the host Go module cache location is needed
    pub fn needs_go_mod_cache(self) -> bool {
        matches!(self, MountProfile::Go | MountProfile::GoLint)
    }
}

/// Host locations resolved once per dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    /// Host directory mounted at [`CONTAINER_SOURCE_ROOT`]
    pub source_root: PathBuf,
    /// Host home directory
    pub home: PathBuf,
    /// Host Go module cache, from `go env GOMODCACHE` when available
    pub go_mod_cache: Option<PathBuf>,
}

impl HostPaths {
    /// Resolve with the current user's home directory.
    ///
    /// Without a detectable home, `$HOME` is left for the executor to expand.
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("$HOME")),
            go_mod_cache: None,
        }
    }

    /// Set the Go module cache location
    pub fn with_go_mod_cache(mut self, path: Option<PathBuf>) -> Self {
        self.go_mod_cache = path;
        self
    }

    fn go_mod_cache(&self) -> PathBuf {
        self.go_mod_cache
            .clone()
            .unwrap_or_else(|| self.home.join("go").join("pkg").join("mod"))
    }
}

/// Volumes, environment and flags for one `docker run`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPlan {
    /// `(host, container)` bindings in order
    pub volumes: Vec<(String, String)>,
    /// Container environment in order
    pub env: Vec<(String, String)>,
    /// Working directory inside the container
    pub workdir: String,
    /// Further `docker run` flags
    pub extra_args: Vec<String>,
}

impl MountPlan {
    /// Build the plan for `spec` serving `request`.
    ///
    /// The source tree comes first, then the profile's caches and
    /// credentials. Environment order is profile entries, the caller's
    /// entries, then a forwarded GitHub token if the caller did not set one.
    /// The request's workdir is mapped below `/app` for every tool.
    pub fn build(spec: &ToolSpec, host: &HostPaths, request: &ToolRequest, github_token: Option<&str>) -> Self {
        let mut plan = MountPlan {
            workdir: container_workdir(&host.source_root, &request.workdir),
            ..MountPlan::default()
        };
        plan.mount(&host.source_root, CONTAINER_SOURCE_ROOT);

        let home = &host.home;
        match spec.mounts {
            MountProfile::Go => {
                plan.mount(&host.go_mod_cache(), CONTAINER_GOMODCACHE);
                plan.mount(Path::new("/var/run/docker.sock"), "/var/run/docker.sock");
                plan.mount(&home.join(".cache"), "/root/.cache");
                plan.mount(&home.join(".gitconfig"), "/root/.gitconfig");
                plan.mount(&home.join(".ssh"), "/root/.ssh");
                plan.setenv("TESTCONTAINERS_HOST_OVERRIDE", "host.docker.internal");
                plan.setenv("GOMODCACHE", CONTAINER_GOMODCACHE);
                plan.extra_args.extend([
                    "--add-host".to_string(),
                    "host.docker.internal:host-gateway".to_string(),
                ]);
            }
            MountProfile::GoLint => {
                plan.mount(&host.go_mod_cache(), CONTAINER_GOMODCACHE);
                plan.mount(&home.join(".cache"), "/root/.cache");
                plan.setenv("GOMODCACHE", CONTAINER_GOMODCACHE);
            }
            MountProfile::Terraform => {
                plan.mount(&home.join(".terraform.d"), "/root/.terraform.d");
            }
            MountProfile::TfLint => {
                plan.mount(&home.join(".tflint.docker.d"), "/root/.tflint.d");
            }
            MountProfile::Trivy => {
                plan.mount(&home.join(".cache").join("trivy"), "/root/.cache/trivy");
            }
            MountProfile::Plain => {}
        }

        for (key, value) in &request.env {
            plan.setenv(key, value);
        }
        if spec.forwards_github_token && !request.env.contains_key(GITHUB_TOKEN_ENV) {
            if let Some(token) = github_token {
                plan.setenv(GITHUB_TOKEN_ENV, token);
            }
        }

        plan
    }

    fn mount(&mut self, host: &Path, container: &str) {
        self.volumes
            .push((host.to_string_lossy().into_owned(), container.to_string()));
    }

    fn setenv(&mut self, key: &str, value: &str) {
        self.env.push((key.to_string(), value.to_string()));
    }
}

/// Map a host working directory onto the container's source mount.
///
/// Relative paths are taken below the source root; absolute paths inside
/// the source root are made relative to it. Anything else, including a path
/// that climbs above the source root, maps to the mount point itself.
pub fn container_workdir(source_root: &Path, workdir: &Path) -> String {
    let relative = if workdir.is_absolute() {
        match workdir.strip_prefix(source_root) {
            Ok(rel) => rel,
            Err(_) => {
                log::debug!(
                    "workdir {} is outside {}, using {}",
                    workdir.display(),
                    source_root.display(),
                    CONTAINER_SOURCE_ROOT
                );
                Path::new("")
            }
        }
    } else {
        workdir
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    log::debug!(
                        "workdir {} escapes {}, using {}",
                        workdir.display(),
                        source_root.display(),
                        CONTAINER_SOURCE_ROOT
                    );
                    return CONTAINER_SOURCE_ROOT.to_string();
                }
            }
            _ => {}
        }
    }

    let mut out = CONTAINER_SOURCE_ROOT.to_string();
    for part in parts {
        out.push('/');
        out.push_str(&part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn host() -> HostPaths {
        HostPaths {
            source_root: PathBuf::from("/work/repo"),
            home: PathBuf::from("/home/ci"),
            go_mod_cache: None,
        }
    }

    #[test]
    fn test_go_plan() {
        let request = ToolRequest::new(["test", "./..."]);
        let plan = MountPlan::build(&ToolSpec::golang(), &host(), &request, None);

        assert_eq!(plan.volumes[0], ("/work/repo".to_string(), "/app".to_string()));
        assert!(plan
            .volumes
            .contains(&("/home/ci/go/pkg/mod".to_string(), "/go/pkg/mod".to_string())));
        assert!(plan
            .volumes
            .contains(&("/var/run/docker.sock".to_string(), "/var/run/docker.sock".to_string())));
        assert!(plan
            .env
            .contains(&("TESTCONTAINERS_HOST_OVERRIDE".to_string(), "host.docker.internal".to_string())));
        assert_eq!(plan.extra_args, ["--add-host", "host.docker.internal:host-gateway"]);
        assert_eq!(plan.workdir, "/app");
    }

    #[test]
    fn test_go_mod_cache_from_host() {
        let host = host().with_go_mod_cache(Some(PathBuf::from("/cache/mod")));
        let plan = MountPlan::build(&ToolSpec::golangci_lint(), &host, &ToolRequest::default(), None);
        assert!(plan
            .volumes
            .contains(&("/cache/mod".to_string(), "/go/pkg/mod".to_string())));
    }

    #[test]
    fn test_terraform_workdir_and_credentials() {
        let request = ToolRequest::default().with_workdir("modules/network");
        let plan = MountPlan::build(&ToolSpec::terraform(), &host(), &request, None);
        assert_eq!(plan.workdir, "/app/modules/network");
        assert!(plan
            .volumes
            .contains(&("/home/ci/.terraform.d".to_string(), "/root/.terraform.d".to_string())));
    }

    #[test]
    fn test_workdir_applies_to_every_tool() {
        let request = ToolRequest::new(["test", "./..."]).with_workdir("services/api");
        for spec in [ToolSpec::golang(), ToolSpec::kubeconform(), ToolSpec::policy_bot()] {
            let plan = MountPlan::build(&spec, &host(), &request, None);
            assert_eq!(plan.workdir, "/app/services/api", "{}", spec.name);
        }
    }

    #[test]
    fn test_github_token_forwarding() {
        let plan = MountPlan::build(&ToolSpec::tflint(), &host(), &ToolRequest::default(), Some("ghp_x"));
        assert!(plan.env.contains(&("GITHUB_TOKEN".to_string(), "ghp_x".to_string())));

        let request = ToolRequest::default()
            .with_env(BTreeMap::from([("GITHUB_TOKEN".to_string(), "mine".to_string())]));
        let plan = MountPlan::build(&ToolSpec::tflint(), &host(), &request, Some("ghp_x"));
        let tokens: Vec<_> = plan.env.iter().filter(|(k, _)| k == "GITHUB_TOKEN").collect();
        assert_eq!(tokens, [&("GITHUB_TOKEN".to_string(), "mine".to_string())]);

        let plan = MountPlan::build(&ToolSpec::terraform(), &host(), &ToolRequest::default(), Some("ghp_x"));
        assert!(plan.env.is_empty());
    }

    #[test]
    fn test_container_workdir_mapping() {
        let root = Path::new("/work/repo");
        assert_eq!(container_workdir(root, Path::new("")), "/app");
        assert_eq!(container_workdir(root, Path::new(".")), "/app");
        assert_eq!(container_workdir(root, Path::new("./infra/prod")), "/app/infra/prod");
        assert_eq!(container_workdir(root, Path::new("/work/repo/infra")), "/app/infra");
        assert_eq!(container_workdir(root, Path::new("/elsewhere")), "/app");
        assert_eq!(container_workdir(root, Path::new("a/../b")), "/app/b");
        assert_eq!(container_workdir(root, Path::new("../up")), "/app");
        assert_eq!(container_workdir(root, Path::new("infra/../../up")), "/app");
        assert_eq!(container_workdir(root, Path::new("/work/repo/../other")), "/app");
    }
}
