//! Runtime configuration resolved from the environment and CLI flags.

use crate::platform;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Image repository prefix used when `OCI_IMAGE_BASE` is unset or empty
pub const DEFAULT_IMAGE_BASE: &str = "ocreg.invalid/devtool";

/// Directory for temporary Dockerfiles when none is configured
pub const DEFAULT_OUTPUT_DIR: &str = "./var";

/// Environment variables that enable verbose output
pub const VERBOSE_ENV: &[&str] = &["DEVTOOL_VERBOSE", "MAGEFILE_VERBOSE"];

/// Comma separated list of tools that must run in a container
pub const FORCE_CONTAINER_ENV: &str = "DEVTOOL_FORCE_CONTAINER";

/// Overrides [`DEFAULT_IMAGE_BASE`]
pub const IMAGE_BASE_ENV: &str = "OCI_IMAGE_BASE";

/// Token forwarded to containers of tools that call the GitHub API
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Settings shared by every devtool invocation in one process.
///
/// Built once, then passed by reference or cloned; nothing here changes
/// while tools run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevtoolConfig {
    /// Forward tool stdout live and log command lines at info level
    pub verbose: bool,
    /// Repository prefix for devtool images
    pub image_base: String,
    /// Where temporary Dockerfiles are written
    pub output_dir: PathBuf,
    /// Tools that skip the native path
    pub force_container: BTreeSet<String>,
    /// Token forwarded to containers that ask for it
    pub github_token: Option<String>,
    /// Host directory mounted as the container's source tree
    pub source_root: PathBuf,
    /// PATH used to look for native binaries; the process PATH when `None`
    pub search_path: Option<String>,
    /// Docker-style host architecture
    pub host_arch: String,
}

impl Default for DevtoolConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            force_container: BTreeSet::new(),
            github_token: None,
            source_root: PathBuf::from("."),
            search_path: None,
            host_arch: platform::host_arch().to_string(),
        }
    }
}

/// `1`, `true`, `yes` and `on` (any case) are truthy
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_tool_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl DevtoolConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        let source_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self {
            verbose: VERBOSE_ENV
                .iter()
                .filter_map(|key| std::env::var(key).ok())
                .any(|v| is_truthy(&v)),
            image_base: non_empty_env(IMAGE_BASE_ENV)
                .unwrap_or_else(|| DEFAULT_IMAGE_BASE.to_string()),
            force_container: non_empty_env(FORCE_CONTAINER_ENV)
                .map(|v| parse_tool_list(&v))
                .unwrap_or_default(),
            github_token: non_empty_env(GITHUB_TOKEN_ENV),
            source_root,
            ..Self::default()
        }
    }

    /// Enable or disable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Override the image repository prefix; trailing slashes are dropped
    pub fn with_image_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        let trimmed = base.trim_end_matches('/');
        self.image_base = if trimmed.is_empty() {
            DEFAULT_IMAGE_BASE.to_string()
        } else {
            trimmed.to_string()
        };
        self
    }

    /// Override the temporary Dockerfile directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Force `tool` onto the container path
    pub fn with_forced_container(mut self, tool: impl Into<String>) -> Self {
        self.force_container.insert(tool.into());
        self
    }

    /// Set the token forwarded to containers
    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Set the host directory mounted as the source tree
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }

    /// Restrict native binary lookup to `path`
    pub fn with_search_path(mut self, path: impl Into<String>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Override the detected host architecture
    pub fn with_host_arch(mut self, arch: impl Into<String>) -> Self {
        self.host_arch = arch.into();
        self
    }

    /// Whether `tool` was forced onto the container path
    pub fn forces_container(&self, tool: &str) -> bool {
        self.force_container.contains(tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_values() {
        for v in ["1", "true", "TRUE", "yes", " on "] {
            assert!(is_truthy(v), "{} should be truthy", v);
        }
        for v in ["", "0", "false", "off", "nope"] {
            assert!(!is_truthy(v), "{} should be falsy", v);
        }
    }

    #[test]
    fn test_tool_list_parsing() {
        let tools = parse_tool_list("tflint, trivy,,golangci-lint ");
        assert_eq!(
            tools.into_iter().collect::<Vec<_>>(),
            ["golangci-lint", "tflint", "trivy"]
        );
    }

    #[test]
    fn test_image_base_fallback() {
        let config = DevtoolConfig::default().with_image_base("");
        assert_eq!(config.image_base, DEFAULT_IMAGE_BASE);
        let config = DevtoolConfig::default().with_image_base("registry.local/ci/");
        assert_eq!(config.image_base, "registry.local/ci");
    }

    #[test]
    fn test_builders() {
        let config = DevtoolConfig::default()
            .with_verbose(true)
            .with_forced_container("tflint")
            .with_github_token(Some(String::new()))
            .with_host_arch("arm64");
        assert!(config.verbose);
        assert!(config.forces_container("tflint"));
        assert!(!config.forces_container("trivy"));
        assert_eq!(config.github_token, None);
        assert_eq!(config.host_arch, "arm64");
    }
}
