//! Built-in devtool definitions.
//!
//! Every tool follows the same native-or-container pattern; what differs is
//! captured here as data.

use super::mounts::MountProfile;
use crate::docker::ImageStrategy;
use crate::error::{DevtoolError, Result};
use crate::version::{VersionProbe, VersionRule};

/// How to find and vet a natively installed binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSpec {
    /// Binary name looked up on PATH
    pub binary: &'static str,
    /// How to ask the binary for its version
    pub probe: VersionProbe,
    /// Allowed drift from the manifest version
    pub rule: VersionRule,
}

/// One devtool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Tool name; also the manifest stage name
    pub name: &'static str,
    /// Native execution; `None` for container-only tools
    pub native: Option<NativeSpec>,
    /// Command placed after the image; the image entrypoint when `None`
    pub container_command: Option<&'static str>,
    /// Host directories and environment mirrored into the container
    pub mounts: MountProfile,
    /// Arguments placed before the caller's on both paths
    pub default_args: &'static [&'static str],
    /// How the image is obtained
    pub image: ImageStrategy,
    /// `(VAR, value)` that forces the container path when set
    pub force_env: Option<(&'static str, &'static str)>,
    /// Forward `GITHUB_TOKEN` into the container
    pub forwards_github_token: bool,
    /// Stream stdout live even when not verbose
    pub live_output: bool,
    /// Printed when the binary is missing
    pub install_hint: Option<&'static str>,
}

impl ToolSpec {
    fn base(name: &'static str) -> Self {
        Self {
            name,
            native: None,
            container_command: None,
            mounts: MountProfile::Plain,
            default_args: &[],
            image: ImageStrategy::Build,
            force_env: None,
            forwards_github_token: false,
            live_output: false,
            install_hint: None,
        }
    }

    fn native(mut self, binary: &'static str, probe: VersionProbe, rule: VersionRule) -> Self {
        self.native = Some(NativeSpec { binary, probe, rule });
        self
    }

    /// Go toolchain, run with docker-in-docker support for testcontainers
    pub fn golang() -> Self {
        Self {
            container_command: Some("go"),
            mounts: MountProfile::Go,
            live_output: true,
            install_hint: Some("brew install go"),
            ..Self::base("golang").native(
                "go",
                VersionProbe::new(&["version"], 2),
                VersionRule::MinorAtLeast { offset: 1 },
            )
        }
    }

    /// golangci-lint; breaking changes land in minor releases
    pub fn golangci_lint() -> Self {
        Self {
            container_command: Some("golangci-lint"),
            mounts: MountProfile::GoLint,
            install_hint: Some("brew install golangci-lint"),
            ..Self::base("golangci-lint").native(
                "golangci-lint",
                VersionProbe::new(&["--version"], 3),
                VersionRule::SameMajorMinor,
            )
        }
    }

    /// Terraform CLI
    pub fn terraform() -> Self {
        Self {
            mounts: MountProfile::Terraform,
            install_hint: Some("brew install terraform"),
            ..Self::base("terraform").native(
                "terraform",
                VersionProbe::new(&["version"], 1),
                VersionRule::Range(">=1.3.6, <1.6.0".to_string()),
            )
        }
    }

    /// tflint; plugins are downloaded from GitHub
    pub fn tflint() -> Self {
        Self {
            mounts: MountProfile::TfLint,
            force_env: Some(("TFLINT_DOCKER", "1")),
            forwards_github_token: true,
            ..Self::base("tflint").native(
                "tflint",
                VersionProbe::new(&["--version"], 2),
                VersionRule::MinorAtLeast { offset: -2 },
            )
        }
    }

    /// trivy security scanner
    pub fn trivy() -> Self {
        Self {
            mounts: MountProfile::Trivy,
            forwards_github_token: true,
            ..Self::base("trivy").native(
                "trivy",
                VersionProbe::new(&["--version"], 1),
                VersionRule::MinorAtLeast { offset: 0 },
            )
        }
    }

    /// terraform-docs generator
    pub fn terraform_docs() -> Self {
        Self::base("terraform-docs").native(
            "terraform-docs",
            VersionProbe::new(&["--version"], 2),
            VersionRule::MinorAtLeast { offset: -2 },
        )
    }

    /// kubeconform manifest validator
    pub fn kubeconform() -> Self {
        Self {
            default_args: &["--output", "pretty", "--strict", "--verbose"],
            install_hint: Some("brew install kubeconform"),
            ..Self::base("kubeconform").native(
                "kubeconform",
                VersionProbe::new(&["-v"], 0),
                VersionRule::MinorAtLeast { offset: -1 },
            )
        }
    }

    /// policy-bot config checker; container only, upstream image on amd64
    pub fn policy_bot() -> Self {
        Self {
            image: ImageStrategy::PullUpstreamOn("amd64"),
            ..Self::base("policy-bot")
        }
    }
}

/// Every built-in tool
pub fn all() -> Vec<ToolSpec> {
    vec![
        ToolSpec::golang(),
        ToolSpec::golangci_lint(),
        ToolSpec::terraform(),
        ToolSpec::tflint(),
        ToolSpec::trivy(),
        ToolSpec::terraform_docs(),
        ToolSpec::kubeconform(),
        ToolSpec::policy_bot(),
    ]
}

/// Find a built-in tool by name
pub fn lookup(name: &str) -> Result<ToolSpec> {
    all()
        .into_iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| DevtoolError::UnknownTool {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestSource, TOOLS_DOCKERFILE, get_tool};
    use crate::version::check_installed;

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(lookup("tflint").expect("known").name, "tflint");
        assert!(matches!(
            lookup("helm"),
            Err(DevtoolError::UnknownTool { .. })
        ));
    }

    #[test]
    fn test_every_tool_is_in_embedded_manifest() {
        let source = ManifestSource::embedded();
        for spec in all() {
            assert!(source.tool(spec.name).is_ok(), "{} missing from manifest", spec.name);
        }
    }

    #[test]
    fn test_rules_accept_the_pinned_version() {
        for spec in all() {
            let Some(native) = spec.native else { continue };
            let declared = get_tool(TOOLS_DOCKERFILE, spec.name).expect("declared").version;
            // golang must stay ahead of its pin, so the pin itself fails
            if spec.name == "golang" {
                assert!(check_installed(&native.rule, &declared, &declared).is_err());
                continue;
            }
            check_installed(&native.rule, &declared, &declared)
                .unwrap_or_else(|e| panic!("{}: {}", spec.name, e));
        }
    }

    #[test]
    fn test_policy_bot_is_container_only() {
        let spec = ToolSpec::policy_bot();
        assert!(spec.native.is_none());
        assert_eq!(spec.image, ImageStrategy::PullUpstreamOn("amd64"));
    }

    #[test]
    fn test_kubeconform_default_args() {
        assert_eq!(
            ToolSpec::kubeconform().default_args,
            ["--output", "pretty", "--strict", "--verbose"]
        );
    }
}
