//! Installed-version checks for native devtools.
//!
//! A native binary is only used when the version it reports satisfies the
//! tool's [`VersionRule`] relative to the version pinned in the manifest.
//! Any failure here is advisory: the dispatcher falls back to the container.

mod policy;

pub use policy::VersionRule;

use crate::error::VersionCheckError;
use crate::exec::{self, Invocation, OutputSink};
use semver::Version;
use std::path::Path;

/// How to ask a tool for its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionProbe {
    /// Arguments passed to the binary, e.g. `["--version"]`
    pub args: &'static [&'static str],
    /// Zero-based whitespace-delimited token holding the version
    pub field: usize,
}

impl VersionProbe {
    /// Probe with the given arguments reading token `field`
    pub const fn new(args: &'static [&'static str], field: usize) -> Self {
        Self { args, field }
    }

    /// Pull the version token out of the tool's output.
    ///
    /// Stdout is searched first; tools that report on stderr are handled by
    /// falling back to it.
    pub fn extract(&self, command: &str, stdout: &str, stderr: &str) -> Result<String, VersionCheckError> {
        [stdout, stderr]
            .iter()
            .find_map(|out| out.split_whitespace().nth(self.field))
            .map(str::to_string)
            .ok_or_else(|| VersionCheckError::MissingVersionToken {
                command: command.to_string(),
                output: if stdout.is_empty() { stderr } else { stdout }.to_string(),
            })
    }
}

/// Parse a version as tools print it.
///
/// Leading non-digits (`v`, `go`) are dropped and missing minor/patch
/// components are padded with zero, so `go1.21` parses as `1.21.0`.
/// Anything else is handed to [`semver`] as-is.
pub fn parse_lenient(raw: &str) -> Result<Version, semver::Error> {
    let trimmed = raw.trim().trim_start_matches(|c: char| !c.is_ascii_digit());

    let core_len = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(core_len);
    let core = core.trim_end_matches('.');

    let parts = core.split('.').filter(|p| !p.is_empty()).count();
    if parts == 0 || parts > 3 {
        return Version::parse(raw.trim());
    }

    let mut normalized = core.to_string();
    for _ in parts..3 {
        normalized.push_str(".0");
    }
    // Keep semver pre-release/build suffixes; drop free-form trailers
    if rest.starts_with('-') || rest.starts_with('+') {
        normalized.push_str(rest);
    }
    Version::parse(&normalized)
}

fn parse_side(side: &'static str, version: &str) -> Result<Version, VersionCheckError> {
    parse_lenient(version).map_err(|source| VersionCheckError::ParseFailed {
        side,
        version: version.to_string(),
        source,
    })
}

/// Check an installed version against `rule` relative to `declared`.
///
/// Both sides must parse; an unparsable version is an error, never a pass.
pub fn check_installed(rule: &VersionRule, declared: &str, installed: &str) -> Result<(), VersionCheckError> {
    let declared = parse_side("declared", declared)?;
    let found = parse_side("installed", installed)?;
    let requirement = rule.requirement(&declared)?;

    if requirement.matches(&found) {
        Ok(())
    } else {
        Err(VersionCheckError::Unsatisfied {
            found: found.to_string(),
            constraint: requirement.to_string(),
        })
    }
}

/// Ask `binary` for its version using `probe`
pub async fn installed_version(binary: &Path, probe: &VersionProbe) -> Result<String, VersionCheckError> {
    let invocation = Invocation::new(binary.to_string_lossy(), probe.args.iter().copied())
        .stdout(OutputSink::Capture)
        .stderr(OutputSink::Capture);
    let command = format!("{} {}", binary.display(), probe.args.join(" "));

    match exec::execute(&invocation).await {
        Ok(out) => probe.extract(&command, &out.stdout, &out.stderr),
        Err(e) => Err(VersionCheckError::Probe(Box::new(e))),
    }
}

/// Probe `binary` and check the result against `rule` and `declared`
pub async fn version_ok(
    binary: &Path,
    probe: &VersionProbe,
    rule: &VersionRule,
    declared: &str,
) -> Result<(), VersionCheckError> {
    let installed = installed_version(binary, probe).await?;
    log::debug!(
        "{}: installed {}, declared {}, rule {}",
        binary.display(),
        installed,
        declared,
        rule
    );
    check_installed(rule, declared, &installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_major_minor_policy() {
        let rule = VersionRule::SameMajorMinor;
        assert!(check_installed(&rule, "2.10.1", "2.10.0").is_ok());
        assert!(check_installed(&rule, "2.10.1", "2.10.9").is_ok());
        assert!(check_installed(&rule, "2.10.1", "2.9.9").is_err());
        assert!(check_installed(&rule, "2.10.1", "2.11.0").is_err());
    }

    #[test]
    fn test_minor_ahead_policy() {
        let rule = VersionRule::MinorAtLeast { offset: 1 };
        assert!(check_installed(&rule, "1.30.0", "1.31.0").is_ok());
        assert!(check_installed(&rule, "1.30.0", "1.30.5").is_err());
    }

    #[test]
    fn test_minor_drift_policy() {
        let rule = VersionRule::MinorAtLeast { offset: -2 };
        assert!(check_installed(&rule, "0.50.3", "0.48.0").is_ok());
        assert!(check_installed(&rule, "0.50.3", "0.47.9").is_err());
        assert!(check_installed(&rule, "0.50.3", "1.0.0").is_ok());
    }

    #[test]
    fn test_unsatisfied_names_found_and_constraint() {
        let err = check_installed(&VersionRule::SameMajorMinor, "2.10.1", "2.9.9")
            .expect_err("must be unsatisfied");
        let rendered = err.to_string();
        assert!(rendered.contains("2.9.9"));
        assert!(rendered.contains("~2.10"));
    }

    #[test]
    fn test_unparsable_declared_is_error() {
        let err = check_installed(&VersionRule::SameMajorMinor, "latest", "2.10.0")
            .expect_err("declared version must parse");
        assert!(matches!(
            err,
            VersionCheckError::ParseFailed { side: "declared", .. }
        ));
    }

    #[test]
    fn test_unparsable_installed_is_error() {
        let err = check_installed(&VersionRule::SameMajorMinor, "2.10.1", "dev")
            .expect_err("installed version must parse");
        assert!(matches!(
            err,
            VersionCheckError::ParseFailed { side: "installed", .. }
        ));
    }

    #[test]
    fn test_parse_lenient_prefixes() {
        assert_eq!(parse_lenient("v1.5.7").expect("parse"), Version::new(1, 5, 7));
        assert_eq!(parse_lenient("go1.21.5").expect("parse"), Version::new(1, 21, 5));
        assert_eq!(parse_lenient("go1.22").expect("parse"), Version::new(1, 22, 0));
        assert_eq!(parse_lenient("1.55.2,").expect("parse"), Version::new(1, 55, 2));
    }

    #[test]
    fn test_parse_lenient_keeps_prerelease() {
        let v = parse_lenient("v2.0.0-rc.1").expect("parse");
        assert_eq!(v.pre.as_str(), "rc.1");
    }

    #[test]
    fn test_parse_lenient_rejects_garbage() {
        assert!(parse_lenient("").is_err());
        assert!(parse_lenient("1.2.3.4").is_err());
    }

    #[test]
    fn test_probe_extracts_field() {
        let probe = VersionProbe::new(&["--version"], 3);
        let token = probe
            .extract(
                "golangci-lint --version",
                "golangci-lint has version 2.10.1 built with go1.24.1\n",
                "",
            )
            .expect("token present");
        assert_eq!(token, "2.10.1");
    }

    #[test]
    fn test_probe_falls_back_to_stderr() {
        let probe = VersionProbe::new(&["-v"], 0);
        let token = probe.extract("kubeconform -v", "", "v0.6.4\n").expect("token");
        assert_eq!(token, "v0.6.4");
    }

    #[test]
    fn test_probe_missing_token() {
        let probe = VersionProbe::new(&["version"], 5);
        assert!(matches!(
            probe.extract("terraform version", "Terraform v1.5.7\n", ""),
            Err(VersionCheckError::MissingVersionToken { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_ok_runs_probe() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("fake-lint");
        std::fs::write(&bin, "#!/bin/sh\necho \"fake-lint has version 2.10.4 built\"\n")
            .expect("write script");
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let probe = VersionProbe::new(&["--version"], 3);
        assert!(version_ok(&bin, &probe, &VersionRule::SameMajorMinor, "2.10.1").await.is_ok());
        assert!(version_ok(&bin, &probe, &VersionRule::SameMajorMinor, "2.11.0").await.is_err());
    }
}
