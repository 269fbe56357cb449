//! Command line argument parsing.

use crate::config::DevtoolConfig;
use crate::error::Result;
use crate::manifest::{DEFAULT_ENTRYPOINT, ManifestSource};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Run CI devtools natively or in version-pinned containers
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_devtool",
    version,
    about = "Run CI devtools natively or in version-pinned containers",
    long_about = "Run linters, compilers and scanners the way CI does.

A tool runs natively when its binary is on PATH and its version is within
the tool's policy relative to the pinned manifest. Otherwise its image is
built (or pulled) for the host architecture and the tool runs in Docker.

Usage:
  kodegen_devtool run golangci-lint -- run ./...
  kodegen_devtool run tflint -C infra/prod -- --recursive
  kodegen_devtool ensure-image terraform
  kodegen_devtool select-stage policy-bot --arch arm64"
)]
pub struct Args {
    /// Forward tool output live and log command lines
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository prefix for devtool images
    #[arg(long, global = true, env = "OCI_IMAGE_BASE", value_name = "REPO")]
    pub image_base: Option<String>,

    /// Directory for temporary Dockerfiles
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Use this Dockerfile instead of the built-in manifest
    #[arg(long, global = true, value_name = "FILE", conflicts_with = "manifest_dir")]
    pub manifest: Option<PathBuf>,

    /// Use every file in this directory as the build context
    #[arg(long, global = true, value_name = "DIR")]
    pub manifest_dir: Option<PathBuf>,

    /// Dockerfile inside --manifest-dir
    #[arg(long, global = true, default_value = DEFAULT_ENTRYPOINT, value_name = "FILE")]
    pub entrypoint: String,

    /// Build for this architecture instead of the host's
    #[arg(long, global = true, value_name = "ARCH")]
    pub arch: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a devtool natively or in its container
    Run {
        /// Tool name, e.g. golangci-lint
        tool: String,

        /// Working directory, relative to the source root
        #[arg(short = 'C', long, value_name = "DIR")]
        workdir: Option<PathBuf>,

        /// Environment for the tool, KEY=VALUE (repeatable)
        #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        env: Vec<(String, String)>,

        /// Skip the native binary
        #[arg(long)]
        force_container: bool,

        /// Arguments for the tool
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Build or pull a devtool image and print its reference
    EnsureImage {
        /// Tool name
        tool: String,
    },

    /// Print the build stage chosen for a tool
    SelectStage {
        /// Tool name
        tool: String,
    },

    /// Check an installed tool against its version policy
    CheckVersion {
        /// Tool name
        tool: String,
    },

    /// Print the image reference for a tool
    ImageName {
        /// Tool name
        tool: String,
    },

    /// List built-in devtools
    Tools,
}

impl Command {
    /// Subcommand name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Run { .. } => "run",
            Command::EnsureImage { .. } => "ensure-image",
            Command::SelectStage { .. } => "select-stage",
            Command::CheckVersion { .. } => "check-version",
            Command::ImageName { .. } => "image-name",
            Command::Tools => "tools",
        }
    }
}

fn parse_key_val(s: &str) -> anyhow::Result<(String, String)> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => anyhow::bail!("expected KEY=VALUE, got '{}'", s),
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Environment configuration with command line overrides applied
    pub fn config(&self) -> DevtoolConfig {
        let mut config = DevtoolConfig::from_env();
        let verbose = config.verbose || self.verbose;
        config = config.with_verbose(verbose);
        if let Some(base) = &self.image_base {
            config = config.with_image_base(base.clone());
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir.clone());
        }
        if let Some(arch) = &self.arch {
            config = config.with_host_arch(arch.clone());
        }
        if let Command::Run {
            tool,
            force_container: true,
            ..
        } = &self.command
        {
            config = config.with_forced_container(tool.clone());
        }
        config
    }

    /// Manifest selected by --manifest / --manifest-dir
    pub fn manifest_source(&self) -> Result<ManifestSource> {
        if let Some(path) = &self.manifest {
            return Ok(ManifestSource::from_file(path)?);
        }
        if let Some(dir) = &self.manifest_dir {
            return Ok(ManifestSource::from_dir(dir, &self.entrypoint)?);
        }
        Ok(ManifestSource::embedded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_collects_trailing_args() {
        let args = Args::try_parse_from([
            "kodegen_devtool",
            "run",
            "golangci-lint",
            "-C",
            "services/api",
            "-e",
            "GOFLAGS=-mod=mod",
            "--",
            "run",
            "--timeout",
            "10m",
        ])
        .expect("valid args");

        match args.command {
            Command::Run {
                tool,
                workdir,
                env,
                args,
                force_container,
            } => {
                assert_eq!(tool, "golangci-lint");
                assert_eq!(workdir, Some(PathBuf::from("services/api")));
                assert_eq!(env, [("GOFLAGS".to_string(), "-mod=mod".to_string())]);
                assert_eq!(args, ["run", "--timeout", "10m"]);
                assert!(!force_container);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_force_container_flag_reaches_config() {
        let args = Args::try_parse_from(["kodegen_devtool", "run", "tflint", "--force-container"])
            .expect("valid args");
        assert!(args.config().forces_container("tflint"));
    }

    #[test]
    fn test_verbose_flag_reaches_config() {
        let args = Args::try_parse_from(["kodegen_devtool", "--verbose", "tools"]).expect("valid args");
        assert!(args.config().verbose);
    }

    #[test]
    fn test_global_overrides() {
        let args = Args::try_parse_from([
            "kodegen_devtool",
            "image-name",
            "trivy",
            "--image-base",
            "registry.local/ci",
            "--arch",
            "arm64",
        ])
        .expect("valid args");
        let config = args.config();
        assert_eq!(config.image_base, "registry.local/ci");
        assert_eq!(config.host_arch, "arm64");
        assert_eq!(args.command.name(), "image-name");
    }

    #[test]
    fn test_manifest_flags_conflict() {
        assert!(Args::try_parse_from([
            "kodegen_devtool",
            "tools",
            "--manifest",
            "a",
            "--manifest-dir",
            "b",
        ])
        .is_err());
    }

    #[test]
    fn test_env_requires_key() {
        assert!(parse_key_val("=x").is_err());
        assert!(parse_key_val("nokey").is_err());
        assert_eq!(
            parse_key_val("A=b=c").expect("valid"),
            ("A".to_string(), "b=c".to_string())
        );
    }
}
