//! # kodegen_devtool
//!
//! Devtool resolution and execution for CI targets.
//!
//! Every external tool a CI target needs (Go toolchain, golangci-lint,
//! Terraform, tflint, trivy, terraform-docs, kubeconform, policy-bot) is run
//! through one pattern: use the host binary when it is installed and within
//! the tool's version policy, otherwise build or pull a version-pinned image
//! and run the same command in Docker.
//!
//! ## Layers
//!
//! - [`exec`] - process execution with env overlay, `$VAR` expansion and
//!   exit-code fidelity
//! - [`version`] - version parsing and per-tool rules
//! - [`manifest`] - the multi-stage tools Dockerfile pinning every tool
//! - [`platform`] - host architecture and build-stage selection
//! - [`docker`] - container runtime boundary and image lifecycle
//! - [`devtool`] - tool catalog and the native-or-container dispatcher
//!
//! ## Usage
//!
//! ```bash
//! kodegen_devtool run golangci-lint -- run ./...
//! kodegen_devtool ensure-image tflint
//! kodegen_devtool select-stage policy-bot
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod devtool;
pub mod docker;
pub mod error;
pub mod exec;
pub mod manifest;
pub mod platform;
pub mod version;

// Re-export main types for public API
pub use config::DevtoolConfig;
pub use devtool::{Dispatcher, ExecutionTarget, ToolRequest, ToolSpec};
pub use docker::{ContainerRuntime, DockerCli, ImageBuilder, ImageStrategy};
pub use error::{DevtoolError, Result};
pub use exec::{Invocation, OutputSink, ProcessRunner, execute};
pub use manifest::{ManifestSource, ToolDescriptor, get_tool};
pub use platform::select_stage;
pub use version::VersionRule;
