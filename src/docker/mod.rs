//! Container integration for devtools.
//!
//! Devtools that are missing or out of policy on the host run inside a
//! version-pinned image instead. This module owns that image's lifecycle and
//! the `docker` boundary.
//!
//! # Module Structure
//!
//! - `runtime` - `ContainerRuntime` capability and its request types
//! - `cli` - Runtime backed by the `docker` client
//! - `context` - Scoped temporary build contexts
//! - `guard` - RAII guard for container cleanup
//! - `image` - Image naming, reuse and build/pull

mod cli;
mod context;
mod guard;
mod image;
mod runtime;

pub use cli::{DOCKER_INFO_TIMEOUT, DockerCli};
pub use context::BuildContext;
pub use image::{ImageBuilder, ImageStrategy, image_name};
pub use runtime::{BuildRequest, ContainerRuntime, RunRequest};
