//! Devtool image lifecycle: name, reuse, build or pull.

use super::context::BuildContext;
use super::runtime::{BuildRequest, ContainerRuntime};
use crate::config::DevtoolConfig;
use crate::error::{DevtoolError, Result};
use crate::manifest::{ManifestSource, version_build_arg};
use crate::platform;
use std::sync::Arc;

/// How a tool's image is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStrategy {
    /// Build the architecture-selected manifest stage
    Build,
    /// Pull the manifest's upstream image when the host is this
    /// architecture; build elsewhere
    PullUpstreamOn(&'static str),
}

/// Canonical devtool image reference: `<base>/<tool>-devtool:<version>`.
///
/// `latest` is used when no version is known.
pub fn image_name(image_base: &str, tool: &str, version: Option<&str>) -> String {
    let version = version.filter(|v| !v.is_empty()).unwrap_or("latest");
    format!("{}/{}-devtool:{}", image_base.trim_end_matches('/'), tool, version)
}

/// Makes devtool images available locally.
///
/// Stateless apart from the shared runtime handle; concurrent calls for the
/// same tool may both build, which only overwrites the same tag.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    config: DevtoolConfig,
    runtime: Arc<dyn ContainerRuntime>,
}

impl ImageBuilder {
    /// Create a builder over `runtime`
    pub fn new(config: DevtoolConfig, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { config, runtime }
    }

    /// Ensures the image for `tool` exists for the host architecture.
    ///
    /// # Arguments
    ///
    /// * `tool` - Tool name as declared in the manifest
    /// * `source` - Manifest to read the pinned version and stages from
    /// * `strategy` - Whether this tool may pull an upstream image instead
    ///
    /// # Returns
    ///
    /// * `Ok(image)` - Reference to run
    /// * `Err` - Manifest lookup, stage selection, build or pull failed
    pub async fn ensure_image(&self, tool: &str, source: &ManifestSource, strategy: ImageStrategy) -> Result<String> {
        let descriptor = source.tool(tool)?;
        let host_arch = self.config.host_arch.as_str();

        if self.pulls_upstream(strategy) {
            log::info!("{}: pulling upstream image {}", tool, descriptor.image);
            self.runtime.pull(&descriptor.image).await?;
            return Ok(descriptor.image);
        }

        let image = image_name(&self.config.image_base, tool, Some(&descriptor.version));

        if let Some(arch) = self.runtime.inspect_architecture(&image).await? {
            if arch == host_arch {
                // The tag is trusted; a manifest edit without a version bump
                // is not detected here.
                log::debug!("{}: reusing {} ({}), content not re-verified", tool, image, arch);
                return Ok(image);
            }
            log::info!("{}: found {} for {}, rebuilding for {}", tool, image, arch, host_arch);
        }

        let stage = platform::select_stage(tool, source.text()?, host_arch)?;
        let context = BuildContext::materialize(&self.config.output_dir, tool, source)?;

        let request = BuildRequest {
            tool: tool.to_string(),
            image: image.clone(),
            dockerfile: context.dockerfile().to_path_buf(),
            context: context.dir().to_path_buf(),
            target: Some(stage),
            arch: host_arch.to_string(),
            build_args: vec![
                ("TARGETARCH".to_string(), host_arch.to_string()),
                (version_build_arg(tool), descriptor.version.clone()),
            ],
        };

        self.runtime
            .build(&request)
            .await
            .map_err(|e: DevtoolError| e.context(format!("{}: build image", tool)))?;

        // BuildContext dropped here, after the build returned
        drop(context);
        Ok(image)
    }

    /// Reference [`ensure_image`](Self::ensure_image) resolves to, without
    /// touching the runtime
    pub fn image_reference(&self, tool: &str, source: &ManifestSource, strategy: ImageStrategy) -> Result<String> {
        let descriptor = source.tool(tool)?;
        if self.pulls_upstream(strategy) {
            return Ok(descriptor.image);
        }
        Ok(image_name(&self.config.image_base, tool, Some(&descriptor.version)))
    }

    fn pulls_upstream(&self, strategy: ImageStrategy) -> bool {
        matches!(strategy, ImageStrategy::PullUpstreamOn(arch) if arch == self.config.host_arch)
    }
}
