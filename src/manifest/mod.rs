//! Tool manifest: the multi-stage Dockerfile pinning every devtool.
//!
//! Each tool has a stage named after it (optionally one per architecture,
//! `<tool>-<arch>`). The pinned version is read from a `<TOOL>_VERSION`
//! build-arg, or from the stage image's tag when no such arg exists.

pub mod parse;

use crate::error::{ManifestError, VersionCheckError};
use crate::platform;
use crate::version::parse_lenient;
use parse::{Manifest, Stage, split_reference};
use std::collections::BTreeMap;
use std::path::Path;

/// The canonical manifest shipped with the crate
pub const TOOLS_DOCKERFILE: &str = include_str!("tools.Dockerfile");

/// Entrypoint file name used for bundled manifests by default
pub const DEFAULT_ENTRYPOINT: &str = "tools.Dockerfile";

/// A tool as pinned by the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Tool name
    pub name: String,
    /// Declared version as written in the manifest
    pub version: String,
    /// Image repository without tag
    pub registry: String,
    /// Fully expanded image reference of the matched stage
    pub image: String,
}

impl ToolDescriptor {
    /// Declared version as a semantic version
    pub fn declared_version(&self) -> Result<semver::Version, VersionCheckError> {
        parse_lenient(&self.version).map_err(|source| VersionCheckError::ParseFailed {
            side: "declared",
            version: self.version.clone(),
            source,
        })
    }
}

/// Build-arg key carrying a tool's pinned version: `golangci-lint` →
/// `GOLANGCI_LINT_VERSION`
pub fn version_build_arg(tool: &str) -> String {
    format!("{}_VERSION", tool.to_ascii_uppercase().replace('-', "_"))
}

fn stage_matches(stage: &str, tool: &str) -> bool {
    stage == tool
        || stage
            .strip_prefix(tool)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(platform::is_known_arch)
}

/// Look up `tool` in manifest text.
///
/// The universal stage is preferred for registry coordinates; an
/// architecture-specific stage is used only when no universal one exists.
pub fn get_tool(text: &str, tool: &str) -> Result<ToolDescriptor, ManifestError> {
    let manifest = Manifest::parse(text);

    let stage: &Stage = manifest
        .stage(tool)
        .or_else(|| manifest.stages().iter().find(|s| stage_matches(&s.name, tool)))
        .ok_or_else(|| ManifestError::ToolNotFound {
            tool: tool.to_string(),
        })?;

    let build_arg = version_build_arg(tool);
    let (registry, tag) = split_reference(&stage.image);

    let version = manifest
        .arg(&build_arg)
        .filter(|v| !v.is_empty())
        .or(tag)
        .ok_or_else(|| ManifestError::VersionNotFound {
            tool: tool.to_string(),
            build_arg: build_arg.clone(),
            image: stage.image.clone(),
        })?;

    Ok(ToolDescriptor {
        name: tool.to_string(),
        version: version.to_string(),
        registry: registry.to_string(),
        image: stage.image.clone(),
    })
}

/// Where the Dockerfile for an image build comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// A single Dockerfile; the build context is an empty directory
    Inline(String),
    /// Several files written together into the build context
    Bundled {
        /// File name → contents
        files: BTreeMap<String, String>,
        /// Which file is the Dockerfile
        entrypoint: String,
    },
}

impl ManifestSource {
    /// The manifest compiled into this crate
    pub fn embedded() -> Self {
        ManifestSource::Inline(TOOLS_DOCKERFILE.to_string())
    }

    /// Read a single Dockerfile from disk
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        std::fs::read_to_string(path)
            .map(ManifestSource::Inline)
            .map_err(|source| ManifestError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Read every regular file in `dir` (not recursive) as a bundle
    pub fn from_dir(dir: &Path, entrypoint: &str) -> Result<Self, ManifestError> {
        let read_err = |path: &Path, source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut files = BTreeMap::new();
        for entry in std::fs::read_dir(dir).map_err(|e| read_err(dir, e))? {
            let entry = entry.map_err(|e| read_err(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let contents = std::fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
            files.insert(entry.file_name().to_string_lossy().into_owned(), contents);
        }

        let source = ManifestSource::Bundled {
            files,
            entrypoint: entrypoint.to_string(),
        };
        source.text()?;
        Ok(source)
    }

    /// Dockerfile text used for stage and version lookups
    pub fn text(&self) -> Result<&str, ManifestError> {
        match self {
            ManifestSource::Inline(text) => Ok(text),
            ManifestSource::Bundled { files, entrypoint } => files
                .get(entrypoint)
                .map(String::as_str)
                .ok_or_else(|| ManifestError::MissingEntrypoint {
                    entrypoint: entrypoint.clone(),
                }),
        }
    }

    /// Look up `tool` in this manifest
    pub fn tool(&self, tool: &str) -> Result<ToolDescriptor, ManifestError> {
        get_tool(self.text()?, tool)
    }
}

impl Default for ManifestSource {
    fn default() -> Self {
        Self::embedded()
    }
}
