//! Scoped build contexts.
//!
//! The Dockerfile and context directory live under the configured output
//! directory with random suffixes, so concurrent builds never collide. Both
//! are removed when the [`BuildContext`] is dropped, on every exit path.

use crate::error::ImageBuildError;
use crate::manifest::ManifestSource;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// Dockerfile plus context directory for one image build
#[derive(Debug)]
pub struct BuildContext {
    dockerfile: PathBuf,
    dir: TempDir,
    // Held for its Drop; inline manifests only
    _file: Option<NamedTempFile>,
}

impl BuildContext {
    /// Write `source` for `tool` below `output_dir`.
    ///
    /// Inline manifests become a single temp Dockerfile next to an empty
    /// context directory. Bundles are written into the context directory
    /// and the entrypoint file is used as the Dockerfile.
    pub fn materialize(output_dir: &Path, tool: &str, source: &ManifestSource) -> Result<Self, ImageBuildError> {
        let ctx_err = |source| ImageBuildError::Context {
            dir: output_dir.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(output_dir).map_err(ctx_err)?;

        match source {
            ManifestSource::Inline(text) => {
                let mut file = tempfile::Builder::new()
                    .prefix(&format!("{}.", tool))
                    .suffix(".Dockerfile")
                    .tempfile_in(output_dir)
                    .map_err(ctx_err)?;
                file.write_all(text.as_bytes()).map_err(ctx_err)?;
                file.flush().map_err(ctx_err)?;

                let dir = tempfile::Builder::new()
                    .prefix(&format!("{}-context-", tool))
                    .tempdir_in(output_dir)
                    .map_err(ctx_err)?;

                Ok(Self {
                    dockerfile: file.path().to_path_buf(),
                    dir,
                    _file: Some(file),
                })
            }
            ManifestSource::Bundled { files, entrypoint } => {
                let dir = tempfile::Builder::new()
                    .prefix(&format!("{}-docker-", tool))
                    .tempdir_in(output_dir)
                    .map_err(ctx_err)?;

                for (name, contents) in files {
                    let path = dir.path().join(name);
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent).map_err(ctx_err)?;
                    }
                    std::fs::write(&path, contents).map_err(ctx_err)?;
                }

                let dockerfile = dir.path().join(entrypoint);
                if !dockerfile.is_file() {
                    return Err(ctx_err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("bundle has no entrypoint '{}'", entrypoint),
                    )));
                }

                Ok(Self {
                    dockerfile,
                    dir,
                    _file: None,
                })
            }
        }
    }

    /// Path passed to `-f`
    pub fn dockerfile(&self) -> &Path {
        &self.dockerfile
    }

    /// Context directory passed as the build path
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}
