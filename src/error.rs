//! Error types for devtool resolution and execution.
//!
//! Lower layers return their own error enums; [`DevtoolError`] wraps them so
//! callers can match on the failing phase and map it to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for devtool operations
pub type Result<T> = std::result::Result<T, DevtoolError>;

/// Exit code reported when a command could not be located or started.
pub const EXIT_NOT_STARTED: i32 = 127;

/// Main error type for all devtool operations
#[derive(Error, Debug)]
pub enum DevtoolError {
    /// Manifest lookup errors
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Installed version did not satisfy the tool's policy
    #[error("Version check error: {0}")]
    Version(#[from] VersionCheckError),

    /// No build stage for tool + architecture
    #[error("{0}")]
    Architecture(#[from] ArchitectureSelectionError),

    /// Container image build or pull failed
    #[error("Image build error: {0}")]
    ImageBuild(#[from] ImageBuildError),

    /// External process errors
    #[error("{0}")]
    Process(#[from] ProcessError),

    /// Tool is not part of the catalog
    #[error("Unknown devtool '{name}'")]
    UnknownTool {
        /// Requested tool name
        name: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error annotated with the tool, directory or phase it happened in
    #[error("{context}: {source}")]
    Context {
        /// Human readable context, e.g. "golangci-lint: ensure image"
        context: String,
        /// Underlying error
        #[source]
        source: Box<DevtoolError>,
    },
}

/// Errors reading the tool manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// No stage declared for the tool
    #[error("No build stage for tool '{tool}' found in manifest")]
    ToolNotFound {
        /// Tool name
        tool: String,
    },

    /// Stage found but no version could be extracted
    #[error("No pinned version for tool '{tool}' in manifest (looked for build-arg {build_arg} and the image tag of '{image}')")]
    VersionNotFound {
        /// Tool name
        tool: String,
        /// Build-arg key that was looked up
        build_arg: String,
        /// Image reference of the matched stage
        image: String,
    },

    /// A bundled manifest is missing its entrypoint Dockerfile
    #[error("Bundled manifest has no entrypoint file '{entrypoint}'")]
    MissingEntrypoint {
        /// Expected file name
        entrypoint: String,
    },

    /// Manifest file could not be read
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        /// Manifest path
        path: PathBuf,
        /// IO error
        #[source]
        source: std::io::Error,
    },
}

/// Errors checking a natively installed tool against its version policy
#[derive(Error, Debug)]
pub enum VersionCheckError {
    /// Version string could not be parsed
    #[error("Failed to parse {side} version '{version}': {source}")]
    ParseFailed {
        /// "installed" or "declared"
        side: &'static str,
        /// Offending version string
        version: String,
        /// Parsing error
        #[source]
        source: semver::Error,
    },

    /// Tool did not print a version token where expected
    #[error("Could not find a version in the output of '{command}': {output:?}")]
    MissingVersionToken {
        /// Version command
        command: String,
        /// Raw output
        output: String,
    },

    /// Constraint expression could not be built
    #[error("Invalid version constraint '{expression}': {source}")]
    InvalidConstraint {
        /// Rendered constraint
        expression: String,
        /// Parsing error
        #[source]
        source: semver::Error,
    },

    /// Installed version is outside the allowed range
    #[error("version found {found} does not match constraint {constraint}")]
    Unsatisfied {
        /// Installed version as reported by the tool
        found: String,
        /// Constraint expression
        constraint: String,
    },

    /// The version command itself failed
    #[error("Failed to query installed version: {0}")]
    Probe(#[source] Box<ProcessError>),

    /// Tool has no native binary to check
    #[error("'{tool}' has no native binary")]
    NoNativeBinary {
        /// Tool name
        tool: String,
    },
}

/// No build stage matches the tool on the host architecture
#[derive(Error, Debug)]
#[error(
    "unable to find devtool for tool \"{tool}\" for the host architecture {arch} or universal: neither stage \"{tool}-{arch}\" nor \"{tool}\" is declared"
)]
pub struct ArchitectureSelectionError {
    /// Tool name
    pub tool: String,
    /// Host architecture
    pub arch: String,
}

/// Errors producing a devtool image
#[derive(Error, Debug)]
pub enum ImageBuildError {
    /// `docker buildx build` failed
    #[error("Building image {image} for '{tool}' failed with exit code {code}{}", render_log(.log))]
    BuildFailed {
        /// Tool name
        tool: String,
        /// Image tag being built
        image: String,
        /// Exit code of the build
        code: i32,
        /// Captured build output
        log: String,
    },

    /// `docker pull` failed
    #[error("Pulling image {image} failed with exit code {code}{}", render_log(.log))]
    PullFailed {
        /// Image reference
        image: String,
        /// Exit code of the pull
        code: i32,
        /// Captured pull output
        log: String,
    },

    /// Temporary build context could not be prepared
    #[error("Failed to prepare build context in {dir}: {source}")]
    Context {
        /// Output directory
        dir: PathBuf,
        /// IO error
        #[source]
        source: std::io::Error,
    },
}

fn render_log(log: &str) -> String {
    if log.trim().is_empty() {
        String::new()
    } else {
        format!("\n\n=== BUILD OUTPUT ===\n{}", log.trim_end())
    }
}

/// External process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Command could not be located or executed
    #[error("failed to run \"{command}\": {source}")]
    NotStarted {
        /// Rendered command line
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Command ran and exited non-zero
    #[error("running \"{command}\" failed with exit code {code}")]
    Failed {
        /// Rendered command line
        command: String,
        /// Exit code (1 if the process exposed none)
        code: i32,
        /// Captured stdout, if it was captured
        stdout: String,
        /// Captured stderr, if it was captured
        stderr: String,
    },
}

impl ProcessError {
    /// Whether the command actually ran
    pub fn ran(&self) -> bool {
        matches!(self, ProcessError::Failed { .. })
    }

    /// Exit code of the command, 1 if it never ran
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Failed { code, .. } => *code,
            ProcessError::NotStarted { .. } => 1,
        }
    }

    /// Captured output of a failed command, stdout first
    pub fn captured_output(&self) -> String {
        match self {
            ProcessError::Failed { stdout, stderr, .. } => {
                let mut out = stdout.clone();
                if !stderr.is_empty() {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(stderr);
                }
                out
            }
            ProcessError::NotStarted { .. } => String::new(),
        }
    }
}

impl DevtoolError {
    /// Wrap an error with context describing where it happened
    pub fn context(self, context: impl Into<String>) -> Self {
        DevtoolError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through context wrappers
    pub fn root(&self) -> &DevtoolError {
        match self {
            DevtoolError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Exit code to surface to the calling process.
    ///
    /// A tool that ran keeps its own exit code; a tool that could not start
    /// maps to [`EXIT_NOT_STARTED`]; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self.root() {
            DevtoolError::Process(ProcessError::Failed { code, .. }) => *code,
            DevtoolError::Process(ProcessError::NotStarted { .. }) => EXIT_NOT_STARTED,
            DevtoolError::ImageBuild(ImageBuildError::BuildFailed { code, .. })
            | DevtoolError::ImageBuild(ImageBuildError::PullFailed { code, .. }) => *code,
            _ => 1,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self.root() {
            // The tool's own output already explains the failure
            DevtoolError::Process(ProcessError::Failed { .. }) => Vec::new(),
            DevtoolError::Process(ProcessError::NotStarted { command, .. })
                if command.starts_with("docker") =>
            {
                vec![
                    "Install Docker: https://docs.docker.com/get-docker/".to_string(),
                    "Ensure the docker CLI is on PATH: which docker".to_string(),
                ]
            }
            DevtoolError::Process(ProcessError::NotStarted { .. }) => vec![
                "Check that the command is installed and on PATH".to_string(),
                "Check that the working directory exists".to_string(),
            ],
            DevtoolError::Architecture(ArchitectureSelectionError { tool, arch }) => vec![
                format!("Add a stage named '{tool}' or '{tool}-{arch}' to the tools Dockerfile"),
            ],
            DevtoolError::Manifest(ManifestError::VersionNotFound { build_arg, .. }) => vec![
                format!("Declare 'ARG {build_arg}=<version>' in the tools Dockerfile"),
                "Or pin the stage's image with an explicit tag".to_string(),
            ],
            DevtoolError::ImageBuild(_) => vec![
                "Check the build output above for the failing step".to_string(),
                "Verify the Docker daemon is running: docker info".to_string(),
            ],
            DevtoolError::UnknownTool { .. } => {
                vec!["List known tools: kodegen_devtool tools".to_string()]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
