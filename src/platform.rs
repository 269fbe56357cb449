//! Host architecture detection and build-stage selection.
//!
//! Devtool images are built for the host architecture only. A manifest may
//! declare an architecture-specific stage (`<tool>-<arch>`) next to the
//! universal one (`<tool>`); the selector prefers the former.

use crate::error::ArchitectureSelectionError;
use crate::manifest::parse;

/// Architecture names as Docker reports them in `{{.Architecture}}`.
pub const KNOWN_ARCHES: &[&str] = &[
    "amd64", "arm64", "arm", "386", "ppc64le", "ppc64", "s390x", "riscv64", "mips64le",
];

/// Docker-style name of the architecture this binary was compiled for.
///
/// Uses `std::env::consts::ARCH` and maps Rust's names onto the names used in
/// image platforms (`x86_64` → `amd64`, `aarch64` → `arm64`).
pub fn host_arch() -> &'static str {
    docker_arch(std::env::consts::ARCH)
}

/// Map a Rust target architecture onto its Docker platform name
pub fn docker_arch(rust_arch: &'static str) -> &'static str {
    match rust_arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64le",
        "mips64" => "mips64le",
        other => other,
    }
}

/// Whether `arch` is one of [`KNOWN_ARCHES`]
pub fn is_known_arch(arch: &str) -> bool {
    KNOWN_ARCHES.contains(&arch)
}

/// Picks the build stage for `tool` on `host_arch`.
///
/// # Selection order
///
/// 1. `<tool>-<host_arch>` if declared
/// 2. `<tool>` if declared (universal stage)
/// 3. error naming the tool and architecture
///
/// # Arguments
///
/// * `tool` - Tool name, e.g. `golangci-lint`
/// * `manifest` - Dockerfile text declaring the stages
/// * `host_arch` - Docker-style architecture name
///
/// # Returns
///
/// * `Ok(stage)` - Name of the stage to pass as `--target`
/// * `Err(ArchitectureSelectionError)` - Neither stage exists
pub fn select_stage(tool: &str, manifest: &str, host_arch: &str) -> Result<String, ArchitectureSelectionError> {
    let stages = parse::stage_names(manifest);
    let arch_stage = format!("{}-{}", tool, host_arch);

    if stages.iter().any(|s| *s == arch_stage) {
        return Ok(arch_stage);
    }
    if stages.iter().any(|s| s == tool) {
        return Ok(tool.to_string());
    }

    Err(ArchitectureSelectionError {
        tool: tool.to_string(),
        arch: host_arch.to_string(),
    })
}
