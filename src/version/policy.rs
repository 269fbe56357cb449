//! Declarative per-tool version rules.

use crate::error::VersionCheckError;
use semver::{Version, VersionReq};
use std::fmt;

/// How far an installed tool may drift from the version pinned in the
/// manifest before the container is preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRule {
    /// At least `declared.major`.`declared.minor + offset`.0.
    ///
    /// A positive offset keeps the host ahead of the pin (language
    /// toolchains); a negative one tolerates older installs (linters).
    MinorAtLeast {
        /// Added to the declared minor, saturating at 0
        offset: i64,
    },
    /// Same major.minor, any patch
    SameMajorMinor,
    /// Fixed requirement, independent of the declared version
    Range(String),
}

impl VersionRule {
    /// Render the rule into a requirement expression for `declared`
    pub fn expression(&self, declared: &Version) -> String {
        match self {
            VersionRule::MinorAtLeast { offset } => {
                let minor = (declared.minor as i64).saturating_add(*offset).max(0);
                format!(">={}.{}.0", declared.major, minor)
            }
            VersionRule::SameMajorMinor => format!("~{}.{}", declared.major, declared.minor),
            VersionRule::Range(expr) => expr.clone(),
        }
    }

    /// Build the requirement for `declared`
    pub fn requirement(&self, declared: &Version) -> Result<VersionReq, VersionCheckError> {
        let expression = self.expression(declared);
        VersionReq::parse(&expression).map_err(|source| VersionCheckError::InvalidConstraint {
            expression,
            source,
        })
    }
}

impl fmt::Display for VersionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRule::MinorAtLeast { offset } if *offset >= 0 => {
                write!(f, "minor >= declared + {}", offset)
            }
            VersionRule::MinorAtLeast { offset } => write!(f, "minor >= declared - {}", -offset),
            VersionRule::SameMajorMinor => write!(f, "same major.minor"),
            VersionRule::Range(expr) => write!(f, "{}", expr),
        }
    }
}
