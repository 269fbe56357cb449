//! Dockerfile scanning: global `ARG` defaults and named `FROM` stages.

use crate::exec::expand;
use std::collections::BTreeMap;

/// A named build stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Stage name from `AS <name>`
    pub name: String,
    /// Base image with `ARG` defaults substituted
    pub image: String,
}

/// Parsed view of a tools Dockerfile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    args: BTreeMap<String, String>,
    stages: Vec<Stage>,
}

impl Manifest {
    /// Scan `text` for `ARG` defaults and named stages
    pub fn parse(text: &str) -> Self {
        let mut manifest = Manifest::default();
        let mut pending = Vec::new();

        for line in directives(text) {
            let mut tokens = line.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };

            if keyword.eq_ignore_ascii_case("ARG") {
                for token in tokens {
                    if let Some((key, value)) = token.split_once('=') {
                        manifest
                            .args
                            .entry(key.to_string())
                            .or_insert_with(|| unquote(value).to_string());
                    }
                }
            } else if keyword.eq_ignore_ascii_case("FROM") {
                if let Some((image, name)) = from_parts(tokens) {
                    pending.push((image.to_string(), name.to_string()));
                }
            }
        }

        // Substitution uses every ARG default, including ones declared after
        // the FROM line.
        for (image, name) in pending {
            let image = expand(&image, |key| manifest.args.get(key).cloned());
            manifest.stages.push(Stage { name, image });
        }
        manifest
    }

    /// Named stages in declaration order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Default value of build-arg `key`
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    /// Stage with exactly this name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// Names of all `FROM ... AS <name>` stages in `text`
pub fn stage_names(text: &str) -> Vec<String> {
    directives(text)
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let keyword = tokens.next()?;
            if !keyword.eq_ignore_ascii_case("FROM") {
                return None;
            }
            from_parts(tokens).map(|(_, name)| name.to_string())
        })
        .collect()
}

/// Non-empty, non-comment lines
fn directives(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
}

/// `FROM [--flag=..]* <image> AS <name>` → `(image, name)`
fn from_parts<'a>(tokens: impl Iterator<Item = &'a str>) -> Option<(&'a str, &'a str)> {
    let mut tokens = tokens.skip_while(|t| t.starts_with("--"));
    let image = tokens.next()?;
    let keyword = tokens.next()?;
    if !keyword.eq_ignore_ascii_case("AS") {
        return None;
    }
    let name = tokens.next()?;
    Some((image, name))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

/// Split an image reference into `(repository, tag)`.
///
/// Digests are dropped from both halves. The tag is only looked for after
/// the last `/`, so registry ports are not mistaken for tags.
pub fn split_reference(image: &str) -> (&str, Option<&str>) {
    let without_digest = image.split_once('@').map(|(r, _)| r).unwrap_or(image);
    let last_segment = without_digest.rfind('/').map(|i| i + 1).unwrap_or(0);

    match without_digest[last_segment..].rfind(':') {
        Some(i) => {
            let colon = last_segment + i;
            let tag = &without_digest[colon + 1..];
            let tag = if tag.is_empty() { None } else { Some(tag) };
            (&without_digest[..colon], tag)
        }
        None => (without_digest, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# tools
ARG TFLINT_VERSION="0.50.3"
ARG TRIVY_VERSION=0.58.1 EXTRA=yes
ARG TFLINT_VERSION=9.9.9

FROM --platform=$BUILDPLATFORM ghcr.io/terraform-linters/tflint:v${TFLINT_VERSION} AS tflint
from docker.io/aquasec/trivy:$TRIVY_VERSION as trivy
FROM scratch
ARG TRIVY_VERSION
"#;

    #[test]
    fn test_first_arg_definition_wins() {
        let m = Manifest::parse(SAMPLE);
        assert_eq!(m.arg("TFLINT_VERSION"), Some("0.50.3"));
        assert_eq!(m.arg("TRIVY_VERSION"), Some("0.58.1"));
        assert_eq!(m.arg("EXTRA"), Some("yes"));
    }

    #[test]
    fn test_stages_are_expanded() {
        let m = Manifest::parse(SAMPLE);
        let names: Vec<_> = m.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["tflint", "trivy"]);
        assert_eq!(
            m.stage("tflint").expect("tflint").image,
            "ghcr.io/terraform-linters/tflint:v0.50.3"
        );
        assert_eq!(m.stage("trivy").expect("trivy").image, "docker.io/aquasec/trivy:0.58.1");
    }

    #[test]
    fn test_stage_names_skips_unnamed() {
        assert_eq!(stage_names(SAMPLE), ["tflint", "trivy"]);
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(
            split_reference("ghcr.io/palantir/policy-bot:1.36.1"),
            ("ghcr.io/palantir/policy-bot", Some("1.36.1"))
        );
        assert_eq!(
            split_reference("localhost:5000/tools/lint"),
            ("localhost:5000/tools/lint", None)
        );
        assert_eq!(
            split_reference("alpine:3.19@sha256:abcd"),
            ("alpine", Some("3.19"))
        );
        assert_eq!(split_reference("alpine:"), ("alpine", None));
    }
}
