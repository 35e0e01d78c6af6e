//! Version constraint parsing and matching
//!
//! A module reference's `version` field is one of three things: a semver
//! range expression (`>=0.5.0`, `~0.3.0`, also the `=<`/`=>` spellings some
//! manifests use), an exact version with an optional `v` prefix, or a branch
//! name. Anything that is not parseable as a range is treated as a branch
//! pin.

use semver::{Version, VersionReq};

/// A parsed version specification from a module reference
#[derive(Debug, Clone)]
pub enum VersionSpec {
    /// No constraint: any version is acceptable
    Any,
    /// A semver range (exact versions are single-member ranges)
    Range(VersionReq),
    /// A branch pin
    Branch(String),
}

/// Parse a module reference's version field
pub fn parse_version_spec(input: Option<&str>) -> VersionSpec {
    let Some(input) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return VersionSpec::Any;
    };

    match VersionReq::parse(&normalize_range(input)) {
        Ok(req) => VersionSpec::Range(req),
        Err(_) => VersionSpec::Branch(input.to_string()),
    }
}

/// Rewrite legacy operator spellings and `v` prefixes into semver syntax
fn normalize_range(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for part in input.split(',') {
        if !out.is_empty() {
            out.push(',');
        }
        let part = part.trim();
        let part = part
            .replace("=<", "<=")
            .replace("=>", ">=");
        out.push_str(&strip_v_prefix(&part));
    }
    out
}

/// Strip a `v` immediately preceding the first digit (`>=v0.5.0`, `v1.2.3`)
fn strip_v_prefix(part: &str) -> String {
    let operator_end = part
        .find(|c: char| c.is_ascii_digit() || c == 'v')
        .unwrap_or(part.len());
    let (operator, rest) = part.split_at(operator_end);
    match rest.strip_prefix('v') {
        Some(stripped) if stripped.starts_with(|c: char| c.is_ascii_digit()) => {
            format!("{operator}{stripped}")
        }
        _ => part.to_string(),
    }
}

/// Whether a concrete version satisfies a range under an optional channel
///
/// Stable versions match plainly. Prerelease versions are eligible only when
/// a channel is active and the prerelease tag belongs to it; they then match
/// if the range accepts either the version itself or its stable stem (semver
/// ranges without a prerelease component never match prereleases directly).
pub fn range_matches(req: &VersionReq, version: &Version, channel: Option<&str>) -> bool {
    if version.pre.is_empty() {
        return req.matches(version);
    }

    let Some(channel) = channel else {
        return false;
    };
    if !channel_matches(version, channel) {
        return false;
    }

    if req.matches(version) {
        return true;
    }
    let stem = Version::new(version.major, version.minor, version.patch);
    req.matches(&stem)
}

/// Whether a prerelease version belongs to a channel (`0.6.0-rc.4` is `rc`)
pub fn channel_matches(version: &Version, channel: &str) -> bool {
    let pre = version.pre.as_str();
    pre == channel || pre.starts_with(&format!("{channel}."))
}

/// Parse a concrete version, tolerating a `v` prefix
pub fn parse_version(input: &str) -> Option<Version> {
    Version::parse(input.trim().trim_start_matches('v')).ok()
}
