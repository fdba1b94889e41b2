//! # Entity References
//!
//! An entity is either a versioned *resource* or an unversioned storage
//! *object*. Directives reference entities by `(name, type)` and, for
//! resources, an optional semantic version range.

use std::fmt;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// Kind of catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Resource,
    Object,
}

impl EntityType {
    /// Only resources carry versions. Objects match regardless of range.
    pub fn is_versioned(self) -> bool {
        matches!(self, Self::Resource)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource" => Ok(Self::Resource),
            "object" => Ok(Self::Object),
            other => Err(format!("unknown entity type '{other}'")),
        }
    }
}

/// A semantic version range in npm notation: `^1.2`, `~0.3`,
/// `>=1.0.0 <2.0.0`, `1.0.0 - 2.0.0`, `^1 || ^2`, `1.x` or `*`.
///
/// Keeps the text it was parsed from so snapshots serialize exactly what
/// the rule author wrote. An empty string is treated as `*`. A bare version
/// such as `1.2.3` means exactly that version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    raw: String,
    /// `||` alternatives; a version matching any of them is in range.
    alternatives: Vec<VersionReq>,
}

const OPERATOR_CHARS: &str = "<>=~^";

impl VersionRange {
    /// The range satisfied by every version.
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            alternatives: vec![VersionReq::STAR],
        }
    }

    pub fn parse(raw: &str) -> Result<Self, semver::Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Self::any());
        }
        let alternatives = trimmed
            .split("||")
            .map(parse_alternative)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: trimmed.to_string(),
            alternatives,
        })
    }

    pub fn is_any(&self) -> bool {
        self.alternatives.iter().any(|req| *req == VersionReq::STAR)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `version` satisfies this range. Versions that do not parse
    /// as semver only satisfy `*`.
    pub fn matches(&self, version: &str) -> bool {
        if self.is_any() {
            return true;
        }
        match Version::parse(version.trim().trim_start_matches('v')) {
            Ok(v) => self.alternatives.iter().any(|req| req.matches(&v)),
            Err(_) => false,
        }
    }
}

/// One `||` alternative: a hyphen range or a set of comparators separated
/// by whitespace or commas.
fn parse_alternative(alternative: &str) -> Result<VersionReq, semver::Error> {
    let alternative = alternative.trim();
    if let Some((low, high)) = alternative.split_once(" - ") {
        return VersionReq::parse(&format!(">={}, <={}", strip_v(low.trim()), strip_v(high.trim())));
    }

    let mut comparators = Vec::new();
    let mut pending_op = String::new();
    for token in alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        // `>= 1.2.3`: the operator arrives as its own token.
        if token.chars().all(|c| OPERATOR_CHARS.contains(c)) {
            pending_op.push_str(token);
            continue;
        }
        let split = token
            .find(|c: char| !OPERATOR_CHARS.contains(c))
            .unwrap_or(token.len());
        let (op, version) = token.split_at(split);
        let op = std::mem::take(&mut pending_op) + op;
        let version = strip_v(version);
        if is_wildcard(version) && op.is_empty() {
            if version.split('.').next().is_some_and(|major| major.parse::<u64>().is_ok()) {
                comparators.push(version.to_string());
            }
            continue;
        }
        if op.is_empty() {
            comparators.push(format!("={version}"));
        } else {
            comparators.push(format!("{op}{version}"));
        }
    }
    if !pending_op.is_empty() {
        // A dangling operator; let the parser report it.
        return VersionReq::parse(&pending_op);
    }
    if comparators.is_empty() {
        return Ok(VersionReq::STAR);
    }
    VersionReq::parse(&comparators.join(", "))
}

fn strip_v(version: &str) -> &str {
    version.trim_start_matches(['v', 'V'])
}

fn is_wildcard(version: &str) -> bool {
    version.split('.').any(|part| matches!(part, "*" | "x" | "X"))
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionRange {}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = semver::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(value: VersionRange) -> Self {
        value.raw
    }
}

/// Reference to a catalog entity as written in a directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<VersionRange>,
}

impl EntityRef {
    pub fn resource(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: EntityType::Resource,
            version_range: None,
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: EntityType::Object,
            version_range: None,
        }
    }

    pub fn with_range(mut self, range: VersionRange) -> Self {
        self.version_range = Some(range);
        self
    }

    /// The effective range; absent means `*`.
    pub fn range(&self) -> VersionRange {
        self.version_range.clone().unwrap_or_default()
    }

    /// Name and type equality only.
    pub fn same_identity(&self, name: &str, entity_type: EntityType) -> bool {
        self.entity_type == entity_type && self.name == name
    }

    /// Name and type equality, plus range satisfaction for resources.
    pub fn matches(&self, name: &str, entity_type: EntityType, version: &str) -> bool {
        if !self.same_identity(name, entity_type) {
            return false;
        }
        if !entity_type.is_versioned() {
            return true;
        }
        match &self.version_range {
            None => true,
            Some(range) => range.matches(version),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.entity_type, &self.version_range) {
            (EntityType::Resource, Some(range)) if !range.is_any() => {
                write!(f, "resource:{}@{}", self.name, range)
            }
            (entity_type, _) => write!(f, "{entity_type}:{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_star_ranges_are_any() {
        assert!(VersionRange::parse("").unwrap().is_any());
        assert!(VersionRange::parse("*").unwrap().is_any());
        assert!(VersionRange::parse("latest").unwrap().is_any());
        assert!(!VersionRange::parse("^1.0").unwrap().is_any());
    }

    #[test]
    fn range_matching_follows_semver() {
        let range = VersionRange::parse("^1.2").unwrap();
        assert!(range.matches("1.2.0"));
        assert!(range.matches("1.9.3"));
        assert!(!range.matches("2.0.0"));
        assert!(!range.matches("1.1.9"));
        assert!(!range.matches("not-a-version"));
    }

    #[test]
    fn any_range_matches_unparseable_versions() {
        assert!(VersionRange::any().matches(""));
        assert!(VersionRange::any().matches("garbage"));
    }

    #[test]
    fn space_separated_comparators_are_intersected() {
        let range = VersionRange::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(range.matches("1.0.0"));
        assert!(range.matches("1.9.9"));
        assert!(!range.matches("2.0.0"));
        assert!(!range.matches("0.9.0"));
        let spaced = VersionRange::parse(">= 1.2 < 1.4").unwrap();
        assert!(spaced.matches("1.3.7"));
        assert!(!spaced.matches("1.4.0"));
    }

    #[test]
    fn alternatives_match_if_any_does() {
        let range = VersionRange::parse("^1 || ^3.1").unwrap();
        assert!(range.matches("1.4.0"));
        assert!(range.matches("3.2.0"));
        assert!(!range.matches("2.0.0"));
        assert!(!range.matches("3.0.9"));
        assert_eq!(range.as_str(), "^1 || ^3.1");
    }

    #[test]
    fn hyphen_range_is_inclusive() {
        let range = VersionRange::parse("1.0.0 - 2.0.0").unwrap();
        assert!(range.matches("1.0.0"));
        assert!(range.matches("2.0.0"));
        assert!(!range.matches("2.0.1"));
        // A partial upper bound covers the whole minor line.
        let partial = VersionRange::parse("1.2 - 2.3").unwrap();
        assert!(partial.matches("2.3.9"));
        assert!(!partial.matches("2.4.0"));
    }

    #[test]
    fn bare_version_is_exact() {
        let range = VersionRange::parse("1.2.3").unwrap();
        assert!(range.matches("1.2.3"));
        assert!(!range.matches("1.2.4"));
        assert!(VersionRange::parse("v1.2.3").unwrap().matches("1.2.3"));
    }

    #[test]
    fn x_ranges_cover_their_line() {
        let range = VersionRange::parse("1.x").unwrap();
        assert!(range.matches("1.0.0"));
        assert!(range.matches("1.99.0"));
        assert!(!range.matches("2.0.0"));
        assert!(VersionRange::parse("x").unwrap().is_any());
        assert!(VersionRange::parse("^1 || *").unwrap().is_any());
    }

    #[test]
    fn dangling_operator_is_rejected() {
        assert!(VersionRange::parse(">=").is_err());
        assert!(VersionRange::parse("^1 || >=").is_err());
    }

    #[test]
    fn malformed_range_is_rejected() {
        assert!(VersionRange::parse("totally not a range").is_err());
    }

    #[test]
    fn range_serializes_as_its_source_text() {
        let range = VersionRange::parse(">=1.0.0, <2.0.0").unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, "\">=1.0.0, <2.0.0\"");
        let back: VersionRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, range);
    }

    #[test]
    fn object_refs_ignore_version_ranges() {
        let r = EntityRef::object("cover.png").with_range(VersionRange::parse("^9").unwrap());
        assert!(r.matches("cover.png", EntityType::Object, ""));
        assert!(!r.matches("cover.png", EntityType::Resource, "9.0.0"));
    }

    #[test]
    fn resource_refs_check_name_type_and_range() {
        let r = EntityRef::resource("alice/novel").with_range(VersionRange::parse("~0.3").unwrap());
        assert!(r.matches("alice/novel", EntityType::Resource, "0.3.4"));
        assert!(!r.matches("alice/novel", EntityType::Resource, "0.4.0"));
        assert!(!r.matches("alice/other", EntityType::Resource, "0.3.4"));
    }

    #[test]
    fn entity_ref_json_uses_type_field() {
        let r: EntityRef =
            serde_json::from_str(r#"{"name":"a/b","type":"resource","versionRange":"^1"}"#).unwrap();
        assert_eq!(r.entity_type, EntityType::Resource);
        assert_eq!(r.range().as_str(), "^1");
    }
}
