//! # Directives
//!
//! A directive is one compiled rule statement. Rule text is compiled
//! upstream into an ordered list of directive records; [`compile`] validates
//! that list and assigns each directive a stable id. The id is what every
//! provenance `source` field refers to, so it must not change across
//! re-runs of the same rule text.

use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::error::CompilationError;
use crate::identity::short_hash;

/// Operation carried by a directive, as stored in rule references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Alter,
    Replace,
    Retag,
    Restatus,
    ActivateTheme,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Alter => "alter",
            Self::Replace => "replace",
            Self::Retag => "retag",
            Self::Restatus => "restatus",
            Self::ActivateTheme => "activate_theme",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substitute every dependency matching `replaced` with `replacer`.
///
/// `scopes` restricts where the substitution applies: each scope is an
/// ancestor chain that must prefix-match the path from the tree root to the
/// dependency. An empty list means "everywhere".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceSpec {
    pub replaced: EntityRef,
    pub replacer: EntityRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<Vec<EntityRef>>,
}

impl ReplaceSpec {
    pub fn new(replaced: EntityRef, replacer: EntityRef) -> Self {
        Self {
            replaced,
            replacer,
            scopes: Vec::new(),
        }
    }

    pub fn within(mut self, scope: Vec<EntityRef>) -> Self {
        self.scopes.push(scope);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum DirectiveKind {
    /// Add `candidate` to the node under the test resource name `name`.
    Add {
        #[serde(rename = "presentableName")]
        name: String,
        candidate: EntityRef,
    },
    /// Modify a test resource, seeding it from a published presentable when
    /// the working set does not hold it yet.
    Alter {
        #[serde(rename = "presentableName")]
        name: String,
    },
    /// Apply `replaces` to one test resource, or to all of them.
    Replace {
        #[serde(
            default,
            rename = "presentableName",
            skip_serializing_if = "Option::is_none"
        )]
        target: Option<String>,
    },
    Retag {
        #[serde(rename = "presentableName")]
        target: String,
    },
    Restatus {
        #[serde(rename = "presentableName")]
        target: String,
    },
    ActivateTheme {
        #[serde(rename = "themeName")]
        theme: String,
    },
}

impl DirectiveKind {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Add { .. } => Operation::Add,
            Self::Alter { .. } => Operation::Alter,
            Self::Replace { .. } => Operation::Replace,
            Self::Retag { .. } => Operation::Retag,
            Self::Restatus { .. } => Operation::Restatus,
            Self::ActivateTheme { .. } => Operation::ActivateTheme,
        }
    }

    /// Name of the test resource (or theme) the directive acts on.
    pub fn target_name(&self) -> Option<&str> {
        match self {
            Self::Add { name, .. } | Self::Alter { name } => Some(name),
            Self::Retag { target } | Self::Restatus { target } => Some(target),
            Self::Replace { target } => target.as_deref(),
            Self::ActivateTheme { theme } => Some(theme),
        }
    }
}

/// One compiled rule statement.
///
/// `tags: None` means "leave or inherit", `Some(vec![])` clears tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub kind: DirectiveKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replaces: Vec<ReplaceSpec>,
}

impl Directive {
    pub fn new(kind: DirectiveKind) -> Self {
        Self {
            id: String::new(),
            text: String::new(),
            kind,
            tags: None,
            online: None,
            replaces: Vec::new(),
        }
    }

    pub fn add(name: impl Into<String>, candidate: EntityRef) -> Self {
        Self::new(DirectiveKind::Add {
            name: name.into(),
            candidate,
        })
    }

    pub fn alter(name: impl Into<String>) -> Self {
        Self::new(DirectiveKind::Alter { name: name.into() })
    }

    pub fn replace_all() -> Self {
        Self::new(DirectiveKind::Replace { target: None })
    }

    pub fn replace_in(target: impl Into<String>) -> Self {
        Self::new(DirectiveKind::Replace {
            target: Some(target.into()),
        })
    }

    pub fn retag(target: impl Into<String>, tags: Vec<String>) -> Self {
        let mut directive = Self::new(DirectiveKind::Retag {
            target: target.into(),
        });
        directive.tags = Some(tags);
        directive
    }

    pub fn restatus(target: impl Into<String>, online: bool) -> Self {
        let mut directive = Self::new(DirectiveKind::Restatus {
            target: target.into(),
        });
        directive.online = Some(online);
        directive
    }

    pub fn activate_theme(theme: impl Into<String>) -> Self {
        Self::new(DirectiveKind::ActivateTheme {
            theme: theme.into(),
        })
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    pub fn with_replace(mut self, spec: ReplaceSpec) -> Self {
        self.replaces.push(spec);
        self
    }

    pub fn operation(&self) -> Operation {
        self.kind.operation()
    }

    fn validate(&self, position: usize, errors: &mut Vec<String>) {
        let at = |msg: String| format!("directive #{position} ({}): {msg}", self.operation());

        match &self.kind {
            DirectiveKind::Add { name, candidate } => {
                if name.trim().is_empty() {
                    errors.push(at("missing test resource name".into()));
                }
                if candidate.name.trim().is_empty() {
                    errors.push(at("missing candidate entity name".into()));
                }
            }
            DirectiveKind::Alter { name } => {
                if name.trim().is_empty() {
                    errors.push(at("missing test resource name".into()));
                }
            }
            DirectiveKind::Replace { target } => {
                if target.as_deref().is_some_and(|t| t.trim().is_empty()) {
                    errors.push(at("empty test resource name".into()));
                }
                if self.replaces.is_empty() {
                    errors.push(at("no replacement given".into()));
                }
            }
            DirectiveKind::Retag { target } => {
                if target.trim().is_empty() {
                    errors.push(at("missing test resource name".into()));
                }
                if self.tags.is_none() {
                    errors.push(at("missing tags".into()));
                }
            }
            DirectiveKind::Restatus { target } => {
                if target.trim().is_empty() {
                    errors.push(at("missing test resource name".into()));
                }
                if self.online.is_none() {
                    errors.push(at("missing online status".into()));
                }
            }
            DirectiveKind::ActivateTheme { theme } => {
                if theme.trim().is_empty() {
                    errors.push(at("missing theme name".into()));
                }
            }
        }

        for (i, spec) in self.replaces.iter().enumerate() {
            if spec.replaced.name.trim().is_empty() || spec.replacer.name.trim().is_empty() {
                errors.push(at(format!("replacement #{i} has an empty entity name")));
            }
            if spec
                .scopes
                .iter()
                .flatten()
                .any(|scope| scope.name.trim().is_empty())
            {
                errors.push(at(format!("replacement #{i} has an empty scope entry")));
            }
        }
    }

    fn stable_id(&self, position: usize) -> String {
        let target = self.kind.target_name().unwrap_or_default();
        short_hash(
            &format!("{position}\n{}\n{}\n{target}", self.operation(), self.text),
            12,
        )
    }
}

/// Validate an ordered directive list and assign stable ids.
///
/// All problems are collected; any problem fails the whole list.
pub fn compile(records: Vec<Directive>) -> Result<Vec<Directive>, CompilationError> {
    let mut errors = Vec::new();
    for (position, record) in records.iter().enumerate() {
        record.validate(position, &mut errors);
    }
    if !errors.is_empty() {
        return Err(CompilationError::new(errors));
    }

    Ok(records
        .into_iter()
        .enumerate()
        .map(|(position, mut directive)| {
            directive.id = directive.stable_id(position);
            if let Some(tags) = directive.tags.take() {
                directive.tags = Some(normalize_tags(tags));
            }
            directive
        })
        .collect())
}

/// Parse a JSON directive array and [`compile`] it.
pub fn compile_json(json: &str) -> Result<Vec<Directive>, CompilationError> {
    let records: Vec<Directive> = serde_json::from_str(json)
        .map_err(|e| CompilationError::single(format!("malformed directive list: {e}")))?;
    compile(records)
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
