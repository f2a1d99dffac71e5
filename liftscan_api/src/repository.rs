use std::fmt;

use serde::{Deserialize, Serialize};

/// A hosted repository identified by its `owner/name` slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositorySlug(String);

impl RepositorySlug {
    /// Parse a slug, ignoring surrounding whitespace.
    ///
    /// Returns `None` for blank input and `#` comments.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        Some(Self(trimmed.trim_end_matches('/').to_owned()))
    }

    /// Full `owner/name` form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short repository name used in records and artifact directories.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Clone URL on the given host (e.g. `https://github.com`).
    #[must_use]
    pub fn clone_url(&self, host: &str) -> String {
        format!("{}/{}.git", host.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for RepositorySlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a repository list: one slug per line, blanks and `#` comments skipped.
#[must_use]
pub fn parse_repository_list(contents: &str) -> Vec<RepositorySlug> {
    contents.lines().filter_map(RepositorySlug::parse).collect()
}

/// Identity of a commit in the mined history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Full object identifier (git SHA).
    pub oid: String,
    /// Optional summary line describing the revision.
    #[serde(default)]
    pub summary: Option<String>,
    /// Author information when available.
    #[serde(default)]
    pub author: Option<Signature>,
    /// Unix timestamp (seconds) of the commit.
    pub timestamp: i64,
    /// Committer UTC offset in minutes.
    #[serde(default)]
    pub offset_minutes: i32,
}

impl Revision {
    /// First ten characters of the object id, used in artifact names.
    #[must_use]
    pub fn short_oid(&self) -> &str {
        short_oid(&self.oid)
    }

    /// Author identity recorded on extraction records: email, else name.
    #[must_use]
    pub fn author_identity(&self) -> String {
        self.author
            .as_ref()
            .map(|author| author.email.clone().unwrap_or_else(|| author.name.clone()))
            .unwrap_or_default()
    }
}

/// Structured author identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Display name for the individual.
    pub name: String,
    /// Optional email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Truncate an object id to ten characters.
#[must_use]
pub fn short_oid(oid: &str) -> &str {
    oid.get(..10).unwrap_or(oid)
}
