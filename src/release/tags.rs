//! Release tag sets

use crate::error::{DrydockError, DrydockResult};
use crate::release::LATEST;

/// Maximum tag length accepted by OCI registries
const MAX_TAG_LEN: usize = 128;

/// Ordered, duplicate-free set of tags applied to every image of a run.
///
/// Always contains `latest`. Blank entries are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    /// Tags for a versioned run: the version, then `latest`
    pub fn new(version: &str) -> DrydockResult<Self> {
        Self::from_tags([version])
    }

    /// Build from arbitrary tags; `latest` is appended if missing
    pub fn from_tags<I, S>(tags: I) -> DrydockResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<String> = Vec::new();

        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag.is_empty() || set.iter().any(|t| t == tag) {
                continue;
            }
            validate(tag)?;
            set.push(tag.to_string());
        }
        if !set.iter().any(|t| t == LATEST) {
            set.push(LATEST.to_string());
        }

        Ok(Self { tags: set })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl std::fmt::Display for TagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tags.join(", "))
    }
}

/// `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
fn validate(tag: &str) -> DrydockResult<()> {
    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if first_ok && rest_ok && tag.len() <= MAX_TAG_LEN {
        Ok(())
    } else {
        Err(DrydockError::InvalidTag(tag.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_plus_latest() {
        let tags = TagSet::new("v1.2.3").unwrap();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["v1.2.3", "latest"]);
    }

    #[test]
    fn duplicates_collapse() {
        let tags = TagSet::from_tags(["v1.2.3", "latest", "v1.2.3", " ", "latest"]).unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("v1.2.3"));
        assert!(tags.contains("latest"));
    }

    #[test]
    fn latest_alone() {
        let tags = TagSet::new("latest").unwrap();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["latest"]);

        let tags = TagSet::new("").unwrap();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["latest"]);
    }

    #[test]
    fn invalid_tags_rejected() {
        assert!(matches!(
            TagSet::new("v1/2"),
            Err(DrydockError::InvalidTag(t)) if t == "v1/2"
        ));
        assert!(TagSet::new(".hidden").is_err());
        assert!(TagSet::new(&"a".repeat(129)).is_err());
        assert!(TagSet::new("release-2026.10_rc1").is_ok());
    }
}
