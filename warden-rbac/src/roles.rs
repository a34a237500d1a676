//! Role slugs and their validation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RbacError, RbacResult};

/// Maximum length of a role slug
pub const MAX_ROLE_SLUG_LEN: usize = 100;

/// Validated role identifier.
///
/// Roles and users share one subject namespace in the policy store, where a
/// user is stored as its decimal id. A slug therefore always contains at least
/// one non-digit character, so `"1000"` can never be mistaken for user 1000.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleSlug(String);

impl RoleSlug {
    /// Validate and wrap a role slug
    pub fn new(slug: impl Into<String>) -> RbacResult<Self> {
        let slug = slug.into();
        validate_role_slug(&slug)?;
        Ok(Self(slug))
    }

    /// Wrap a subject string read back from the policy store without
    /// re-validating it; stores may hold rows written by external tooling.
    pub(crate) fn from_policy_key(key: &str) -> Self {
        Self(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoleSlug {
    type Error = RbacError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleSlug> for String {
    fn from(slug: RoleSlug) -> Self {
        slug.0
    }
}

impl AsRef<str> for RoleSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate role slug
pub fn validate_role_slug(slug: &str) -> RbacResult<()> {
    if slug.is_empty() {
        return Err(RbacError::invalid_role("Role slug cannot be empty"));
    }

    if slug.len() > MAX_ROLE_SLUG_LEN {
        return Err(RbacError::invalid_role(format!(
            "Role slug cannot exceed {} characters",
            MAX_ROLE_SLUG_LEN
        )));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(RbacError::invalid_role(
            "Role slug can only contain alphanumeric characters, underscores, and hyphens",
        ));
    }

    if slug.chars().all(|c| c.is_ascii_digit()) {
        return Err(RbacError::invalid_role(format!(
            "Role slug '{}' is numeric and would collide with a user id",
            slug
        )));
    }

    Ok(())
}

/// Parse a list of slugs, failing on the first invalid entry
pub fn parse_role_slugs<I, S>(slugs: I) -> RbacResult<Vec<RoleSlug>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    slugs.into_iter().map(RoleSlug::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slugs() {
        for slug in ["admin", "ops-team", "read_only", "tier2", "a"] {
            assert!(RoleSlug::new(slug).is_ok(), "{} should be valid", slug);
        }
    }

    #[test]
    fn test_invalid_slugs() {
        assert!(RoleSlug::new("").is_err());
        assert!(RoleSlug::new("has space").is_err());
        assert!(RoleSlug::new("semi;colon").is_err());
        assert!(RoleSlug::new("x".repeat(MAX_ROLE_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn test_numeric_slug_rejected() {
        let err = RoleSlug::new("1000").unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("collide"));
    }

    #[test]
    fn test_serde_validates() {
        let slug: RoleSlug = serde_json::from_str("\"editor\"").unwrap();
        assert_eq!(slug.as_str(), "editor");
        assert!(serde_json::from_str::<RoleSlug>("\"42\"").is_err());
    }

    #[test]
    fn test_parse_role_slugs() {
        let slugs = parse_role_slugs(["admin", "editor"]).unwrap();
        assert_eq!(slugs.len(), 2);
        assert!(parse_role_slugs(["admin", "bad slug"]).is_err());
    }
}
