//! Permission gate.
//!
//! Permissions are opaque `action:resource` strings granted by the identity
//! provider. A route requires exactly one; the gate checks set membership.

use crate::auth::claims::ClaimSet;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A permission a route requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const GET_MOVIES: Permission = Permission::from_static("get:movies");
pub const POST_MOVIE: Permission = Permission::from_static("post:movie");
pub const UPDATE_MOVIE: Permission = Permission::from_static("update:movie");
pub const DELETE_MOVIE: Permission = Permission::from_static("delete:movie");
pub const GET_ACTORS: Permission = Permission::from_static("get:actors");
pub const POST_ACTOR: Permission = Permission::from_static("post:actor");
pub const UPDATE_ACTOR: Permission = Permission::from_static("update:actor");
pub const DELETE_ACTOR: Permission = Permission::from_static("delete:actor");

/// The claim set does not grant the required permission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("permission '{required}' not granted")]
pub struct Denied {
    pub required: Permission,
}

/// Check that `claims` grants `required`.
///
/// # Errors
///
/// Returns `Denied` when the permission is missing, including when the claim
/// set carries no permissions at all.
pub fn authorize(claims: &ClaimSet, required: &Permission) -> Result<(), Denied> {
    if claims.has_permission(required.as_str()) {
        Ok(())
    } else {
        Err(Denied {
            required: required.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::claims::tests::claim_set_with;

    #[test]
    fn test_authorize_granted() {
        let claims = claim_set_with(&["get:movies", "delete:movie"]);
        assert!(authorize(&claims, &GET_MOVIES).is_ok());
        assert!(authorize(&claims, &DELETE_MOVIE).is_ok());
    }

    #[test]
    fn test_authorize_missing_permission() {
        let claims = claim_set_with(&["get:movies"]);
        let denied = authorize(&claims, &POST_MOVIE).unwrap_err();

        assert_eq!(denied.required, POST_MOVIE);
        assert_eq!(denied.to_string(), "permission 'post:movie' not granted");
    }

    #[test]
    fn test_authorize_empty_permissions() {
        let claims = claim_set_with(&[]);
        for permission in [
            GET_MOVIES,
            POST_MOVIE,
            UPDATE_MOVIE,
            DELETE_MOVIE,
            GET_ACTORS,
            POST_ACTOR,
            UPDATE_ACTOR,
            DELETE_ACTOR,
        ] {
            assert!(authorize(&claims, &permission).is_err(), "{permission}");
        }
    }

    #[test]
    fn test_authorize_has_no_wildcards_or_hierarchy() {
        let claims = claim_set_with(&["get:*", "*", "get:movies:all", "get:movie"]);
        assert!(authorize(&claims, &GET_MOVIES).is_err());
    }

    #[test]
    fn test_permission_from_string() {
        let permission = Permission::from("post:actor".to_string());
        assert_eq!(permission, POST_ACTOR);
        assert_eq!(permission.as_str(), "post:actor");
    }
}
