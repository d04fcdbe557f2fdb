//! Caller identity extraction
//!
//! Credential resolution is an external collaborator: the front proxy
//! authenticates the caller and supplies an identity string plus a role set
//! in trusted headers. This module only parses what the proxy supplies; it
//! never validates tokens itself. The raw `Authorization` value rides along
//! so the peer authority can re-validate it on sync.

use hyper::header::HeaderMap;

use crate::types::{Result, VerdictError};

/// Header carrying the resolved user identity
pub const USER_HEADER: &str = "x-auth-user";

/// Header carrying the comma-separated role set
pub const ROLES_HEADER: &str = "x-auth-roles";

/// Role required to issue verdicts
pub const ROLE_ADMIN: &str = "admin";

/// Authenticated caller, as resolved by the upstream proxy
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    /// User identity string
    pub user: String,
    /// Roles granted to the caller
    pub roles: Vec<String>,
    /// Raw Authorization header value, passed through to the peer authority
    pub credential: Option<String>,
}

impl CallerIdentity {
    /// Extract the caller from request headers.
    ///
    /// Fails with `Unauthorized` when the identity header is missing -
    /// every inbound operation requires an authenticated caller.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let user = headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                VerdictError::Unauthorized(format!("missing {} header", USER_HEADER))
            })?
            .to_string();

        let roles = headers
            .get(ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(|r| r.trim().to_lowercase())
                    .filter(|r| !r.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let credential = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(Self {
            user,
            roles,
            credential,
        })
    }

    /// Whether the caller holds the given role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Require the admin role (verdict confirmation)
    pub fn require_admin(&self) -> Result<()> {
        if self.has_role(ROLE_ADMIN) {
            Ok(())
        } else {
            Err(VerdictError::Forbidden(format!(
                "user {} lacks the {} role",
                self.user, ROLE_ADMIN
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers(user: Option<&str>, roles: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(user) = user {
            map.insert(USER_HEADER, HeaderValue::from_str(user).unwrap());
        }
        if let Some(roles) = roles {
            map.insert(ROLES_HEADER, HeaderValue::from_str(roles).unwrap());
        }
        map
    }

    #[test]
    fn test_missing_user_header_is_unauthorized() {
        let err = CallerIdentity::from_headers(&headers(None, Some("admin"))).unwrap_err();
        assert!(matches!(err, VerdictError::Unauthorized(_)));
    }

    #[test]
    fn test_roles_parsed_case_insensitive() {
        let caller =
            CallerIdentity::from_headers(&headers(Some("op-1"), Some("Admin, analyst"))).unwrap();
        assert_eq!(caller.user, "op-1");
        assert!(caller.has_role("admin"));
        assert!(caller.has_role("analyst"));
        assert!(caller.require_admin().is_ok());
    }

    #[test]
    fn test_require_admin_forbidden_without_role() {
        let caller = CallerIdentity::from_headers(&headers(Some("a"), Some("analyst"))).unwrap();
        assert!(matches!(
            caller.require_admin(),
            Err(VerdictError::Forbidden(_))
        ));
    }

    #[test]
    fn test_credential_passthrough() {
        let mut map = headers(Some("a"), None);
        map.insert(
            "authorization",
            HeaderValue::from_static("Bearer tok-123"),
        );
        let caller = CallerIdentity::from_headers(&map).unwrap();
        assert_eq!(caller.credential.as_deref(), Some("Bearer tok-123"));
        assert!(caller.roles.is_empty());
    }
}
