//! Store key layout.
//!
//! ```text
//! <prefix>/acls/<resource>     = {"<principal>": "<SCOPE>", ...}
//! <prefix>/admins/<principal>  = true
//! ```
//!
//! Token records live under `<prefix>/tokens/` and are owned by the authn
//! crate. ACLs and admin records sit in separate namespaces so a resource
//! named like a principal can never alias an admin record.

use gatehouse_authn::Principal;

use crate::error::{AuthzError, Result};

const ACL_SEGMENT: &str = "/acls/";
const ADMIN_SEGMENT: &str = "/admins/";

/// Builds store keys under a common prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Creates a key space under `prefix` (empty for none).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Key of the ACL for `resource`.
    #[must_use]
    pub fn acl_key(&self, resource: &str) -> Vec<u8> {
        format!("{}{ACL_SEGMENT}{resource}", self.prefix).into_bytes()
    }

    /// Key of the admin record for `principal`.
    #[must_use]
    pub fn admin_key(&self, principal: &Principal) -> Vec<u8> {
        format!("{}{ADMIN_SEGMENT}{principal}", self.prefix).into_bytes()
    }

    /// Half-open range covering every admin record.
    #[must_use]
    pub fn admin_range(&self) -> std::ops::Range<Vec<u8>> {
        let start = format!("{}{ADMIN_SEGMENT}", self.prefix).into_bytes();
        let mut end = start.clone();
        // '/' + 1 == '0': the first key past every "<prefix>/admins/..." key.
        if let Some(last) = end.last_mut() {
            *last += 1;
        }
        start..end
    }

    /// Extracts the principal from an admin record key.
    #[must_use]
    pub fn principal_from_admin_key(&self, key: &[u8]) -> Option<Principal> {
        let start = self.prefix.len() + ADMIN_SEGMENT.len();
        let name = key.get(start..)?;
        std::str::from_utf8(name).ok().map(Principal::from)
    }
}

/// Rejects resource names that cannot be stored.
pub(crate) fn validate_resource(resource: &str) -> Result<()> {
    if resource.is_empty() {
        return Err(AuthzError::InvalidArgument("resource name must not be empty".into()));
    }
    if resource.chars().any(char::is_control) {
        return Err(AuthzError::InvalidArgument(
            "resource name must not contain control characters".into(),
        ));
    }
    Ok(())
}

/// Rejects principal names that cannot be stored.
pub(crate) fn validate_principal(principal: &Principal) -> Result<()> {
    principal.validate().map_err(|reason| AuthzError::InvalidArgument(reason.into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let keys = KeySpace::new("gh");
        assert_eq!(keys.acl_key("repo-a"), b"gh/acls/repo-a".to_vec());
        assert_eq!(keys.admin_key(&Principal::from("bob")), b"gh/admins/bob".to_vec());
    }

    #[test]
    fn test_resource_named_like_principal_does_not_alias_admin() {
        let keys = KeySpace::new("gh");
        assert_ne!(keys.acl_key("bob"), keys.admin_key(&Principal::from("bob")));
    }

    #[test]
    fn test_admin_range_bounds() {
        let keys = KeySpace::new("gh");
        let range = keys.admin_range();

        assert!(range.contains(&keys.admin_key(&Principal::from("bob"))));
        assert!(!range.contains(&keys.acl_key("bob")));
        assert!(!range.contains(&b"gh/adminsx".to_vec()));
    }

    #[test]
    fn test_principal_from_admin_key() {
        let keys = KeySpace::new("gh");
        let key = keys.admin_key(&Principal::from("bob"));
        assert_eq!(keys.principal_from_admin_key(&key), Some(Principal::from("bob")));
    }

    #[test]
    fn test_validation() {
        assert!(validate_resource("repo-a").is_ok());
        assert!(validate_resource("org/repo").is_ok());
        assert!(matches!(validate_resource(""), Err(AuthzError::InvalidArgument(_))));
        assert!(matches!(validate_resource("a\nb"), Err(AuthzError::InvalidArgument(_))));
        assert!(validate_principal(&Principal::from("alice")).is_ok());
        assert!(validate_principal(&Principal::from("")).is_err());
    }
}
