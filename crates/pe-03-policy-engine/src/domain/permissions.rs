//! Permission checks shared by the live tree and validation.

use shared_types::{ANY_ROLE, NO_ROLE, OWNER};

/// Whether a user may see a block carrying `permissions`.
///
/// Any matching rule grants access:
///
/// | Entry      | Grants when                                  |
/// |------------|----------------------------------------------|
/// | `ANY_ROLE` | always                                       |
/// | `OWNER`    | the user is the policy owner                 |
/// | `NO_ROLE`  | the user has no role and is not the owner    |
/// | role name  | the user's role equals the entry             |
pub fn has_permission(permissions: &[String], role: Option<&str>, did: &str, owner: &str) -> bool {
    let is_owner = did == owner;
    permissions.iter().any(|permission| match permission.as_str() {
        ANY_ROLE => true,
        OWNER => is_owner,
        NO_ROLE => role.is_none() && !is_owner,
        name => role == Some(name),
    })
}

/// Whether the owner receives broadcasts for a block.
pub fn notifies_owner(permissions: &[String]) -> bool {
    permissions.iter().any(|p| p == OWNER || p == ANY_ROLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn test_no_role_excludes_owner() {
        let permissions = perms(&["NO_ROLE"]);
        assert!(has_permission(&permissions, None, "did:x", "did:owner"));
        assert!(!has_permission(&permissions, None, "did:owner", "did:owner"));
        assert!(!has_permission(&permissions, Some("Installer"), "did:x", "did:owner"));
    }

    #[test]
    fn test_any_role_grants_everyone() {
        let permissions = perms(&["ANY_ROLE"]);
        assert!(has_permission(&permissions, None, "did:x", "did:owner"));
        assert!(has_permission(&permissions, None, "did:owner", "did:owner"));
        assert!(has_permission(&permissions, Some("Auditor"), "did:y", "did:owner"));
    }

    #[test]
    fn test_owner_and_explicit_role() {
        let permissions = perms(&["OWNER", "Installer"]);
        assert!(has_permission(&permissions, None, "did:owner", "did:owner"));
        assert!(has_permission(&permissions, Some("Installer"), "did:x", "did:owner"));
        assert!(!has_permission(&permissions, Some("Auditor"), "did:x", "did:owner"));
        assert!(!has_permission(&[], None, "did:owner", "did:owner"));
    }

    #[test]
    fn test_notifies_owner() {
        assert!(notifies_owner(&perms(&["OWNER"])));
        assert!(notifies_owner(&perms(&["ANY_ROLE"])));
        assert!(!notifies_owner(&perms(&["NO_ROLE", "Installer"])));
    }
}
