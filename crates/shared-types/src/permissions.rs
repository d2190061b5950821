//! Sentinel permission names accepted in every block's `permissions` list.

/// Granted to any user, registered or not.
pub const ANY_ROLE: &str = "ANY_ROLE";

/// Granted to users without a role who are not the policy owner.
pub const NO_ROLE: &str = "NO_ROLE";

/// Granted to the policy owner only.
pub const OWNER: &str = "OWNER";

/// Permissions known to every policy before its own roles are added.
pub const SENTINEL_PERMISSIONS: [&str; 3] = [NO_ROLE, ANY_ROLE, OWNER];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert_eq!(SENTINEL_PERMISSIONS.len(), 3);
        assert!(SENTINEL_PERMISSIONS.contains(&"OWNER"));
    }
}
