//! Wire discriminators: message type, action, status, and URL references.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Closed string enums with a fixed wire spelling.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Wire spelling.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Parse the wire spelling; `None` for anything unknown.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                $name::parse(&value).ok_or_else(|| {
                    serde::de::Error::custom(format!(concat!("unknown ", stringify!($name), ": {}"), value))
                })
            }
        }
    };
}

wire_enum! {
    /// Kind of fact a message records.
    MessageType {
        DidDocument => "DID-Document",
        VcDocument => "VC-Document",
        EvcDocument => "EVC-Document",
        VpDocument => "VP-Document",
        Policy => "Policy",
        InstancePolicy => "Instance-Policy",
        Schema => "Schema",
        SchemaPackage => "Schema-Package",
        Topic => "Topic",
        StandardRegistry => "Standard Registry",
        Token => "Token",
        Synchronization => "Synchronization Event",
        Module => "Module",
        Tag => "Tag",
        RoleDocument => "Role-Document",
        GuardianRole => "Guardian-Role-Document",
        Tool => "Tool",
        Contract => "Contract",
        UserPermissions => "User-Permissions",
        PolicyStatistic => "Policy-Statistic",
        PolicyLabel => "Policy-Label",
        Formula => "Formula",
        PolicyDiff => "Policy-Diff",
        PolicyAction => "Policy-Action",
        PolicyComment => "Policy-Comment",
        PolicyDiscussion => "Policy-Discussion",
        RecordStep => "Policy-Record-Step",
    }
}

wire_enum! {
    /// Verb recorded with a message.
    MessageAction {
        CreateDid => "create-did-document",
        CreateVc => "create-vc-document",
        CreateVp => "create-vp-document",
        CreatePolicy => "create-policy",
        PublishPolicy => "publish-policy",
        DeletePolicy => "delete-policy",
        DiscontinuePolicy => "discontinue-policy",
        DeferredDiscontinuePolicy => "deferred-discontinue-policy",
        CreateMultiPolicy => "create-multi-policy",
        CreateInstancePolicy => "create-instance-policy",
        CreateSchema => "create-schema",
        PublishSchema => "publish-schema",
        PublishSystemSchema => "publish-system-schema",
        DeleteSchema => "delete-schema",
        CreateTopic => "create-topic",
        Init => "Init",
        CreateToken => "create-token",
        Mint => "mint",
        Wipe => "wipe",
        PublishModule => "publish-module",
        PublishTag => "publish-tag",
        DeleteTag => "delete-tag",
        PublishTool => "publish-tool",
        CreateContract => "create-contract",
        CreateRole => "create-role",
        RevokeDocument => "revoke-document",
        DeleteDocument => "delete-document",
        ChangeMessageStatus => "change-message-status",
    }
}

wire_enum! {
    /// Lifecycle state of a message; exactly one payload shape per state.
    MessageStatus {
        Issue => "ISSUE",
        Revoke => "REVOKE",
        Deleted => "DELETED",
        Withdraw => "WITHDRAW",
    }
}

impl Default for MessageStatus {
    fn default() -> Self {
        Self::Issue
    }
}

/// Which half of a URL reference to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlType {
    Cid,
    Url,
}

/// Location of one off-ledger document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRef {
    pub cid: String,
    pub url: String,
}

impl UrlRef {
    pub fn new(cid: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            cid: cid.into(),
            url: url.into(),
        }
    }

    /// One half of the reference.
    pub fn get(&self, kind: UrlType) -> &str {
        match kind {
            UrlType::Cid => &self.cid,
            UrlType::Url => &self.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_spelling_roundtrip() {
        for ty in MessageType::ALL {
            assert_eq!(MessageType::parse(ty.as_str()), Some(*ty));
        }
        for action in MessageAction::ALL {
            assert_eq!(MessageAction::parse(action.as_str()), Some(*action));
        }
    }

    #[test]
    fn test_unknown_type_rejected_by_serde() {
        let parsed: Result<MessageType, _> = serde_json::from_str("\"Nope\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_status_default_is_issue() {
        assert_eq!(MessageStatus::default(), MessageStatus::Issue);
        assert_eq!(
            serde_json::to_string(&MessageStatus::Revoke).unwrap(),
            "\"REVOKE\""
        );
    }
}
