//! Transaction memos attached to ledger submissions.

use crate::domain::{Message, MessageAction, MessageType};
use serde_json::Value;

/// Default memo for a message, derived from its type and action.
pub fn message_memo(message: &Message) -> String {
    default_memo(message.message_type, message.action())
}

/// Memo for a `(type, action)` pair.
pub fn default_memo(ty: MessageType, action: MessageAction) -> String {
    let subject = match ty {
        MessageType::DidDocument => "DID Document",
        MessageType::VcDocument | MessageType::EvcDocument => "VC Document",
        MessageType::VpDocument => "VP Document",
        MessageType::Policy | MessageType::InstancePolicy => "Policy",
        MessageType::Schema | MessageType::SchemaPackage => "Schema",
        MessageType::Synchronization => "Synchronization",
        MessageType::StandardRegistry => "Standard Registry",
        other => other.as_str(),
    };
    let verb = match action {
        MessageAction::CreateDid
        | MessageAction::CreateVc
        | MessageAction::CreateVp
        | MessageAction::CreatePolicy
        | MessageAction::CreateSchema
        | MessageAction::CreateTopic
        | MessageAction::CreateToken
        | MessageAction::CreateContract
        | MessageAction::CreateRole
        | MessageAction::CreateMultiPolicy
        | MessageAction::CreateInstancePolicy => "Create",
        MessageAction::PublishPolicy
        | MessageAction::PublishSchema
        | MessageAction::PublishSystemSchema
        | MessageAction::PublishModule
        | MessageAction::PublishTag
        | MessageAction::PublishTool => "Publish",
        MessageAction::DeletePolicy | MessageAction::DeleteSchema | MessageAction::DeleteTag => "Delete",
        MessageAction::DiscontinuePolicy | MessageAction::DeferredDiscontinuePolicy => "Discontinue",
        MessageAction::RevokeDocument => "Revoke",
        MessageAction::DeleteDocument => "Delete Document",
        MessageAction::ChangeMessageStatus => "Change Status",
        MessageAction::Mint => "Mint",
        MessageAction::Wipe => "Wipe",
        MessageAction::Init => "Init",
    };
    format!("{subject} {verb}")
}

/// Substitute `${path}` placeholders in `template` with values from the
/// document's credential subject. Unknown paths render empty; an unclosed
/// placeholder is kept as written.
pub fn parse_memo(template: &str, document: &Value) -> String {
    let scope = memo_scope(document);
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let path = after[..end].trim();
        if let Some(value) = lookup(scope, path) {
            out.push_str(&render(value));
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn memo_scope(document: &Value) -> &Value {
    fn subject(vc: &Value) -> Option<&Value> {
        match vc.get("credentialSubject")? {
            Value::Array(items) => items.first(),
            other => Some(other),
        }
    }

    if let Some(scope) = subject(document) {
        return scope;
    }
    document
        .get("verifiableCredential")
        .and_then(Value::as_array)
        .and_then(|vcs| vcs.first())
        .and_then(subject)
        .unwrap_or(document)
}

fn lookup<'a>(scope: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(scope, |node, segment| match node {
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => node.get(segment),
        })
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_memo() {
        assert_eq!(
            default_memo(MessageType::VcDocument, MessageAction::CreateVc),
            "VC Document Create"
        );
        assert_eq!(default_memo(MessageType::Token, MessageAction::Mint), "Token Mint");
    }

    #[test]
    fn test_parse_memo_from_subject() {
        let vc = json!({
            "credentialSubject": [{ "project": { "name": "Solar" }, "amount": 12 }]
        });
        assert_eq!(parse_memo("${project.name}: ${amount}", &vc), "Solar: 12");
        assert_eq!(parse_memo("x ${missing} y", &vc), "x  y");
        assert_eq!(parse_memo("plain", &vc), "plain");
        assert_eq!(parse_memo("open ${amount", &vc), "open ${amount");
    }

    #[test]
    fn test_parse_memo_from_presentation() {
        let vp = json!({
            "verifiableCredential": [{ "credentialSubject": { "site": "A1" } }]
        });
        assert_eq!(parse_memo("site=${site}", &vp), "site=A1");
    }
}
