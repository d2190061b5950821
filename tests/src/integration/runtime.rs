//! # Runtime
//!
//! A policy file loaded and started the way the `policy-runtime` binary
//! does it.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{report, INSTANCE_TOPIC, TOKEN_ID};
    use pe_02_message_transport::VirtualMessageStore;
    use pe_03_policy_engine::{EventData, PolicyEngineApi};
    use policy_runtime::{load_policy, PolicyRuntime, RuntimeConfig, RuntimeError};
    use serde_json::{json, Value};
    use shared_types::{PolicyEventType, PolicyStatus, PolicyUser, TokenInfo, TokenType};
    use std::collections::HashMap;
    use std::io::Write;

    fn policy_file(policy: &Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{policy}").unwrap();
        file
    }

    fn issuance_policy(rule: &str) -> Value {
        json!({
            "id": "runtime-policy",
            "name": "Issuance",
            "owner": "",
            "policyRoles": ["Installer"],
            "instanceTopicId": INSTANCE_TOPIC,
            "config": {
                "id": "root-id",
                "blockType": "interfaceContainerBlock",
                "tag": "root",
                "permissions": ["ANY_ROLE"],
                "children": [
                    {
                        "id": "mint-id",
                        "blockType": "mintDocumentBlock",
                        "tag": "mint",
                        "permissions": ["ANY_ROLE"],
                        "tokenId": TOKEN_ID,
                        "rule": rule,
                    }
                ],
            },
        })
    }

    fn config(path: &std::path::Path) -> RuntimeConfig {
        let vars: HashMap<&str, String> = HashMap::from([
            ("PE_POLICY_PATH", path.display().to_string()),
            ("PE_OPERATOR_DID", "did:hedera:testnet:operator".to_string()),
            ("PE_OPERATOR_ACCOUNT", "0.0.2".to_string()),
        ]);
        let config = RuntimeConfig::from_lookup(|var| vars.get(var).cloned()).unwrap();
        config.validate().unwrap();
        config
    }

    #[tokio::test]
    async fn test_policy_file_runs_in_dry_run() {
        let file = policy_file(&issuance_policy("tons"));
        let config = config(file.path());
        let policy = load_policy(&config.policy_path).unwrap();

        let runtime = PolicyRuntime::new(config);
        runtime.backend().tokens.add_token(TokenInfo {
            token_id: TOKEN_ID.into(),
            token_name: "Verified Carbon Unit".into(),
            token_symbol: "VCU".into(),
            token_type: TokenType::Fungible,
            decimals: 0,
            owner: None,
        });
        let prepared = runtime.prepare(policy.clone()).unwrap();
        assert_eq!(prepared.owner, "did:hedera:testnet:operator");
        assert_eq!(prepared.status, PolicyStatus::DryRun);

        runtime.start(policy).await.unwrap();
        runtime
            .engine()
            .dispatch_event(
                "runtime-policy",
                "mint",
                PolicyEventType::RunEvent,
                &PolicyUser::new("did:installer"),
                EventData::Document(report("did:installer", 6.0)),
            )
            .await
            .unwrap();

        let session = runtime.backend().transport.config().dry_run.clone().unwrap();
        let messages = runtime
            .backend()
            .virtual_store
            .get_messages(&session, INSTANCE_TOPIC)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);

        runtime.shutdown().await;
        assert!(!runtime.engine().is_active("runtime-policy"));
    }

    #[tokio::test]
    async fn test_invalid_policy_file_is_refused() {
        let file = policy_file(&issuance_policy(""));
        let config = config(file.path());
        let policy = load_policy(&config.policy_path).unwrap();

        let runtime = PolicyRuntime::new(config);
        assert!(matches!(runtime.start(policy).await, Err(RuntimeError::Invalid(_))));
        assert!(runtime.engine().active_policies().is_empty());
    }

    #[test]
    fn test_unreadable_policy_file() {
        let missing = std::path::Path::new("/nonexistent/policy.json");
        assert!(matches!(load_policy(missing), Err(RuntimeError::Read { .. })));
    }
}
