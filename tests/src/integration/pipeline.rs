//! # Issuance Pipeline
//!
//! Monitoring reports cut into threshold-sized chunks by `splitBlock`, each
//! chunk minted by `mintDocumentBlock`.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        block, mint, policy, recorder, report, tons, Env, INSTANCE_TOPIC, TOKEN_ID,
    };
    use pe_02_message_transport::VirtualMessageStore;
    use pe_03_policy_engine::adapters::TokenOperation;
    use pe_03_policy_engine::EventData;
    use pe_04_domain_blocks::blocks::split;
    use serde_json::json;
    use shared_types::PolicyUser;

    fn splitter() -> shared_types::BlockConfig {
        block(split::BLOCK_TYPE, "split")
            .with_option("threshold", json!(40))
            .with_option("sourceField", json!("document.credentialSubject.0.tons"))
    }

    #[tokio::test]
    async fn test_split_chunks_are_minted() {
        let env = Env::new(policy(vec![splitter(), mint("mint"), recorder("minted")]));
        env.activate().await;

        let installer = PolicyUser::new("did:installer");
        env.run(
            "split",
            &installer,
            EventData::Documents(vec![report("did:installer", 30.0), report("did:installer", 50.0)]),
        )
        .await
        .unwrap();

        // 30 + 10 and 40 minted
        assert_eq!(env.balance(), 80);
        let mints: Vec<u64> = env
            .backend
            .tokens
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                TokenOperation::Mint { token_id, amount, .. } if token_id == TOKEN_ID => Some(amount),
                _ => None,
            })
            .collect();
        assert_eq!(mints, vec![40, 40]);

        let batches = env.batches("minted").await;
        assert_eq!(batches.len(), 2);
        assert_eq!(tons(&batches[0]), vec![json!(30), json!(10)]);
        assert_eq!(tons(&batches[1]), vec![json!(40)]);

        // an open chunk waits for the threshold
        env.run("split", &installer, EventData::Document(report("did:installer", 30.0)))
            .await
            .unwrap();
        assert_eq!(env.balance(), 80);
        env.run("split", &installer, EventData::Document(report("did:installer", 10.0)))
            .await
            .unwrap();
        assert_eq!(env.balance(), 120);
    }

    #[tokio::test]
    async fn test_dry_run_messages_stay_virtual() {
        let env = Env::dry_run(policy(vec![mint("mint"), recorder("minted")]), "session-1");
        env.activate().await;

        env.run(
            "mint",
            &PolicyUser::new("did:installer"),
            EventData::Document(report("did:installer", 12.0)),
        )
        .await
        .unwrap();

        let messages = env
            .backend
            .virtual_store
            .get_messages("session-1", INSTANCE_TOPIC)
            .await
            .unwrap();
        // mint VC then VP
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.dry_run == "session-1"));
        assert!(env
            .backend
            .virtual_store
            .get_messages("other-session", INSTANCE_TOPIC)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(env.balance(), 12);
    }

    #[tokio::test]
    async fn test_mint_failure_reported_and_not_forwarded() {
        let env = Env::new(policy(vec![mint("mint"), recorder("minted")]));
        env.activate().await;

        let mut orphan = report("did:installer", 5.0);
        orphan.accounts.clear();
        let result = env
            .run("mint", &PolicyUser::new("did:installer"), EventData::Document(orphan))
            .await;

        assert!(result.is_err());
        assert_eq!(env.errors(), vec!["Token recipient is not set".to_string()]);
        assert!(env.stored("minted").await.is_empty());
        assert_eq!(env.balance(), 0);
    }
}
