//! # Interface Blocks
//!
//! Users pick a stored report from `interfaceDocumentsSourceBlock` to mint
//! it, and walk through `interfaceStepBlock` one child at a time.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        block, link, mint, policy, recorder, report, Env, POLICY_ID,
    };
    use pe_03_policy_engine::{DocumentRepository, EventData, PolicyEngineApi, PolicyEngineError};
    use pe_04_domain_blocks::blocks::{documents_source, source_addon, step};
    use serde_json::json;
    use shared_types::{BlockConfig, PolicyDocument, PolicyEventType, PolicyUser};

    fn reports_list() -> BlockConfig {
        let mut list = block(documents_source::BLOCK_TYPE, "reports")
            .with_option("pageSize", json!(10))
            .with_event(link("reports", PolicyEventType::Custom("issue".into()), "mint"));
        list.children = vec![block(source_addon::BLOCK_TYPE, "pending")
            .with_option("dataType", json!("vc-documents"))
            .with_option("onlyOwnDocuments", json!(true))
            .with_option("filters", json!([{"field": "tag", "type": "eq", "value": "intake"}]))];
        list
    }

    async fn seed(env: &Env, owner: &str, tons: f64) -> PolicyDocument {
        let mut doc = report(owner, tons);
        doc.policy_id = Some(POLICY_ID.into());
        doc.tag = Some("intake".into());
        env.backend.documents.save_document(doc).await.unwrap()
    }

    #[tokio::test]
    async fn test_selected_report_is_minted() {
        let env = Env::new(policy(vec![reports_list(), mint("mint"), recorder("minted")]));
        env.activate().await;
        let first = seed(&env, "did:installer", 5.0).await;
        seed(&env, "did:installer", 8.0).await;
        seed(&env, "did:other", 3.0).await;

        let installer = PolicyUser::new("did:installer");
        let listing = env
            .engine
            .get_block_data(POLICY_ID, "reports", &installer)
            .await
            .unwrap();
        assert_eq!(listing["count"], json!(2));

        env.engine
            .set_block_data(
                POLICY_ID,
                "reports",
                &installer,
                json!({"tag": "issue", "documentId": first.id}),
            )
            .await
            .unwrap();

        assert_eq!(env.balance(), 5);
        assert_eq!(env.stored("minted").await.len(), 1);

        // another user's report is not visible to the installer
        let missing = env
            .engine
            .set_block_data(
                POLICY_ID,
                "reports",
                &installer,
                json!({"tag": "issue", "documentId": "unknown"}),
            )
            .await;
        assert!(matches!(missing, Err(PolicyEngineError::Block(err)) if err.message == "Document is not found."));
        assert_eq!(env.balance(), 5);
    }

    fn wizard(final_blocks: &[&str]) -> BlockConfig {
        let mut wizard = block(step::BLOCK_TYPE, "wizard")
            .with_option("cyclic", json!(true))
            .with_option("finalBlocks", json!(final_blocks));
        wizard.children = vec![mint("mint"), recorder("done")];
        wizard
    }

    async fn step_index(env: &Env, did: &str) -> serde_json::Value {
        env.engine
            .get_block_data(POLICY_ID, "wizard", &PolicyUser::new(did))
            .await
            .unwrap()["index"]
            .clone()
    }

    #[tokio::test]
    async fn test_step_advances_per_user() {
        let env = Env::new(policy(vec![wizard(&[])]));
        env.activate().await;

        env.run(
            "mint",
            &PolicyUser::new("did:installer"),
            EventData::Document(report("did:installer", 2.0)),
        )
        .await
        .unwrap();

        assert_eq!(step_index(&env, "did:installer").await, json!(1));
        assert_eq!(step_index(&env, "did:other").await, json!(0));
        assert_eq!(env.stored("done").await.len(), 1);
    }

    #[tokio::test]
    async fn test_final_block_release_restarts_cycle() {
        let env = Env::new(policy(vec![wizard(&["mint"])]));
        env.activate().await;

        env.run(
            "mint",
            &PolicyUser::new("did:installer"),
            EventData::Document(report("did:installer", 2.0)),
        )
        .await
        .unwrap();

        assert_eq!(env.balance(), 2);
        assert_eq!(step_index(&env, "did:installer").await, json!(0));
    }
}
