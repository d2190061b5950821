//! # Routing
//!
//! `switchBlock` sends large reports straight to minting and buffers small
//! ones in a cumulative `aggregateDocumentBlock` until they add up.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{block, mint, policy, recorder, report, tons, Env};
    use pe_03_policy_engine::EventData;
    use pe_04_domain_blocks::blocks::{aggregate, switch};
    use serde_json::{json, Value};
    use shared_types::{BlockConfig, PolicyUser};

    fn router(conditions: Value) -> BlockConfig {
        block(switch::BLOCK_TYPE, "router")
            .with_option("stopPropagation", json!(true))
            .with_option("executionFlow", json!("firstTrue"))
            .with_option("conditions", conditions)
    }

    fn buffer() -> BlockConfig {
        block(aggregate::BLOCK_TYPE, "buffer")
            .with_option("aggregateType", json!("cumulative"))
            .with_option("expressions", json!([{"name": "tons", "value": "tons"}]))
            .with_option("condition", json!("sum(tons) >= 10"))
    }

    async fn submit(env: &Env, tons: f64) {
        env.run(
            "router",
            &PolicyUser::new("did:installer"),
            EventData::Document(report("did:installer", tons)),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_small_reports_accumulate_before_minting() {
        let conditions = json!([
            {"tag": "large", "type": "equal", "value": "tons >= 10", "target": "mint"},
            {"tag": "small", "type": "unconditional", "target": "buffer"},
        ]);
        let env = Env::new(policy(vec![
            router(conditions),
            buffer(),
            mint("mint"),
            recorder("minted"),
        ]));
        env.activate().await;

        submit(&env, 12.0).await;
        assert_eq!(env.balance(), 12);

        submit(&env, 4.0).await;
        assert_eq!(env.balance(), 12);
        submit(&env, 7.0).await;
        assert_eq!(env.balance(), 23);

        let batches = env.batches("minted").await;
        assert_eq!(batches.len(), 2);
        assert_eq!(tons(&batches[0]), vec![json!(12.0)]);
        assert_eq!(tons(&batches[1]), vec![json!(4.0), json!(7.0)]);
        assert!(env.errors().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_report_is_dropped() {
        let conditions = json!([
            {"tag": "large", "type": "equal", "value": "tons >= 10", "target": "mint"},
        ]);
        let env = Env::new(policy(vec![router(conditions), mint("mint"), recorder("minted")]));
        env.activate().await;

        submit(&env, 4.0).await;

        assert_eq!(env.balance(), 0);
        assert!(env.stored("minted").await.is_empty());
        assert!(env.errors().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_fails_validation() {
        let conditions = json!([
            {"tag": "large", "type": "equal", "value": "tons >= 10", "target": "nowhere"},
        ]);
        let env = Env::new(policy(vec![router(conditions), mint("mint")]));

        let report = pe_03_policy_engine::PolicyEngineApi::validate(&env.engine, &env.policy);
        assert!(!report.is_valid());
        let errors = report.all_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].ends_with("Tag \"nowhere\" does not exist"), "{errors:?}");
    }
}
