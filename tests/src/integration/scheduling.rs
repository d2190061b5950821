//! # Scheduled Issuance
//!
//! `timerBlock` ticks hourly; each tick releases the reports buffered by a
//! period `aggregateDocumentBlock` for armed users, which are then minted.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{block, mint, policy, recorder, report, tons, Env, POLICY_ID};
    use chrono::{Duration, SecondsFormat, Utc};
    use pe_03_policy_engine::{EventData, PolicyEngineApi};
    use pe_04_domain_blocks::blocks::{aggregate, timer};
    use serde_json::json;
    use shared_types::{BlockConfig, EventActor, EventConfig, PolicyEventType, PolicyUser};

    fn hourly_timer() -> BlockConfig {
        let start = (Utc::now() + Duration::seconds(600)).to_rfc3339_opts(SecondsFormat::Secs, true);
        block(timer::BLOCK_TYPE, "timer")
            .with_option("stopPropagation", json!(true))
            .with_option("startDate", json!(start))
            .with_option("period", json!("hourly"))
            .with_event(EventConfig {
                source: "timer".into(),
                target: "buffer".into(),
                output: PolicyEventType::TimerEvent,
                input: PolicyEventType::TimerEvent,
                actor: EventActor::EventInitiator,
                disabled: false,
            })
    }

    fn scheduled_env() -> Env {
        let buffer = block(aggregate::BLOCK_TYPE, "buffer").with_option("aggregateType", json!("period"));
        Env::new(policy(vec![hourly_timer(), buffer, mint("mint"), recorder("minted")]))
    }

    async fn arm(env: &Env, did: &str) {
        env.engine
            .dispatch_event(
                POLICY_ID,
                "timer",
                PolicyEventType::StartTimerEvent,
                &PolicyUser::new(did),
                EventData::Empty,
            )
            .await
            .unwrap();
    }

    async fn submit(env: &Env, owner: &str, tons: f64) {
        env.run("buffer", &PolicyUser::new(owner), EventData::Document(report(owner, tons)))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_mints_buffered_reports() {
        let env = scheduled_env();
        env.activate().await;
        arm(&env, "did:installer").await;

        submit(&env, "did:installer", 3.0).await;
        submit(&env, "did:installer", 4.0).await;
        assert_eq!(env.balance(), 0);

        tokio::time::sleep(std::time::Duration::from_secs(700)).await;

        assert_eq!(env.balance(), 7);
        let batches = env.batches("minted").await;
        assert_eq!(batches.len(), 1);
        assert_eq!(tons(&batches[0]), vec![json!(3.0), json!(4.0)]);
        assert_eq!(batches[0][0].option["actor"], json!("did:installer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unarmed_owner_is_not_minted() {
        let env = scheduled_env();
        env.activate().await;
        arm(&env, "did:installer").await;

        submit(&env, "did:stranger", 9.0).await;
        submit(&env, "did:installer", 2.0).await;

        tokio::time::sleep(std::time::Duration::from_secs(700)).await;

        assert_eq!(env.balance(), 2);
        let minted = env.stored("minted").await;
        assert!(minted.iter().all(|doc| doc.owner == "did:installer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_ticks() {
        let env = scheduled_env();
        env.activate().await;
        arm(&env, "did:installer").await;
        submit(&env, "did:installer", 5.0).await;

        env.engine.shutdown().await;
        tokio::time::sleep(std::time::Duration::from_secs(7200)).await;

        assert_eq!(env.balance(), 0);
    }
}
