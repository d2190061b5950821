//! `timerBlock`: a schedule that ticks for the users armed on it.
//!
//! Users are armed by `RunEvent` (the document owner), or explicitly by
//! `StartTimerEvent` and disarmed by `StopTimerEvent`. Every firing of the
//! schedule emits `TimerEvent` carrying the armed DIDs, typically into an
//! aggregate block in period mode.

use super::common::{option_f64, option_str};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pe_03_policy_engine::{
    BlockContext, BlockResult, BlockValidator, EngineResult, EventData, Period, PolicyBlock,
    PolicyEvent, Schedule,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::{BlockConfig, PolicyEventType};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const BLOCK_TYPE: &str = "timerBlock";

fn parse_date(options: &Map<String, Value>, key: &str) -> Result<Option<DateTime<Utc>>, String> {
    option_str(options, key)
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|date| date.with_timezone(&Utc))
                .map_err(|_| format!("Option \"{key}\" is not a valid date"))
        })
        .transpose()
}

/// Build the schedule described by the block options.
pub fn schedule_from_options(options: &Map<String, Value>) -> Result<Schedule, String> {
    let start = parse_date(options, "startDate")?
        .ok_or_else(|| "Option \"startDate\" is not set".to_string())?;
    let end = parse_date(options, "endDate")?;
    if end.is_some_and(|end| end <= start) {
        return Err("Option \"endDate\" must be after \"startDate\"".into());
    }
    let period = option_str(options, "period")
        .ok_or_else(|| "Option \"period\" is not set".to_string())?;
    let interval = option_f64(options, "periodInterval")
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32);
    let period = Period::parse(period, interval, option_str(options, "periodUnit"))
        .ok_or_else(|| format!("Option \"period\" is not valid: {period}"))?;
    Ok(Schedule::new(start, end, period))
}

pub fn validate(v: &mut BlockValidator<'_>) {
    if let Err(err) = schedule_from_options(&v.config().options) {
        v.add_error(err);
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TimerState {
    armed: BTreeSet<String>,
}

#[derive(Default)]
pub struct TimerBlock {
    armed: Mutex<BTreeSet<String>>,
}

pub fn factory(_: &BlockConfig) -> EngineResult<Box<dyn PolicyBlock>> {
    Ok(Box::<TimerBlock>::default())
}

impl TimerBlock {
    pub fn armed(&self) -> Vec<String> {
        self.armed.lock().iter().cloned().collect()
    }

    /// Owners of the event's documents, or the initiator when there are none.
    fn event_users(event: &PolicyEvent) -> Vec<String> {
        let owners: Vec<String> = event
            .data
            .documents()
            .into_iter()
            .map(|doc| doc.owner.clone())
            .collect();
        if owners.is_empty() {
            vec![event.user.did.clone()]
        } else {
            owners
        }
    }
}

#[async_trait]
impl PolicyBlock for TimerBlock {
    fn accepts(&self, input: &PolicyEventType) -> bool {
        matches!(
            input,
            PolicyEventType::RunEvent
                | PolicyEventType::RefreshEvent
                | PolicyEventType::StartTimerEvent
                | PolicyEventType::StopTimerEvent
        )
    }

    async fn run_action(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        let did = event
            .data
            .first_document()
            .map_or_else(|| event.user.did.clone(), |doc| doc.owner.clone());
        self.armed.lock().insert(did);
        ctx.save_state().await;

        ctx.trigger(PolicyEventType::RunEvent, &event.user, event.data.clone())
            .await;
        ctx.trigger(PolicyEventType::RefreshEvent, &event.user, event.data)
            .await;
        Ok(())
    }

    async fn handle_event(&self, ctx: &BlockContext<'_>, event: PolicyEvent) -> BlockResult<()> {
        let users = Self::event_users(&event);
        {
            let mut armed = self.armed.lock();
            match event.input {
                PolicyEventType::StartTimerEvent => armed.extend(users),
                PolicyEventType::StopTimerEvent => {
                    for did in &users {
                        armed.remove(did);
                    }
                }
                _ => return Ok(()),
            }
        }
        debug!(block = %ctx.block_id(), input = %event.input, "[pe-04] Timer users updated");
        ctx.save_state().await;
        Ok(())
    }

    async fn start(&self, ctx: &BlockContext<'_>) -> BlockResult<()> {
        let schedule = schedule_from_options(ctx.options()).map_err(|err| ctx.error(err))?;
        info!(
            block = %ctx.block_id(),
            start = %schedule.start,
            end = ?schedule.end,
            "[pe-04] Timer scheduled"
        );
        ctx.spawn_schedule(schedule);
        Ok(())
    }

    async fn on_tick(&self, ctx: &BlockContext<'_>) -> BlockResult<()> {
        let users = self.armed();
        debug!(block = %ctx.block_id(), users = users.len(), "[pe-04] Timer tick");
        let owner = ctx.find_user(ctx.policy_owner()).await;
        ctx.trigger(PolicyEventType::TimerEvent, &owner, EventData::Users(users))
            .await;
        Ok(())
    }

    fn save_state(&self) -> Option<Value> {
        let state = TimerState {
            armed: self.armed.lock().clone(),
        };
        serde_json::to_value(state).ok()
    }

    fn restore_state(&self, state: Value) -> Result<(), serde_json::Error> {
        let state: TimerState = serde_json::from_value(state)?;
        *self.armed.lock() = state.armed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{block, engine_with, policy, recorder, stored, validate_single, vc, TestEnv};
    use chrono::{Duration, SecondsFormat};
    use serde_json::json;
    use shared_types::{EventActor, EventConfig, PolicyUser};

    fn rfc3339(date: DateTime<Utc>) -> String {
        date.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn timer(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> BlockConfig {
        let mut config = block(BLOCK_TYPE, "timer")
            .with_option("stopPropagation", json!(true))
            .with_option("startDate", json!(rfc3339(start)))
            .with_option("period", json!("hourly"))
            .with_event(EventConfig {
                source: "timer".into(),
                target: "ticks".into(),
                output: PolicyEventType::TimerEvent,
                input: PolicyEventType::RunEvent,
                actor: EventActor::EventInitiator,
                disabled: false,
            });
        if let Some(end) = end {
            config = config.with_option("endDate", json!(rfc3339(end)));
        }
        config
    }

    async fn armed_env(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> TestEnv {
        let env = engine_with(policy(vec![timer(start, end), recorder("ticks")]));
        env.activate().await;
        env.dispatch(
            "timer",
            PolicyEventType::StartTimerEvent,
            &PolicyUser::new("did:a"),
            EventData::Empty,
        )
        .await
        .unwrap();
        env
    }

    #[test]
    fn test_schedule_options() {
        let options = json!({
            "startDate": "2024-01-01T00:00:00Z",
            "period": "custom",
            "periodInterval": "3",
            "periodUnit": "days",
        });
        let schedule = schedule_from_options(options.as_object().unwrap()).unwrap();
        assert_eq!(
            schedule.period,
            Period::Custom { interval: 3, unit: pe_03_policy_engine::PeriodUnit::Days }
        );

        let options = json!({"startDate": "yesterday", "period": "daily"});
        assert_eq!(
            schedule_from_options(options.as_object().unwrap()).unwrap_err(),
            "Option \"startDate\" is not a valid date"
        );
    }

    #[test]
    fn test_validator() {
        let config = BlockConfig::new(BLOCK_TYPE)
            .with_id("t")
            .with_option("startDate", json!("2024-02-01T00:00:00Z"))
            .with_option("endDate", json!("2024-01-01T00:00:00Z"))
            .with_option("period", json!("daily"));
        assert_eq!(
            validate_single(config),
            vec!["Option \"endDate\" must be after \"startDate\"".to_string()]
        );

        let config = BlockConfig::new(BLOCK_TYPE)
            .with_id("t")
            .with_option("startDate", json!("2024-01-01T00:00:00Z"))
            .with_option("period", json!("custom"));
        assert_eq!(
            validate_single(config),
            vec!["Option \"period\" is not valid: custom".to_string()]
        );
    }

    #[tokio::test]
    async fn test_arm_and_disarm() {
        let env = armed_env(Utc::now() + Duration::days(30), None).await;
        let owner_b = vc("did:b", json!({"tons": 1}));
        env.run("timer", &PolicyUser::new("did:x"), EventData::Document(owner_b))
            .await
            .unwrap();
        env.dispatch(
            "timer",
            PolicyEventType::StopTimerEvent,
            &PolicyUser::new("did:a"),
            EventData::Empty,
        )
        .await
        .unwrap();

        let state = env.backend.states.get("p1", "timer-id").unwrap();
        assert_eq!(state["armed"], json!(["did:b"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_tick_carries_armed_users() {
        let start = Utc::now() + Duration::seconds(600);
        let env = armed_env(start, None).await;

        tokio::time::sleep(std::time::Duration::from_secs(700)).await;

        let ticks = stored(&env, "ticks").await;
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].option["users"], json!(["did:a"]));
        assert_eq!(ticks[0].option["actor"], json!("did:owner"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_end_date() {
        let start = Utc::now() + Duration::seconds(600);
        let env = armed_env(start, Some(start + Duration::seconds(300))).await;

        tokio::time::sleep(std::time::Duration::from_secs(10 * 3600)).await;

        assert_eq!(stored(&env, "ticks").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_end_date_never_fires() {
        let now = Utc::now();
        let env = armed_env(now - Duration::hours(2), Some(now - Duration::hours(1))).await;

        tokio::time::sleep(std::time::Duration::from_secs(10 * 3600)).await;

        assert!(stored(&env, "ticks").await.is_empty());
    }
}
