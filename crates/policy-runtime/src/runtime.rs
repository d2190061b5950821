//! Policy loading and the running engine.

use crate::config::RuntimeConfig;
use pe_02_message_transport::TransportConfig;
use pe_03_policy_engine::adapters::InMemoryBackend;
use pe_03_policy_engine::{
    PolicyEngine, PolicyEngineApi, PolicyEngineError, PolicyRoleRepository, ValidationReport,
};
use shared_bus::{EngineEvent, EventFilter, InMemoryEventBus};
use shared_types::{PolicyConfig, PolicyStatus, PolicyUser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to read policy {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse policy {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("policy has no owner and PE_OPERATOR_DID is not set")]
    MissingOwner,

    #[error("policy is invalid: {0} error(s)")]
    Invalid(usize),

    #[error(transparent)]
    Engine(#[from] PolicyEngineError),
}

/// Read a policy JSON file.
pub fn load_policy(path: &Path) -> Result<PolicyConfig, RuntimeError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RuntimeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RuntimeError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Log every error of a report.
pub fn log_report(report: &ValidationReport) {
    if report.is_valid() {
        info!(blocks = report.blocks.len(), "Policy is valid");
        return;
    }
    for message in report.all_errors() {
        error!(error = %message, "Policy validation error");
    }
}

/// One policy running on the in-memory adapters.
pub struct PolicyRuntime {
    engine: PolicyEngine,
    backend: InMemoryBackend,
    config: RuntimeConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PolicyRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        let session = uuid::Uuid::new_v4().to_string();
        info!(session = %session, "Creating dry-run policy runtime");
        let transport = TransportConfig {
            dry_run: Some(session),
            ..config.transport.clone()
        };
        let mut backend = InMemoryBackend::new(transport);
        backend.bus = Arc::new(InMemoryEventBus::with_capacity(config.event_capacity));
        let engine = PolicyEngine::new(pe_04_domain_blocks::registry(), backend.services());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            engine,
            backend,
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn backend(&self) -> &InMemoryBackend {
        &self.backend
    }

    /// Fill in what the file leaves to the runtime.
    pub fn prepare(&self, mut policy: PolicyConfig) -> Result<PolicyConfig, RuntimeError> {
        if policy.owner.trim().is_empty() {
            policy.owner = self
                .config
                .operator_did
                .clone()
                .ok_or(RuntimeError::MissingOwner)?;
        }
        if self.config.dry_run {
            policy.status = PolicyStatus::DryRun;
        }
        Ok(policy)
    }

    /// Validate, log the report, then activate.
    pub async fn start(&self, policy: PolicyConfig) -> Result<ValidationReport, RuntimeError> {
        let policy = self.prepare(policy)?;
        info!(policy_id = %policy.id, name = %policy.name, "Loading policy");

        let report = self.engine.validate(&policy);
        log_report(&report);
        if !report.is_valid() {
            return Err(RuntimeError::Invalid(report.all_errors().len()));
        }

        if let Some(did) = &self.config.operator_did {
            let mut operator = PolicyUser::new(did.clone());
            if let Some(account) = &self.config.operator_account {
                operator = operator.with_account(account.clone());
            }
            self.backend.roles.set_user(&policy.id, operator).await?;
        }

        self.spawn_event_log();
        let report = self.engine.activate(policy.clone()).await?;
        info!(policy_id = %policy.id, "Policy is running");
        Ok(report)
    }

    /// Log engine notifications until shutdown.
    fn spawn_event_log(&self) {
        let mut events = self.backend.bus.subscribe(EventFilter::all());
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(EngineEvent::BlockError { block_id, block_type, user, message, .. }) => {
                            warn!(block = %block_id, block_type = %block_type, user = %user, "{message}");
                        }
                        Some(event) => debug!(?event, "Engine event"),
                        None => break,
                    },
                    _ = shutdown.changed() => break,
                }
            }
        });
    }

    /// Stop cron tasks and deactivate every policy.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        self.engine.shutdown().await;
        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn config(operator: Option<&str>) -> RuntimeConfig {
        RuntimeConfig {
            policy_path: PathBuf::from("policy.json"),
            operator_did: operator.map(str::to_string),
            ..RuntimeConfig::default()
        }
    }

    fn policy_json(owner: &str, mint_rule: Option<&str>) -> serde_json::Value {
        let mut mint = json!({
            "id": "mint-id",
            "blockType": "mintDocumentBlock",
            "tag": "mint",
            "permissions": ["OWNER"],
            "tokenId": "0.0.900",
        });
        if let Some(rule) = mint_rule {
            mint["rule"] = json!(rule);
        }
        json!({
            "id": "p1",
            "name": "Runtime policy",
            "owner": owner,
            "policyRoles": ["Installer"],
            "status": "PUBLISH",
            "config": {
                "id": "root-id",
                "blockType": "interfaceContainerBlock",
                "tag": "root",
                "permissions": ["ANY_ROLE"],
                "children": [mint],
            },
        })
    }

    #[test]
    fn test_load_policy_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", policy_json("did:owner", Some("tons"))).unwrap();
        let policy = load_policy(file.path()).unwrap();
        assert_eq!(policy.id, "p1");
        assert_eq!(policy.config.children.len(), 1);

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "{{ not json").unwrap();
        assert!(matches!(load_policy(broken.path()), Err(RuntimeError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_start_runs_in_dry_run() {
        let runtime = PolicyRuntime::new(config(Some("did:operator")));
        let policy: PolicyConfig =
            serde_json::from_value(policy_json("", Some("tons"))).unwrap();

        let report = runtime.start(policy).await.unwrap();
        assert!(report.is_valid());
        assert!(runtime.engine().is_active("p1"));
        let operator = runtime.backend().roles.get_user("p1", "did:operator").await.unwrap();
        assert!(operator.is_some());

        runtime.shutdown().await;
        assert!(!runtime.engine().is_active("p1"));
    }

    #[tokio::test]
    async fn test_invalid_policy_refused() {
        let runtime = PolicyRuntime::new(config(None));
        let policy: PolicyConfig = serde_json::from_value(policy_json("did:owner", None)).unwrap();
        assert!(matches!(runtime.start(policy).await, Err(RuntimeError::Invalid(_))));
        assert!(!runtime.engine().is_active("p1"));

        let ownerless: PolicyConfig = serde_json::from_value(policy_json("", Some("x"))).unwrap();
        assert!(matches!(runtime.start(ownerless).await, Err(RuntimeError::MissingOwner)));
    }
}
