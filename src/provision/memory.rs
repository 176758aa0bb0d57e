//! In-memory provisioning engine.
//!
//! This is useful for development and testing: the ledger records what a
//! real engine would have created, and teardown applies lifecycle policies
//! exactly as a real engine would.

use super::{DeployedStageHandle, Deployment, LedgerEvent, ProvisioningEngine, TeardownReport};
use crate::error::ProvisioningError;
use crate::lifecycle::LifecyclePolicy;
use crate::resource::ResourceRef;
use crate::stack::StackManifest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// A resource held in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Stack that owns the resource.
    pub stack: String,
    /// Policy the resource was materialized with.
    pub policy: LifecyclePolicy,
    /// Resource declaration.
    pub properties: serde_json::Value,
}

/// Data captured before a `Snapshot` resource was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub stack: String,
    pub resource: ResourceRef,
    pub properties: serde_json::Value,
}

#[derive(Debug, Default)]
struct Ledger {
    resources: BTreeMap<ResourceRef, LedgerEntry>,
    deployments: BTreeMap<String, Deployment>,
    snapshots: Vec<Snapshot>,
}

/// In-memory implementation of ProvisioningEngine.
#[derive(Default)]
pub struct MemoryEngine {
    ledger: Arc<RwLock<Ledger>>,
    watchers: Arc<RwLock<Vec<mpsc::Sender<LedgerEvent>>>>,
}

impl MemoryEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to ledger changes.
    pub async fn watch(&self) -> mpsc::Receiver<LedgerEvent> {
        let (tx, rx) = mpsc::channel(100);
        self.watchers.write().await.push(tx);
        rx
    }

    /// Notify all watchers of events.
    ///
    /// Never waits on a subscriber: a watcher whose channel is full or whose
    /// receiver was dropped is unsubscribed.
    async fn notify(&self, events: Vec<LedgerEvent>) {
        let mut watchers = self.watchers.write().await;
        watchers.retain(|sender| {
            for event in &events {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("Dropping ledger watcher: channel full");
                        return false;
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Dropping closed ledger watcher");
                        return false;
                    }
                }
            }
            true
        });
    }

    /// Number of live subscribers.
    pub async fn watcher_count(&self) -> usize {
        self.watchers.read().await.len()
    }

    /// Get a ledger entry.
    pub async fn get(&self, resource: &ResourceRef) -> Option<LedgerEntry> {
        self.ledger.read().await.resources.get(resource).cloned()
    }

    /// Resources currently owned by a stack.
    pub async fn resources_of(&self, stack: &str) -> Vec<ResourceRef> {
        self.ledger
            .read()
            .await
            .resources
            .iter()
            .filter(|(_, entry)| entry.stack == stack)
            .map(|(r, _)| r.clone())
            .collect()
    }

    /// Current deployment of a stack.
    pub async fn deployment(&self, stack: &str) -> Option<Deployment> {
        self.ledger.read().await.deployments.get(stack).cloned()
    }

    /// All snapshots taken so far.
    pub async fn snapshots(&self) -> Vec<Snapshot> {
        self.ledger.read().await.snapshots.clone()
    }
}

#[async_trait]
impl ProvisioningEngine for MemoryEngine {
    async fn materialize(&self, manifest: &StackManifest) -> Result<Deployment, ProvisioningError> {
        let mut ledger = self.ledger.write().await;

        // Nothing is written unless every resource is free or already ours.
        for resource in &manifest.resources {
            if let Some(existing) = ledger.resources.get(&resource.resource) {
                if existing.stack != manifest.stack {
                    return Err(ProvisioningError::new(format!(
                        "{} already belongs to stack '{}'",
                        resource.resource, existing.stack
                    )));
                }
            }
        }

        let mut events = Vec::with_capacity(manifest.resources.len() + manifest.stages.len());
        for resource in &manifest.resources {
            ledger.resources.insert(
                resource.resource.clone(),
                LedgerEntry {
                    stack: manifest.stack.clone(),
                    policy: resource.policy,
                    properties: resource.properties.clone(),
                },
            );
            events.push(LedgerEvent::Materialized {
                stack: manifest.stack.clone(),
                resource: resource.resource.clone(),
            });
        }

        let stages: Vec<DeployedStageHandle> =
            manifest.stages.iter().map(DeployedStageHandle::from).collect();
        events.extend(stages.iter().cloned().map(LedgerEvent::StageDeployed));

        let deployment = Deployment {
            stack: manifest.stack.clone(),
            stages,
            outputs: manifest.outputs.clone(),
        };
        ledger
            .deployments
            .insert(manifest.stack.clone(), deployment.clone());
        drop(ledger);

        info!(
            "Materialized stack '{}' ({} resources, {} stages)",
            manifest.stack,
            manifest.resources.len(),
            deployment.stages.len()
        );
        self.notify(events).await;
        Ok(deployment)
    }

    async fn teardown(&self, manifest: &StackManifest) -> Result<TeardownReport, ProvisioningError> {
        let mut ledger = self.ledger.write().await;

        if ledger.deployments.remove(&manifest.stack).is_none() {
            return Err(ProvisioningError::new(format!(
                "Stack '{}' is not materialized",
                manifest.stack
            )));
        }

        let mut report = TeardownReport::default();
        let mut events = Vec::new();

        // Dependents go first.
        for resource in manifest.resources.iter().rev() {
            let owned = ledger
                .resources
                .get(&resource.resource)
                .is_some_and(|entry| entry.stack == manifest.stack);
            if !owned {
                debug!("Skipping {}: not owned by '{}'", resource.resource, manifest.stack);
                continue;
            }

            let stack = manifest.stack.clone();
            let r = resource.resource.clone();
            match resource.policy {
                LifecyclePolicy::Retain => {
                    events.push(LedgerEvent::Retained { stack, resource: r.clone() });
                }
                LifecyclePolicy::Snapshot => {
                    if let Some(entry) = ledger.resources.remove(&r) {
                        ledger.snapshots.push(Snapshot {
                            stack: stack.clone(),
                            resource: r.clone(),
                            properties: entry.properties,
                        });
                    }
                    events.push(LedgerEvent::Snapshotted { stack, resource: r.clone() });
                }
                LifecyclePolicy::Destroy => {
                    ledger.resources.remove(&r);
                    events.push(LedgerEvent::Destroyed { stack, resource: r.clone() });
                }
            }
            report.record(r, resource.policy);
        }
        drop(ledger);

        info!(
            "Tore down stack '{}' (destroyed {}, snapshotted {}, retained {})",
            manifest.stack,
            report.destroyed.len(),
            report.snapshotted.len(),
            report.retained.len()
        );
        self.notify(events).await;
        Ok(report)
    }
}
