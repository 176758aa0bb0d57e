//! Provisioning seam.
//!
//! A provisioning engine turns a synthesized [`StackManifest`] into real
//! infrastructure. The composition core only depends on this trait; failures
//! come back as an opaque [`ProvisioningError`].

mod memory;

pub use memory::{LedgerEntry, MemoryEngine, Snapshot};

use crate::error::ProvisioningError;
use crate::lifecycle::LifecyclePolicy;
use crate::resource::{FrontDoorId, ResourceRef};
use crate::stack::{StackManifest, StageManifest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A live front door stage returned by materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedStageHandle {
    /// Front door the stage belongs to.
    pub front_door: FrontDoorId,
    /// Stage name.
    pub stage: String,
    /// Public invoke URL.
    pub invoke_url: String,
}

impl From<&StageManifest> for DeployedStageHandle {
    fn from(stage: &StageManifest) -> Self {
        Self {
            front_door: stage.front_door.clone(),
            stage: stage.stage.clone(),
            invoke_url: stage.invoke_url.clone(),
        }
    }
}

/// Result of materializing a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Stack name.
    pub stack: String,
    /// One handle per deployed front door stage.
    pub stages: Vec<DeployedStageHandle>,
    /// Named outputs of the stack.
    pub outputs: BTreeMap<String, String>,
}

impl Deployment {
    /// Handle for a front door, if it was deployed.
    pub fn stage(&self, front_door: &FrontDoorId) -> Option<&DeployedStageHandle> {
        self.stages.iter().find(|s| &s.front_door == front_door)
    }
}

/// What teardown did to each resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub destroyed: Vec<ResourceRef>,
    pub snapshotted: Vec<ResourceRef>,
    pub retained: Vec<ResourceRef>,
}

impl TeardownReport {
    pub(crate) fn record(&mut self, resource: ResourceRef, policy: LifecyclePolicy) {
        match policy {
            LifecyclePolicy::Destroy => self.destroyed.push(resource),
            LifecyclePolicy::Snapshot => self.snapshotted.push(resource),
            LifecyclePolicy::Retain => self.retained.push(resource),
        }
    }
}

/// Events from a provisioning engine's ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// A resource was created or updated.
    Materialized { stack: String, resource: ResourceRef },
    /// A front door stage went live.
    StageDeployed(DeployedStageHandle),
    /// A resource was removed.
    Destroyed { stack: String, resource: ResourceRef },
    /// A snapshot was taken before removal.
    Snapshotted { stack: String, resource: ResourceRef },
    /// A resource was left in place at teardown.
    Retained { stack: String, resource: ResourceRef },
}

/// Trait for provisioning backends.
///
/// This trait allows a cloud deployment tool or the in-memory engine to
/// materialize the same manifest.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Create or update every resource of the manifest.
    async fn materialize(&self, manifest: &StackManifest) -> Result<Deployment, ProvisioningError>;

    /// Remove the stack, honoring each resource's lifecycle policy.
    async fn teardown(&self, manifest: &StackManifest) -> Result<TeardownReport, ProvisioningError>;
}
