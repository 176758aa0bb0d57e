//! Declarative stack manifest consumed by a provisioning engine.

use crate::error::Result;
use crate::lifecycle::LifecyclePolicy;
use crate::resource::{FrontDoorId, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One resource of the synthesized graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceManifest {
    /// Resource kind and id.
    pub resource: ResourceRef,
    /// Resources that must exist before this one.
    pub depends_on: Vec<ResourceRef>,
    /// Effective lifecycle policy after propagation.
    pub policy: LifecyclePolicy,
    /// Resource declaration, passed through to the engine.
    pub properties: serde_json::Value,
}

/// A front door stage the engine must deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageManifest {
    pub front_door: FrontDoorId,
    pub stage: String,
    pub invoke_url: String,
}

/// Declarative resource graph of one deployable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackManifest {
    /// Stack name.
    pub stack: String,
    /// Account qualifier.
    pub account: String,
    /// Region qualifier.
    pub region: String,
    /// Resources, leaves first.
    pub resources: Vec<ResourceManifest>,
    /// Deployed front door stages.
    pub stages: Vec<StageManifest>,
    /// Named outputs.
    pub outputs: BTreeMap<String, String>,
}

impl StackManifest {
    /// Find a resource entry.
    pub fn find(&self, resource: &ResourceRef) -> Option<&ResourceManifest> {
        self.resources.iter().find(|r| &r.resource == resource)
    }

    /// Position of a resource in dependency order.
    pub fn position(&self, resource: &ResourceRef) -> Option<usize> {
        self.resources.iter().position(|r| &r.resource == resource)
    }

    /// Render as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
