//! # apistack - API Stack Composition Core
//!
//! apistack composes a compute handler, a public API front door, an optional
//! identity provider, an optional edge cache and an optional quota/key layer
//! into a single deployable unit. It enforces the binding contract between
//! them (dependency order, one-to-one handler ownership, exclusive
//! authorizers, lifecycle propagation) and hands a declarative manifest to a
//! provisioning engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                             StackGraph                              │
//! │                                                                     │
//! │  ┌───────────┐      ┌──────────────┐      ┌──────────────────────┐  │
//! │  │  Handler  │ ───▶ │  Front Door  │ ───▶ │ Edge Cache (optional)│  │
//! │  │ Reference │      │ ANY /{proxy+}│      └──────────────────────┘  │
//! │  └───────────┘      └──────────────┘                                │
//! │        ▲                ▲        ▲                                  │
//! │        │ trigger        │ bind   │ bind_stage                       │
//! │  ┌───────────────────┐  │   ┌──────────────┐     ┌──────────┐       │
//! │  │ Identity Provider │──┘   │  Usage Plan  │ ◀── │ API Keys │       │
//! │  └───────────────────┘      └──────────────┘     └──────────┘       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                   │ synthesize()
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   ProvisioningEngine (materialize)                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use apistack::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = StackConfig::from_env();
//!     let mut graph = StackGraph::new("LicenseStack", config)?;
//!
//!     let handler = graph.add_handler(HandlerReference::function("Licenses", "handlers/licenses/"))?;
//!     let api = graph.create_front_door("LicenseAPI", &handler, EndpointVisibility::Regional, AuthMode::ApiKey)?;
//!     graph.attach_api_key_authorizer(&api)?;
//!     let stage = graph.deploy(&api)?;
//!
//!     let plan = graph.create_usage_plan("LicensePlan")?;
//!     graph.issue_key(&plan)?;
//!     graph.bind_stage(&plan, &stage)?;
//!
//!     let engine = MemoryEngine::new();
//!     let deployment = engine.materialize(&graph.synthesize()?).await?;
//!     for stage in &deployment.stages {
//!         println!("{} -> {}", stage.front_door, stage.invoke_url);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Composition Order
//!
//! Every call validates before it mutates, so a failed call leaves the graph
//! unchanged. The caller orders the calls:
//!
//! 1. **Handlers** are registered first
//! 2. **Front doors** claim exactly one handler each
//! 3. **Authorizers** attach before the stage is deployed
//! 4. **Caches and usage plans** attach to deployed stages
//!
//! Lifecycle policies default to `Destroy` and propagate from a front door to
//! its edge cache and handler unless a resource carries an explicit override.

pub mod cache;
pub mod error;
pub mod front_door;
pub mod handler;
pub mod identity;
pub mod lifecycle;
pub mod provision;
pub mod quota;
pub mod resource;
pub mod stack;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::cache::{CachePolicy, Compression, EdgeCache, ErrorResponse};
    pub use crate::error::{Error, ErrorCategory, ProvisioningError};
    pub use crate::front_door::{
        AuthMode, AuthorizerBinding, Bindable, Cacheable, EndpointVisibility, FrontDoor, Quotable,
        StageRef,
    };
    pub use crate::handler::{ArtifactLocation, HandlerReference};
    pub use crate::identity::{
        AppClient, Branding, HostedDomain, IdentityProvider, OAuthScope, OAuthSettings,
        SignUpPolicy, TriggerEvent, VerificationPolicy,
    };
    pub use crate::lifecycle::LifecyclePolicy;
    pub use crate::provision::{Deployment, MemoryEngine, ProvisioningEngine};
    pub use crate::quota::{QuotaPeriod, UsagePlan};
    pub use crate::resource::{
        CacheId, FrontDoorId, HandlerId, KeyId, PlanId, ProviderId, ResourceRef,
    };
    pub use crate::stack::{StackConfig, StackGraph, StackManifest};
}

// Re-export for convenience
pub use error::{Error, ErrorCategory, ProvisioningError, Result};
pub use provision::{MemoryEngine, ProvisioningEngine};
pub use stack::{StackConfig, StackGraph, StackManifest};
