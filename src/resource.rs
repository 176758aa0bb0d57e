//! Resource identifiers and the tagged reference used across the stack graph.

use crate::lifecycle::PolicySetting;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new id.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

resource_id!(
    /// Id of a handler reference.
    HandlerId
);
resource_id!(
    /// Id of a front door.
    FrontDoorId
);
resource_id!(
    /// Id of an identity provider.
    ProviderId
);
resource_id!(
    /// Id of an edge cache.
    CacheId
);
resource_id!(
    /// Id of a usage plan.
    PlanId
);
resource_id!(
    /// Id of an issued API key.
    KeyId
);

/// Kind of resource in a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Handler,
    IdentityProvider,
    FrontDoor,
    EdgeCache,
    UsagePlan,
    ApiKey,
}

impl ResourceKind {
    /// Human-readable name used in errors.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Handler => "Handler",
            ResourceKind::IdentityProvider => "Identity provider",
            ResourceKind::FrontDoor => "Front door",
            ResourceKind::EdgeCache => "Edge cache",
            ResourceKind::UsagePlan => "Usage plan",
            ResourceKind::ApiKey => "API key",
        }
    }
}

/// Reference to any resource in a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    Handler(HandlerId),
    IdentityProvider(ProviderId),
    FrontDoor(FrontDoorId),
    EdgeCache(CacheId),
    UsagePlan(PlanId),
    ApiKey(KeyId),
}

impl ResourceRef {
    /// Kind of the referenced resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::Handler(_) => ResourceKind::Handler,
            ResourceRef::IdentityProvider(_) => ResourceKind::IdentityProvider,
            ResourceRef::FrontDoor(_) => ResourceKind::FrontDoor,
            ResourceRef::EdgeCache(_) => ResourceKind::EdgeCache,
            ResourceRef::UsagePlan(_) => ResourceKind::UsagePlan,
            ResourceRef::ApiKey(_) => ResourceKind::ApiKey,
        }
    }

    /// Raw id of the referenced resource.
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Handler(id) => id.as_str(),
            ResourceRef::IdentityProvider(id) => id.as_str(),
            ResourceRef::FrontDoor(id) => id.as_str(),
            ResourceRef::EdgeCache(id) => id.as_str(),
            ResourceRef::UsagePlan(id) => id.as_str(),
            ResourceRef::ApiKey(id) => id.as_str(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind().label(), self.id())
    }
}

/// Common surface of every resource held by a stack graph.
pub trait Resource {
    /// Reference to this resource.
    fn resource_ref(&self) -> ResourceRef;

    /// Declared lifecycle policy.
    fn policy(&self) -> PolicySetting;

    /// Replace the declared lifecycle policy.
    fn set_policy(&mut self, policy: PolicySetting);
}
