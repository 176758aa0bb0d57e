//! Lifecycle policies governing teardown.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens to a resource when its stack is torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecyclePolicy {
    /// Keep the resource after teardown.
    Retain,
    /// Delete the resource.
    #[default]
    Destroy,
    /// Take a final snapshot, then delete.
    Snapshot,
}

impl fmt::Display for LifecyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePolicy::Retain => write!(f, "RETAIN"),
            LifecyclePolicy::Destroy => write!(f, "DESTROY"),
            LifecyclePolicy::Snapshot => write!(f, "SNAPSHOT"),
        }
    }
}

/// Policy as declared on a single resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySetting {
    /// Follow the parent resource, or the stack default for independent resources.
    #[default]
    Inherited,
    /// Explicit override.
    Explicit(LifecyclePolicy),
}

impl PolicySetting {
    /// Resolve against the policy the resource would otherwise inherit.
    pub fn resolve(self, inherited: LifecyclePolicy) -> LifecyclePolicy {
        match self {
            PolicySetting::Inherited => inherited,
            PolicySetting::Explicit(policy) => policy,
        }
    }

    /// Whether this setting blocks propagation from a parent.
    pub fn is_explicit(&self) -> bool {
        matches!(self, PolicySetting::Explicit(_))
    }
}
