//! Handler reference metadata.
//!
//! A handler reference identifies a build artifact produced outside this
//! crate plus the runtime configuration it is invoked with. The artifact is
//! treated as opaque; only whether it is resolved matters here.

use crate::error::{Error, Result};
use crate::lifecycle::PolicySetting;
use crate::resource::{FrontDoorId, HandlerId, ProviderId, Resource, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default invocation timeout in seconds.
pub const DEFAULT_TIMEOUT: u64 = 30;

/// Longest invocation timeout a handler may declare, in seconds.
pub const MAX_TIMEOUT: u64 = 900;

/// Where the deployable artifact of a handler lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactLocation {
    /// A packaged function built from a crate manifest.
    FunctionBundle { manifest_path: String },
    /// A container image serving HTTP on a port.
    ContainerImage { image: String, port: u16 },
}

impl ArtifactLocation {
    /// Check whether the location points at a concrete artifact.
    pub fn is_resolved(&self) -> bool {
        let location = match self {
            ArtifactLocation::FunctionBundle { manifest_path } => manifest_path,
            ArtifactLocation::ContainerImage { image, port } => {
                if *port == 0 {
                    return false;
                }
                image
            }
        };
        !location.trim().is_empty() && !location.contains('{')
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactLocation::FunctionBundle { manifest_path } => {
                write!(f, "bundle:{}", manifest_path)
            }
            ArtifactLocation::ContainerImage { image, port } => {
                write!(f, "image:{}:{}", image, port)
            }
        }
    }
}

/// The unique consumer of a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerConsumer {
    /// Catch-all route of a front door.
    FrontDoor(FrontDoorId),
    /// Lifecycle trigger hook of an identity provider.
    Trigger { provider: ProviderId, event: String },
}

impl fmt::Display for HandlerConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerConsumer::FrontDoor(id) => write!(f, "front door '{}'", id),
            HandlerConsumer::Trigger { provider, event } => {
                write!(f, "{} trigger of identity provider '{}'", event, provider)
            }
        }
    }
}

/// A deployable compute unit plus its invocation config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerReference {
    /// Unique identifier within the stack.
    pub id: HandlerId,
    /// Build artifact.
    pub artifact: ArtifactLocation,
    /// Invocation timeout in seconds.
    pub timeout: u64,
    /// Optional description.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    /// Environment variables passed to the handler.
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    policy: PolicySetting,
}

impl HandlerReference {
    /// Create a handler reference for an artifact.
    pub fn new(id: impl Into<HandlerId>, artifact: ArtifactLocation) -> Self {
        Self {
            id: id.into(),
            artifact,
            timeout: DEFAULT_TIMEOUT,
            description: String::new(),
            environment: BTreeMap::new(),
            policy: PolicySetting::Inherited,
        }
    }

    /// Create a handler for a function bundle built from a crate manifest directory.
    pub fn function(id: impl Into<HandlerId>, manifest_path: impl Into<String>) -> Self {
        Self::new(
            id,
            ArtifactLocation::FunctionBundle {
                manifest_path: manifest_path.into(),
            },
        )
    }

    /// Create a handler for a container image.
    pub fn container(id: impl Into<HandlerId>, image: impl Into<String>, port: u16) -> Self {
        Self::new(
            id,
            ArtifactLocation::ContainerImage {
                image: image.into(),
                port,
            },
        )
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Check the artifact and runtime config.
    pub fn validate(&self) -> Result<()> {
        if !self.artifact.is_resolved() {
            return Err(Error::InvalidHandler {
                handler: self.id.to_string(),
                reason: format!("artifact {} is unresolved", self.artifact),
            });
        }

        if self.timeout == 0 || self.timeout > MAX_TIMEOUT {
            return Err(Error::InvalidTimeout {
                handler: self.id.to_string(),
                seconds: self.timeout,
            });
        }

        Ok(())
    }
}

impl Resource for HandlerReference {
    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::Handler(self.id.clone())
    }

    fn policy(&self) -> PolicySetting {
        self.policy
    }

    fn set_policy(&mut self, policy: PolicySetting) {
        self.policy = policy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_handler_creation() {
        let handler = HandlerReference::function("DatabaseHandler", "handlers/database/");
        assert_eq!(handler.id.as_str(), "DatabaseHandler");
        assert_eq!(handler.timeout, DEFAULT_TIMEOUT);
        assert!(handler.validate().is_ok());
    }

    #[test]
    fn test_handler_with_timeout_and_env() {
        let handler = HandlerReference::function("TriggerHandler", "trigger/")
            .with_timeout(300)
            .with_env("TABLE", "users");
        assert_eq!(handler.timeout, 300);
        assert_eq!(handler.environment.get("TABLE"), Some(&"users".to_string()));
        assert!(!handler.environment.contains_key("MISSING"));
        assert!(handler.validate().is_ok());
    }

    #[test]
    fn test_unresolved_artifact() {
        let handler = HandlerReference::function("h", "");
        let err = handler.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidHandler { .. }));
        assert_eq!(err.category(), ErrorCategory::Construction);

        let handler = HandlerReference::function("h", "build/{target}/");
        assert!(handler.validate().is_err());

        let handler = HandlerReference::container("web", "repo/web:latest", 0);
        assert!(handler.validate().is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        let handler = HandlerReference::function("h", "h/").with_timeout(0);
        assert!(matches!(
            handler.validate(),
            Err(Error::InvalidTimeout { seconds: 0, .. })
        ));

        let handler = HandlerReference::function("h", "h/").with_timeout(MAX_TIMEOUT);
        assert!(handler.validate().is_ok());

        let handler = HandlerReference::function("h", "h/").with_timeout(MAX_TIMEOUT + 1);
        assert!(handler.validate().is_err());
    }

    #[test]
    fn test_container_handler() {
        let handler = HandlerReference::container("web", "repo/web:latest", 8080);
        assert!(handler.validate().is_ok());
        assert_eq!(handler.artifact.to_string(), "image:repo/web:latest:8080");
    }
}
