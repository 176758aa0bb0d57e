//! Error types for stack composition.
//!
//! Every error here is raised synchronously while the resource graph is being
//! built. Nothing is deferred to materialization and nothing is retried: the
//! caller fixes the declaration and rebuilds.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of composition failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// An invariant was violated while building a resource.
    Construction,
    /// A binding was attempted before its dependency was ready.
    BindingOrder,
    /// Two incompatible bindings were requested on the same resource.
    Conflict,
    /// A required external parameter is missing.
    Environment,
}

/// Errors that can occur while composing a stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Handler artifact is missing, unresolved or not part of the stack.
    #[error("Invalid handler '{handler}': {reason}")]
    InvalidHandler { handler: String, reason: String },

    /// Handler invocation timeout outside the supported range.
    #[error("Invalid timeout for handler '{handler}': {seconds}s (expected 1..=900)")]
    InvalidTimeout { handler: String, seconds: u64 },

    /// Cache TTL bounds are not ordered `min <= default <= max`.
    #[error("Invalid TTL bounds: min {min}s, default {default}s, max {max}s")]
    InvalidTtl { min: u64, default: u64, max: u64 },

    /// Identity source is not a well-formed extraction rule.
    #[error("Invalid identity source '{0}'")]
    InvalidIdentitySource(String),

    /// Token validity spans outside the provider's limits.
    #[error("Invalid token validity: {0}")]
    InvalidTokenValidity(String),

    /// App client configuration rejected.
    #[error("Invalid app client: {0}")]
    InvalidClient(String),

    /// Sign-up policy rejected.
    #[error("Invalid sign-up policy: {0}")]
    InvalidSignUp(String),

    /// Verification message template rejected.
    #[error("Invalid verification policy: {0}")]
    InvalidVerification(String),

    /// Hosted auth domain rejected.
    #[error("Invalid hosted domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    /// Usage plan limits rejected.
    #[error("Invalid usage plan '{plan}': {reason}")]
    InvalidUsagePlan { plan: String, reason: String },

    /// Cache error response rejected.
    #[error("Invalid error response: {0}")]
    InvalidErrorResponse(String),

    /// Resource could not be serialized into the stack manifest.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A resource with the same id already exists in the stack.
    #[error("{kind} '{id}' already exists")]
    DuplicateResource { kind: &'static str, id: String },

    /// No resource with this id exists in the stack.
    #[error("{kind} '{id}' not found")]
    UnknownResource { kind: &'static str, id: String },

    /// Front door requires an authorizer that has not been attached.
    #[error("Front door '{front_door}' requires a {mode} authorizer before deploy")]
    UnboundAuthorizer { front_door: String, mode: String },

    /// Authorizer attached after the stage was finalized.
    #[error("Front door '{front_door}' stage '{stage}' is already finalized")]
    StageFinalized { front_door: String, stage: String },

    /// Edge cache wraps a front door that has no deployed stage.
    #[error("Origin front door '{front_door}' has no deployed stage")]
    OriginNotReady { front_door: String },

    /// Usage plan binds a stage that has not been deployed.
    #[error("Stage '{stage}' not found on front door '{front_door}'")]
    StageNotFound { front_door: String, stage: String },

    /// Front door was never deployed when the stack was synthesized.
    #[error("Front door '{0}' was never deployed")]
    UndeployedFrontDoor(String),

    /// Identity provider has no hosted domain bound yet.
    #[error("Identity provider '{provider}' has no domain bound (state: {state})")]
    DomainNotBound { provider: String, state: String },

    /// Trigger hook attached outside the `Configured` state.
    #[error("Identity provider '{provider}' no longer accepts trigger hooks (state: {state})")]
    LateBinding { provider: String, state: String },

    /// Identity provider transition requested out of order.
    #[error("Identity provider '{provider}' cannot move from {from} to {to}")]
    InvalidTransition {
        provider: String,
        from: String,
        to: String,
    },

    /// Re-attaching an authorizer with different parameters.
    #[error("Front door '{front_door}' already has a different authorizer binding")]
    ConflictingBinding { front_door: String },

    /// Identity-provider and API-key authorizers on the same front door.
    #[error("Front door '{front_door}' cannot combine {existing} and {requested} authorization")]
    MutuallyExclusiveAuth {
        front_door: String,
        existing: String,
        requested: String,
    },

    /// Handler already consumed by another resource.
    #[error("Handler '{handler}' is already bound to {consumer}")]
    HandlerAlreadyBound { handler: String, consumer: String },

    /// A trigger hook already exists for this lifecycle event.
    #[error("Identity provider '{provider}' already has a {event} trigger")]
    DuplicateTrigger { provider: String, event: String },

    /// Required environment keys are missing.
    #[error("Missing environment: {}", .keys.join(", "))]
    MissingEnvironment { keys: Vec<String> },
}

impl Error {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidHandler { .. }
            | Error::InvalidTimeout { .. }
            | Error::InvalidTtl { .. }
            | Error::InvalidIdentitySource(_)
            | Error::InvalidTokenValidity(_)
            | Error::InvalidClient(_)
            | Error::InvalidSignUp(_)
            | Error::InvalidVerification(_)
            | Error::InvalidDomain { .. }
            | Error::InvalidUsagePlan { .. }
            | Error::InvalidErrorResponse(_)
            | Error::Serialization(_)
            | Error::DuplicateResource { .. }
            | Error::UnknownResource { .. } => ErrorCategory::Construction,

            Error::UnboundAuthorizer { .. }
            | Error::StageFinalized { .. }
            | Error::OriginNotReady { .. }
            | Error::StageNotFound { .. }
            | Error::UndeployedFrontDoor(_)
            | Error::DomainNotBound { .. }
            | Error::LateBinding { .. }
            | Error::InvalidTransition { .. } => ErrorCategory::BindingOrder,

            Error::ConflictingBinding { .. }
            | Error::MutuallyExclusiveAuth { .. }
            | Error::HandlerAlreadyBound { .. }
            | Error::DuplicateTrigger { .. } => ErrorCategory::Conflict,

            Error::MissingEnvironment { .. } => ErrorCategory::Environment,
        }
    }

    pub(crate) fn unknown(kind: &'static str, id: impl Into<String>) -> Self {
        Error::UnknownResource {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, id: impl Into<String>) -> Self {
        Error::DuplicateResource {
            kind,
            id: id.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Opaque failure reported by a provisioning engine.
///
/// The composition core never inspects this beyond its message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Provisioning failed: {message}")]
pub struct ProvisioningError {
    /// Error message.
    pub message: String,
}

impl ProvisioningError {
    /// Create a new provisioning error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = Error::InvalidTtl {
            min: 0,
            default: 86400,
            max: 3600,
        };
        assert_eq!(err.category(), ErrorCategory::Construction);

        let err = Error::StageNotFound {
            front_door: "api".into(),
            stage: "prod".into(),
        };
        assert_eq!(err.category(), ErrorCategory::BindingOrder);

        let err = Error::MutuallyExclusiveAuth {
            front_door: "api".into(),
            existing: "COGNITO".into(),
            requested: "API_KEY".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Conflict);

        let err = Error::MissingEnvironment {
            keys: vec!["account".into()],
        };
        assert_eq!(err.category(), ErrorCategory::Environment);
    }

    #[test]
    fn test_missing_environment_message() {
        let err = Error::MissingEnvironment {
            keys: vec!["account".into(), "region".into()],
        };
        assert_eq!(err.to_string(), "Missing environment: account, region");
    }

    #[test]
    fn test_provisioning_error_is_opaque() {
        let err = ProvisioningError::new("stack rolled back");
        assert_eq!(err.to_string(), "Provisioning failed: stack rolled back");
    }
}
