//! Front door: routed public entry point forwarding to one handler.

use crate::error::{Error, Result};
use crate::front_door::binding::{AuthMode, AuthorizerBinding, BindOutcome};
use crate::front_door::routing::{Route, RouteTable};
use crate::handler::HandlerReference;
use crate::lifecycle::PolicySetting;
use crate::resource::{FrontDoorId, HandlerId, Resource, ResourceRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Network reachability of a front door endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointVisibility {
    /// Served from a single region.
    #[default]
    Regional,
    /// Served through the provider's edge network.
    Edge,
    /// Reachable only from inside a private network.
    Private,
}

/// A finalized deployment stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (e.g., "prod").
    pub name: String,
    /// Public invoke URL of the stage.
    pub invoke_url: String,
}

/// Reference to the deployed stage of a front door.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageRef {
    pub front_door: FrontDoorId,
    pub stage: String,
}

impl StageRef {
    /// Create a stage reference.
    pub fn new(front_door: impl Into<FrontDoorId>, stage: impl Into<String>) -> Self {
        Self {
            front_door: front_door.into(),
            stage: stage.into(),
        }
    }
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.front_door, self.stage)
    }
}

/// Resources that accept an authorizer binding.
pub trait Bindable {
    /// Currently attached binding, if any.
    fn binding(&self) -> Option<&AuthorizerBinding>;

    /// Attach a binding.
    ///
    /// Identical re-attachment is a no-op; a different binding of the same
    /// kind is a conflict; identity-provider and API-key bindings exclude
    /// each other.
    fn bind(&mut self, binding: AuthorizerBinding) -> Result<BindOutcome>;
}

/// Resources an edge cache may use as its origin.
pub trait Cacheable {
    /// Deployed stage the cache forwards to, once resolved.
    fn origin_stage(&self) -> Option<&Stage>;

    /// Whether requests through this origin are authorized per caller.
    fn is_caller_authorized(&self) -> bool;
}

/// Resources whose stages a usage plan can govern.
pub trait Quotable {
    /// Reference to the deployed stage, once resolved.
    fn stage_ref(&self) -> Option<StageRef>;

    /// Whether callers must present an API key for the plan to apply.
    fn requires_api_key(&self) -> bool;
}

/// Public routed entry point forwarding to exactly one handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontDoor {
    /// Unique identifier within the stack.
    pub id: FrontDoorId,
    /// Endpoint reachability.
    pub visibility: EndpointVisibility,
    /// Access mode every route starts with.
    pub default_auth: AuthMode,
    routes: RouteTable,
    binding: Option<AuthorizerBinding>,
    stage: Option<Stage>,
    #[serde(default)]
    policy: PolicySetting,
}

impl FrontDoor {
    /// Create a front door forwarding everything to `handler`.
    pub fn new(
        id: impl Into<FrontDoorId>,
        handler: &HandlerReference,
        visibility: EndpointVisibility,
        default_auth: AuthMode,
    ) -> Result<Self> {
        handler.validate()?;

        Ok(Self {
            id: id.into(),
            visibility,
            default_auth,
            routes: RouteTable::proxy(handler.id.clone()),
            binding: None,
            stage: None,
            policy: PolicySetting::Inherited,
        })
    }

    /// The handler behind the catch-all route.
    pub fn handler(&self) -> Option<&HandlerId> {
        self.routes.list().first().map(|r| &r.handler)
    }

    /// All routes.
    pub fn routes(&self) -> &[Route] {
        self.routes.list()
    }

    /// Resolve a request to the route that serves it.
    pub fn route_for(&self, path: &str, method: &str) -> Option<&Route> {
        self.routes.find(path, method)
    }

    /// Deployed stage, if finalized.
    pub fn stage(&self) -> Option<&Stage> {
        self.stage.as_ref()
    }

    /// Whether the stage has been finalized.
    pub fn is_deployed(&self) -> bool {
        self.stage.is_some()
    }

    /// Check that the attached binding satisfies the default access mode.
    pub fn check_authorizer(&self) -> Result<()> {
        if self.default_auth == AuthMode::None {
            return Ok(());
        }

        match &self.binding {
            Some(binding) if binding.mode() == self.default_auth => Ok(()),
            _ => Err(Error::UnboundAuthorizer {
                front_door: self.id.to_string(),
                mode: self.default_auth.to_string(),
            }),
        }
    }

    /// Whether the front door can serve traffic.
    pub fn is_servable(&self) -> bool {
        self.is_deployed() && self.check_authorizer().is_ok()
    }

    /// Finalize the deployment stage.
    ///
    /// Redeploying under the same stage name returns the existing stage.
    pub fn finalize_stage(&mut self, name: &str, region: &str) -> Result<StageRef> {
        if let Some(stage) = &self.stage {
            if stage.name == name {
                debug!("Front door '{}' already deployed to '{}'", self.id, name);
                return Ok(StageRef::new(self.id.clone(), name));
            }
            return Err(Error::ConflictingBinding {
                front_door: self.id.to_string(),
            });
        }

        self.check_authorizer()?;

        self.stage = Some(Stage {
            name: name.to_string(),
            invoke_url: format!(
                "https://{}.execute-api.{}.amazonaws.com/{}",
                self.id.as_str().to_lowercase(),
                region,
                name
            ),
        });
        Ok(StageRef::new(self.id.clone(), name))
    }
}

impl Bindable for FrontDoor {
    fn binding(&self) -> Option<&AuthorizerBinding> {
        self.binding.as_ref()
    }

    fn bind(&mut self, binding: AuthorizerBinding) -> Result<BindOutcome> {
        if let Some(existing) = &self.binding {
            if *existing == binding {
                return Ok(BindOutcome::Unchanged);
            }
            if existing.mode() == binding.mode() {
                return Err(Error::ConflictingBinding {
                    front_door: self.id.to_string(),
                });
            }
            return Err(Error::MutuallyExclusiveAuth {
                front_door: self.id.to_string(),
                existing: existing.mode().to_string(),
                requested: binding.mode().to_string(),
            });
        }

        if let Some(stage) = &self.stage {
            return Err(Error::StageFinalized {
                front_door: self.id.to_string(),
                stage: stage.name.clone(),
            });
        }

        if self.default_auth != AuthMode::None && self.default_auth != binding.mode() {
            return Err(Error::MutuallyExclusiveAuth {
                front_door: self.id.to_string(),
                existing: self.default_auth.to_string(),
                requested: binding.mode().to_string(),
            });
        }

        self.routes.authorize_all(&binding.route_authorization());
        self.binding = Some(binding);
        Ok(BindOutcome::Attached)
    }
}

impl Cacheable for FrontDoor {
    fn origin_stage(&self) -> Option<&Stage> {
        self.stage.as_ref()
    }

    fn is_caller_authorized(&self) -> bool {
        self.binding.is_some()
    }
}

impl Quotable for FrontDoor {
    fn stage_ref(&self) -> Option<StageRef> {
        self.stage
            .as_ref()
            .map(|s| StageRef::new(self.id.clone(), s.name.clone()))
    }

    fn requires_api_key(&self) -> bool {
        matches!(self.binding, Some(AuthorizerBinding::ApiKey))
    }
}

impl Resource for FrontDoor {
    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::FrontDoor(self.id.clone())
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
    use crate::front_door::binding::IdentitySource;
    use crate::front_door::routing::RouteAuthorization;
    use crate::resource::ProviderId;

    fn handler() -> HandlerReference {
        HandlerReference::function("DatabaseHandler", "handlers/database/")
    }

    fn cognito(provider: &str, header: &str) -> AuthorizerBinding {
        AuthorizerBinding::Cognito {
            provider: ProviderId::new(provider),
            identity_source: IdentitySource::header(header),
        }
    }

    #[test]
    fn test_front_door_has_single_route() {
        let fd = FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Regional, AuthMode::None)
            .unwrap();
        assert_eq!(fd.routes().len(), 1);
        assert_eq!(fd.handler(), Some(&HandlerId::new("DatabaseHandler")));
        assert!(fd.route_for("/orders/42", "PUT").is_some());
    }

    #[test]
    fn test_unresolved_handler_rejected() {
        let bad = HandlerReference::function("h", "");
        let err = FrontDoor::new("RestAPI", &bad, EndpointVisibility::Regional, AuthMode::None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHandler { .. }));
    }

    #[test]
    fn test_open_front_door_is_servable_after_deploy() {
        let mut fd =
            FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Regional, AuthMode::None)
                .unwrap();
        assert!(!fd.is_servable());

        let stage = fd.finalize_stage("prod", "eu-west-1").unwrap();
        assert_eq!(stage, StageRef::new("RestAPI", "prod"));
        assert!(fd.is_servable());
        assert_eq!(
            fd.stage().unwrap().invoke_url,
            "https://restapi.execute-api.eu-west-1.amazonaws.com/prod"
        );
    }

    #[test]
    fn test_deploy_without_authorizer_fails() {
        let mut fd =
            FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Regional, AuthMode::ApiKey)
                .unwrap();
        let err = fd.finalize_stage("prod", "eu-west-1").unwrap_err();
        assert!(matches!(err, Error::UnboundAuthorizer { .. }));
        assert_eq!(err.category(), ErrorCategory::BindingOrder);
        assert!(!fd.is_deployed());
    }

    #[test]
    fn test_redeploy_same_stage_is_noop() {
        let mut fd =
            FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Edge, AuthMode::None)
                .unwrap();
        fd.finalize_stage("prod", "us-east-1").unwrap();
        assert!(fd.finalize_stage("prod", "us-east-1").is_ok());
        assert!(matches!(
            fd.finalize_stage("dev", "us-east-1"),
            Err(Error::ConflictingBinding { .. })
        ));
    }

    #[test]
    fn test_api_key_binding_marks_routes() {
        let mut fd =
            FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Regional, AuthMode::ApiKey)
                .unwrap();
        assert_eq!(fd.bind(AuthorizerBinding::ApiKey).unwrap(), BindOutcome::Attached);
        assert_eq!(fd.bind(AuthorizerBinding::ApiKey).unwrap(), BindOutcome::Unchanged);
        assert!(fd
            .routes()
            .iter()
            .all(|r| r.authorization == RouteAuthorization::ApiKeyRequired));
        assert!(fd.requires_api_key());
    }

    #[test]
    fn test_identical_cognito_binding_is_idempotent() {
        let mut fd =
            FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Regional, AuthMode::Cognito)
                .unwrap();
        assert_eq!(
            fd.bind(cognito("pool", "Authorization")).unwrap(),
            BindOutcome::Attached
        );
        assert_eq!(
            fd.bind(cognito("pool", "Authorization")).unwrap(),
            BindOutcome::Unchanged
        );
        assert!(matches!(
            fd.bind(cognito("pool", "X-Token")),
            Err(Error::ConflictingBinding { .. })
        ));
    }

    #[test]
    fn test_cognito_and_api_key_are_exclusive() {
        let mut fd =
            FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Regional, AuthMode::None)
                .unwrap();
        fd.bind(cognito("pool", "Authorization")).unwrap();
        let err = fd.bind(AuthorizerBinding::ApiKey).unwrap_err();
        assert!(matches!(err, Error::MutuallyExclusiveAuth { .. }));
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_binding_must_match_default_mode() {
        let mut fd =
            FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Regional, AuthMode::ApiKey)
                .unwrap();
        assert!(matches!(
            fd.bind(cognito("pool", "Authorization")),
            Err(Error::MutuallyExclusiveAuth { .. })
        ));
    }

    #[test]
    fn test_binding_after_deploy_fails_fast() {
        let mut fd =
            FrontDoor::new("RestAPI", &handler(), EndpointVisibility::Regional, AuthMode::None)
                .unwrap();
        fd.finalize_stage("prod", "eu-west-1").unwrap();
        let err = fd.bind(AuthorizerBinding::ApiKey).unwrap_err();
        assert!(matches!(err, Error::StageFinalized { .. }));
        assert!(fd.binding().is_none());
    }
}
