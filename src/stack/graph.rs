//! Stack graph: every resource of one deployable unit and the rules that
//! connect them.
//!
//! Composition is synchronous and caller-ordered. Each call validates
//! everything it needs before touching the graph, so a failed call leaves the
//! graph exactly as it was.

use crate::cache::{CachePolicy, EdgeCache, ErrorResponse};
use crate::error::{Error, Result};
use crate::front_door::{
    AuthMode, AuthorizerBinding, BindOutcome, Bindable, Cacheable, EndpointVisibility, FrontDoor,
    IdentitySource, Quotable, StageRef,
};
use crate::handler::{HandlerConsumer, HandlerReference};
use crate::identity::{
    AppClient, Branding, HostedDomain, IdentityProvider, SignUpPolicy, TriggerEvent,
    VerificationPolicy,
};
use crate::lifecycle::{LifecyclePolicy, PolicySetting};
use crate::quota::{ApiKey, UsagePlan};
use crate::resource::{
    CacheId, FrontDoorId, HandlerId, KeyId, PlanId, ProviderId, Resource, ResourceKind,
    ResourceRef,
};
use crate::stack::config::StackConfig;
use crate::stack::manifest::{ResourceManifest, StackManifest, StageManifest};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// The resource graph of one deployable unit.
#[derive(Debug, Clone)]
pub struct StackGraph {
    name: String,
    config: StackConfig,
    handlers: BTreeMap<HandlerId, HandlerReference>,
    consumers: BTreeMap<HandlerId, HandlerConsumer>,
    providers: BTreeMap<ProviderId, IdentityProvider>,
    front_doors: BTreeMap<FrontDoorId, FrontDoor>,
    caches: BTreeMap<CacheId, EdgeCache>,
    plans: BTreeMap<PlanId, UsagePlan>,
    keys: BTreeMap<KeyId, ApiKey>,
    outputs: BTreeMap<String, String>,
}

fn lookup<'a, K: Ord, V>(
    map: &'a BTreeMap<K, V>,
    kind: ResourceKind,
    id: &K,
) -> Result<&'a V>
where
    K: std::fmt::Display,
{
    map.get(id)
        .ok_or_else(|| Error::unknown(kind.label(), id.to_string()))
}

fn lookup_mut<'a, K: Ord, V>(
    map: &'a mut BTreeMap<K, V>,
    kind: ResourceKind,
    id: &K,
) -> Result<&'a mut V>
where
    K: std::fmt::Display,
{
    map.get_mut(id)
        .ok_or_else(|| Error::unknown(kind.label(), id.to_string()))
}

impl StackGraph {
    /// Create an empty graph; fails if the config lacks required keys.
    pub fn new(name: impl Into<String>, config: StackConfig) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        info!("Composing stack '{}'", name);

        Ok(Self {
            name,
            config,
            handlers: BTreeMap::new(),
            consumers: BTreeMap::new(),
            providers: BTreeMap::new(),
            front_doors: BTreeMap::new(),
            caches: BTreeMap::new(),
            plans: BTreeMap::new(),
            keys: BTreeMap::new(),
            outputs: BTreeMap::new(),
        })
    }

    /// Stack name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stack configuration.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    // ----- handlers -------------------------------------------------------

    /// Register a resolved handler reference.
    pub fn add_handler(&mut self, handler: HandlerReference) -> Result<HandlerId> {
        if self.handlers.contains_key(&handler.id) {
            return Err(Error::duplicate(
                ResourceKind::Handler.label(),
                handler.id.to_string(),
            ));
        }

        handler.validate()?;

        let id = handler.id.clone();
        info!("Registered handler: {} ({})", id, handler.artifact);
        self.handlers.insert(id.clone(), handler);
        Ok(id)
    }

    /// Get a handler.
    pub fn handler(&self, id: &HandlerId) -> Result<&HandlerReference> {
        lookup(&self.handlers, ResourceKind::Handler, id)
    }

    /// The resource consuming a handler, if any.
    pub fn consumer_of(&self, id: &HandlerId) -> Option<&HandlerConsumer> {
        self.consumers.get(id)
    }

    fn check_claimable(&self, id: &HandlerId) -> Result<&HandlerReference> {
        let handler = self.handlers.get(id).ok_or_else(|| Error::InvalidHandler {
            handler: id.to_string(),
            reason: "not registered in this stack".to_string(),
        })?;

        if let Some(consumer) = self.consumers.get(id) {
            return Err(Error::HandlerAlreadyBound {
                handler: id.to_string(),
                consumer: consumer.to_string(),
            });
        }

        Ok(handler)
    }

    // ----- front doors ----------------------------------------------------

    /// Create a front door forwarding every request to `handler`.
    ///
    /// The front door becomes the unique consumer of the handler.
    pub fn create_front_door(
        &mut self,
        id: impl Into<FrontDoorId>,
        handler: &HandlerId,
        visibility: EndpointVisibility,
        default_auth: AuthMode,
    ) -> Result<FrontDoorId> {
        let id = id.into();
        if self.front_doors.contains_key(&id) {
            return Err(Error::duplicate(
                ResourceKind::FrontDoor.label(),
                id.to_string(),
            ));
        }

        let handler_ref = self.check_claimable(handler)?;
        let front_door = FrontDoor::new(id.clone(), handler_ref, visibility, default_auth)?;

        self.consumers
            .insert(handler.clone(), HandlerConsumer::FrontDoor(id.clone()));
        self.front_doors.insert(id.clone(), front_door);
        info!(
            "Created front door: {} -> {} ({:?}, auth {})",
            id, handler, visibility, default_auth
        );
        Ok(id)
    }

    /// Get a front door.
    pub fn front_door(&self, id: &FrontDoorId) -> Result<&FrontDoor> {
        lookup(&self.front_doors, ResourceKind::FrontDoor, id)
    }

    /// Attach an identity-provider authorizer to a front door.
    ///
    /// The provider must have a hosted domain bound. Re-attaching the same
    /// provider and identity source is a no-op.
    pub fn attach_authorizer(
        &mut self,
        front_door: &FrontDoorId,
        provider: &ProviderId,
        identity_source: &str,
    ) -> Result<AuthorizerBinding> {
        lookup(&self.front_doors, ResourceKind::FrontDoor, front_door)?;
        lookup(&self.providers, ResourceKind::IdentityProvider, provider)?.require_domain()?;
        let identity_source = IdentitySource::parse(identity_source)?;

        let binding = AuthorizerBinding::Cognito {
            provider: provider.clone(),
            identity_source,
        };
        self.bind(front_door, binding)
    }

    /// Require API keys on every route of a front door.
    pub fn attach_api_key_authorizer(
        &mut self,
        front_door: &FrontDoorId,
    ) -> Result<AuthorizerBinding> {
        self.bind(front_door, AuthorizerBinding::ApiKey)
    }

    fn bind(
        &mut self,
        front_door: &FrontDoorId,
        binding: AuthorizerBinding,
    ) -> Result<AuthorizerBinding> {
        let fd = lookup_mut(&mut self.front_doors, ResourceKind::FrontDoor, front_door)?;
        match fd.bind(binding.clone())? {
            BindOutcome::Attached => {
                info!("Attached {} authorizer to front door {}", binding.mode(), front_door)
            }
            BindOutcome::Unchanged => debug!(
                "Front door {} already has this {} authorizer",
                front_door,
                binding.mode()
            ),
        }
        Ok(binding)
    }

    /// Finalize the front door stage using the configured stage name.
    pub fn deploy(&mut self, front_door: &FrontDoorId) -> Result<StageRef> {
        let stage = self.config.default_stage.clone();
        self.deploy_stage(front_door, &stage)
    }

    /// Finalize the front door stage under `stage`.
    pub fn deploy_stage(&mut self, front_door: &FrontDoorId, stage: &str) -> Result<StageRef> {
        let region = self.config.region_name().to_string();
        let fd = lookup_mut(&mut self.front_doors, ResourceKind::FrontDoor, front_door)?;
        let stage_ref = fd.finalize_stage(stage, &region)?;
        info!("Deployed front door stage: {}", stage_ref);
        Ok(stage_ref)
    }

    // ----- identity providers ---------------------------------------------

    /// Add an identity provider.
    ///
    /// A provider added with trigger hooks already attached claims their
    /// handlers; a provider with a bound domain publishes its URL.
    pub fn add_identity_provider(&mut self, provider: IdentityProvider) -> Result<ProviderId> {
        if self.providers.contains_key(&provider.id) {
            return Err(Error::duplicate(
                ResourceKind::IdentityProvider.label(),
                provider.id.to_string(),
            ));
        }

        for handler in provider.triggers().values() {
            self.check_claimable(handler)?;
        }
        let mut seen = Vec::new();
        for handler in provider.triggers().values() {
            if seen.contains(&handler) {
                return Err(Error::HandlerAlreadyBound {
                    handler: handler.to_string(),
                    consumer: format!("identity provider '{}'", provider.id),
                });
            }
            seen.push(handler);
        }

        let id = provider.id.clone();
        for (event, handler) in provider.triggers() {
            self.consumers.insert(
                handler.clone(),
                HandlerConsumer::Trigger {
                    provider: id.clone(),
                    event: event.to_string(),
                },
            );
        }
        if let Some(domain) = provider.domain() {
            self.publish_domain(&id, domain.url(self.config.region_name()));
        }

        info!("Added identity provider: {} ({})", id, provider.state());
        self.providers.insert(id.clone(), provider);
        Ok(id)
    }

    /// Get an identity provider.
    pub fn identity_provider(&self, id: &ProviderId) -> Result<&IdentityProvider> {
        lookup(&self.providers, ResourceKind::IdentityProvider, id)
    }

    fn provider_mut(&mut self, id: &ProviderId) -> Result<&mut IdentityProvider> {
        lookup_mut(&mut self.providers, ResourceKind::IdentityProvider, id)
    }

    /// `Unconfigured -> Configured`.
    pub fn configure_provider(
        &mut self,
        id: &ProviderId,
        sign_up: SignUpPolicy,
        verification: VerificationPolicy,
    ) -> Result<()> {
        self.provider_mut(id)?.configure(sign_up, verification)
    }

    /// Attach a trigger hook; the handler becomes exclusive to the provider.
    pub fn add_trigger(
        &mut self,
        id: &ProviderId,
        event: TriggerEvent,
        handler: &HandlerId,
    ) -> Result<()> {
        lookup(&self.providers, ResourceKind::IdentityProvider, id)?;
        self.check_claimable(handler)?;

        self.provider_mut(id)?.attach_trigger(event, handler.clone())?;
        self.consumers.insert(
            handler.clone(),
            HandlerConsumer::Trigger {
                provider: id.clone(),
                event: event.to_string(),
            },
        );
        Ok(())
    }

    /// `Configured -> ClientRegistered`.
    pub fn register_client(&mut self, id: &ProviderId, client: AppClient) -> Result<()> {
        self.provider_mut(id)?.register_client(client)
    }

    /// `ClientRegistered -> DomainBound`, substituting environment
    /// placeholders in the domain prefix.
    pub fn bind_domain(&mut self, id: &ProviderId, domain: HostedDomain) -> Result<()> {
        lookup(&self.providers, ResourceKind::IdentityProvider, id)?;
        let prefix = self.config.substitute(&domain.prefix)?;
        let domain = HostedDomain { prefix, ..domain };
        let url = domain.url(self.config.region_name());

        self.provider_mut(id)?.bind_domain(domain)?;
        self.publish_domain(id, url);
        Ok(())
    }

    /// `DomainBound -> BrandingApplied`.
    pub fn apply_branding(&mut self, id: &ProviderId, branding: Branding) -> Result<()> {
        self.provider_mut(id)?.apply_branding(branding)
    }

    fn publish_domain(&mut self, id: &ProviderId, url: String) {
        self.outputs.insert(format!("{}DomainURL", id), url);
    }

    // ----- edge caches ----------------------------------------------------

    /// Put an edge cache in front of a deployed front door.
    pub fn wrap_with_cache(
        &mut self,
        id: impl Into<CacheId>,
        front_door: &FrontDoorId,
        policy: CachePolicy,
    ) -> Result<CacheId> {
        let id = id.into();
        if self.caches.contains_key(&id) {
            return Err(Error::duplicate(
                ResourceKind::EdgeCache.label(),
                id.to_string(),
            ));
        }

        let origin = lookup(&self.front_doors, ResourceKind::FrontDoor, front_door)?;
        let cache = EdgeCache::wrap(id.clone(), origin, policy)?;

        if origin.is_caller_authorized() {
            warn!(
                "Edge cache {} shares cached responses across callers of authorized front door {}",
                id, front_door
            );
        }

        info!(
            "Wrapped front door {} with edge cache {} (ttl {}s..{}s)",
            front_door, id, cache.policy.default_ttl, cache.policy.max_ttl
        );
        self.caches.insert(id.clone(), cache);
        Ok(id)
    }

    /// Add a custom error page to a cache.
    pub fn add_error_response(&mut self, id: &CacheId, response: ErrorResponse) -> Result<()> {
        let cache = lookup_mut(&mut self.caches, ResourceKind::EdgeCache, id)?;
        let status = response.status;
        cache.add_error_response(response)?;
        debug!("Added error page for status {} to edge cache {}", status, id);
        Ok(())
    }

    /// Get an edge cache.
    pub fn edge_cache(&self, id: &CacheId) -> Result<&EdgeCache> {
        lookup(&self.caches, ResourceKind::EdgeCache, id)
    }

    // ----- usage plans ----------------------------------------------------

    /// Create an empty usage plan.
    pub fn create_usage_plan(&mut self, id: impl Into<PlanId>) -> Result<PlanId> {
        self.add_usage_plan(UsagePlan::new(id))
    }

    /// Add a usage plan with limits.
    pub fn add_usage_plan(&mut self, plan: UsagePlan) -> Result<PlanId> {
        if self.plans.contains_key(&plan.id) {
            return Err(Error::duplicate(
                ResourceKind::UsagePlan.label(),
                plan.id.to_string(),
            ));
        }

        plan.validate()?;

        let id = plan.id.clone();
        info!("Created usage plan: {}", id);
        self.plans.insert(id.clone(), plan);
        Ok(id)
    }

    /// Get a usage plan.
    pub fn usage_plan(&self, id: &PlanId) -> Result<&UsagePlan> {
        lookup(&self.plans, ResourceKind::UsagePlan, id)
    }

    /// Issue a new key and bind it to the plan.
    pub fn issue_key(&mut self, plan: &PlanId) -> Result<KeyId> {
        lookup(&self.plans, ResourceKind::UsagePlan, plan)?;

        let mut n = 1;
        let key = loop {
            let candidate = KeyId::new(format!("{}-key-{}", plan, n));
            if !self.keys.contains_key(&candidate) {
                break candidate;
            }
            n += 1;
        };
        self.issue_named_key(plan, key)
    }

    /// Issue a key with a chosen id and bind it to the plan.
    pub fn issue_named_key(&mut self, plan: &PlanId, key: impl Into<KeyId>) -> Result<KeyId> {
        let key = key.into();
        lookup(&self.plans, ResourceKind::UsagePlan, plan)?;
        if self.keys.contains_key(&key) {
            return Err(Error::duplicate(ResourceKind::ApiKey.label(), key.to_string()));
        }

        self.keys.insert(key.clone(), ApiKey::new(key.clone()));
        self.add_key(plan, &key)?;
        info!("Issued API key {} for usage plan {}", key, plan);
        Ok(key)
    }

    /// Bind an existing key to another plan.
    pub fn add_key(&mut self, plan: &PlanId, key: &KeyId) -> Result<()> {
        lookup(&self.keys, ResourceKind::ApiKey, key)?;
        let usage_plan = lookup_mut(&mut self.plans, ResourceKind::UsagePlan, plan)?;
        if !usage_plan.add_key(key.clone()) {
            debug!("API key {} already bound to usage plan {}", key, plan);
        }
        Ok(())
    }

    /// Get an API key.
    pub fn api_key(&self, id: &KeyId) -> Result<&ApiKey> {
        lookup(&self.keys, ResourceKind::ApiKey, id)
    }

    /// Enforce a plan against a deployed stage.
    pub fn bind_stage(&mut self, plan: &PlanId, stage: &StageRef) -> Result<()> {
        lookup(&self.plans, ResourceKind::UsagePlan, plan)?;
        let fd = lookup(&self.front_doors, ResourceKind::FrontDoor, &stage.front_door)?;

        if fd.stage_ref().as_ref() != Some(stage) {
            return Err(Error::StageNotFound {
                front_door: stage.front_door.to_string(),
                stage: stage.stage.clone(),
            });
        }

        if !fd.requires_api_key() {
            warn!(
                "Usage plan {} bound to {} which does not require API keys",
                plan, stage
            );
        }

        let usage_plan = lookup_mut(&mut self.plans, ResourceKind::UsagePlan, plan)?;
        if usage_plan.add_stage(stage.clone()) {
            info!("Bound usage plan {} to stage {}", plan, stage);
        } else {
            debug!("Usage plan {} already bound to stage {}", plan, stage);
        }
        Ok(())
    }

    // ----- lifecycle ------------------------------------------------------

    fn resource(&self, r: &ResourceRef) -> Result<&dyn Resource> {
        let resource: &dyn Resource = match r {
            ResourceRef::Handler(id) => self.handler(id)?,
            ResourceRef::IdentityProvider(id) => self.identity_provider(id)?,
            ResourceRef::FrontDoor(id) => self.front_door(id)?,
            ResourceRef::EdgeCache(id) => self.edge_cache(id)?,
            ResourceRef::UsagePlan(id) => self.usage_plan(id)?,
            ResourceRef::ApiKey(id) => self.api_key(id)?,
        };
        Ok(resource)
    }

    fn resource_mut(&mut self, r: &ResourceRef) -> Result<&mut dyn Resource> {
        let kind = r.kind();
        let resource: &mut dyn Resource = match r {
            ResourceRef::Handler(id) => lookup_mut(&mut self.handlers, kind, id)?,
            ResourceRef::IdentityProvider(id) => lookup_mut(&mut self.providers, kind, id)?,
            ResourceRef::FrontDoor(id) => lookup_mut(&mut self.front_doors, kind, id)?,
            ResourceRef::EdgeCache(id) => lookup_mut(&mut self.caches, kind, id)?,
            ResourceRef::UsagePlan(id) => lookup_mut(&mut self.plans, kind, id)?,
            ResourceRef::ApiKey(id) => lookup_mut(&mut self.keys, kind, id)?,
        };
        Ok(resource)
    }

    /// Explicitly set a resource's lifecycle policy. Idempotent.
    pub fn apply_policy(&mut self, r: &ResourceRef, policy: LifecyclePolicy) -> Result<()> {
        let resource = self.resource_mut(r)?;
        let setting = PolicySetting::Explicit(policy);
        if resource.policy() != setting {
            resource.set_policy(setting);
            info!("Applied {} policy to {}", policy, resource.resource_ref());
        }
        Ok(())
    }

    /// Drop an explicit policy so the resource inherits again.
    pub fn inherit_policy(&mut self, r: &ResourceRef) -> Result<()> {
        self.resource_mut(r)?.set_policy(PolicySetting::Inherited);
        Ok(())
    }

    /// The resource a dependent inherits its policy from.
    ///
    /// Edge caches follow their origin; handlers follow their unique
    /// consumer. Providers, plans and keys have independent lifecycles.
    pub fn lifecycle_parent(&self, r: &ResourceRef) -> Option<ResourceRef> {
        match r {
            ResourceRef::EdgeCache(id) => self
                .caches
                .get(id)
                .map(|c| ResourceRef::FrontDoor(c.origin.clone())),
            ResourceRef::Handler(id) => self.consumers.get(id).map(|c| match c {
                HandlerConsumer::FrontDoor(fd) => ResourceRef::FrontDoor(fd.clone()),
                HandlerConsumer::Trigger { provider, .. } => {
                    ResourceRef::IdentityProvider(provider.clone())
                }
            }),
            _ => None,
        }
    }

    /// Policy applied at teardown after propagation.
    pub fn effective_policy(&self, r: &ResourceRef) -> Result<LifecyclePolicy> {
        let setting = self.resource(r)?.policy();
        let inherited = match self.lifecycle_parent(r) {
            Some(parent) if !setting.is_explicit() => self.effective_policy(&parent)?,
            _ => self.config.default_policy,
        };
        Ok(setting.resolve(inherited))
    }

    // ----- outputs & synthesis ---------------------------------------------

    /// Record a named output.
    pub fn output(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.outputs.insert(name.into(), value.into());
    }

    /// Named outputs.
    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }

    /// Every resource, leaves first.
    pub fn resources(&self) -> Vec<ResourceRef> {
        let handlers = self.handlers.keys().cloned().map(ResourceRef::Handler);
        let providers = self.providers.keys().cloned().map(ResourceRef::IdentityProvider);
        let front_doors = self.front_doors.keys().cloned().map(ResourceRef::FrontDoor);
        let keys = self.keys.keys().cloned().map(ResourceRef::ApiKey);
        let plans = self.plans.keys().cloned().map(ResourceRef::UsagePlan);
        let caches = self.caches.keys().cloned().map(ResourceRef::EdgeCache);

        handlers
            .chain(providers)
            .chain(front_doors)
            .chain(keys)
            .chain(plans)
            .chain(caches)
            .collect()
    }

    /// Direct dependencies of a resource.
    pub fn depends_on(&self, r: &ResourceRef) -> Result<Vec<ResourceRef>> {
        let deps = match r {
            ResourceRef::Handler(id) => {
                self.handler(id)?;
                Vec::new()
            }
            ResourceRef::ApiKey(id) => {
                self.api_key(id)?;
                Vec::new()
            }
            ResourceRef::IdentityProvider(id) => self
                .identity_provider(id)?
                .triggers()
                .values()
                .cloned()
                .map(ResourceRef::Handler)
                .collect(),
            ResourceRef::FrontDoor(id) => {
                let fd = self.front_door(id)?;
                let mut deps: Vec<_> = fd
                    .handler()
                    .cloned()
                    .map(ResourceRef::Handler)
                    .into_iter()
                    .collect();
                if let Some(AuthorizerBinding::Cognito { provider, .. }) = fd.binding() {
                    deps.push(ResourceRef::IdentityProvider(provider.clone()));
                }
                deps
            }
            ResourceRef::EdgeCache(id) => {
                vec![ResourceRef::FrontDoor(self.edge_cache(id)?.origin.clone())]
            }
            ResourceRef::UsagePlan(id) => {
                let plan = self.usage_plan(id)?;
                let mut deps: Vec<_> = plan
                    .bound_keys()
                    .iter()
                    .cloned()
                    .map(ResourceRef::ApiKey)
                    .collect();
                for stage in plan.bound_stages() {
                    let fd = ResourceRef::FrontDoor(stage.front_door.clone());
                    if !deps.contains(&fd) {
                        deps.push(fd);
                    }
                }
                deps
            }
        };
        Ok(deps)
    }

    fn properties(&self, r: &ResourceRef) -> Result<serde_json::Value> {
        fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value> {
            Ok(serde_json::to_value(value)?)
        }

        match r {
            ResourceRef::Handler(id) => to_value(self.handler(id)?),
            ResourceRef::IdentityProvider(id) => to_value(self.identity_provider(id)?),
            ResourceRef::FrontDoor(id) => to_value(self.front_door(id)?),
            ResourceRef::EdgeCache(id) => to_value(self.edge_cache(id)?),
            ResourceRef::UsagePlan(id) => to_value(self.usage_plan(id)?),
            ResourceRef::ApiKey(id) => to_value(self.api_key(id)?),
        }
    }

    /// Produce the declarative graph a provisioning engine consumes.
    ///
    /// Every front door must be deployed with its authorizer in place.
    pub fn synthesize(&self) -> Result<StackManifest> {
        let mut stages = Vec::new();
        for fd in self.front_doors.values() {
            let stage = fd
                .stage()
                .ok_or_else(|| Error::UndeployedFrontDoor(fd.id.to_string()))?;
            fd.check_authorizer()?;
            stages.push(StageManifest {
                front_door: fd.id.clone(),
                stage: stage.name.clone(),
                invoke_url: stage.invoke_url.clone(),
            });
        }

        let mut resources = Vec::new();
        for r in self.resources() {
            resources.push(ResourceManifest {
                depends_on: self.depends_on(&r)?,
                policy: self.effective_policy(&r)?,
                properties: self.properties(&r)?,
                resource: r,
            });
        }

        let mut outputs = self.outputs.clone();
        for stage in &stages {
            outputs
                .entry(format!("{}Endpoint", stage.front_door))
                .or_insert_with(|| stage.invoke_url.clone());
        }

        debug!(
            "Synthesized stack '{}' with {} resources",
            self.name,
            resources.len()
        );

        Ok(StackManifest {
            stack: self.name.clone(),
            account: self.config.account.clone().unwrap_or_default(),
            region: self.config.region_name().to_string(),
            resources,
            stages,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::identity::{OAuthScope, OAuthSettings};

    fn graph() -> StackGraph {
        let config = StackConfig::new().account("123456789012").region("eu-west-1");
        StackGraph::new("TestStack", config).unwrap()
    }

    fn with_front_door(mode: AuthMode) -> (StackGraph, FrontDoorId) {
        let mut g = graph();
        let h = g
            .add_handler(HandlerReference::function("h1", "handlers/h1/"))
            .unwrap();
        let fd = g
            .create_front_door("RestAPI", &h, EndpointVisibility::Regional, mode)
            .unwrap();
        (g, fd)
    }

    fn ready_provider(g: &mut StackGraph) -> ProviderId {
        let idp = g
            .add_identity_provider(IdentityProvider::new("Pool"))
            .unwrap();
        g.configure_provider(&idp, SignUpPolicy::default(), VerificationPolicy::default())
            .unwrap();
        g.register_client(
            &idp,
            AppClient::new("Client").with_oauth(
                OAuthSettings::authorization_code([OAuthScope::OpenId])
                    .callback_url("http://localhost:3000/auth/callback"),
            ),
        )
        .unwrap();
        g.bind_domain(&idp, HostedDomain::new("demo-{account}"))
            .unwrap();
        idp
    }

    #[test]
    fn test_new_requires_environment() {
        let err = StackGraph::new("s", StackConfig::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Environment);
    }

    #[test]
    fn test_handler_is_consumed_once() {
        let (mut g, fd) = with_front_door(AuthMode::None);
        let h = HandlerId::new("h1");
        assert_eq!(
            g.consumer_of(&h),
            Some(&HandlerConsumer::FrontDoor(fd.clone()))
        );

        let err = g
            .create_front_door("Other", &h, EndpointVisibility::Regional, AuthMode::None)
            .unwrap_err();
        assert!(matches!(err, Error::HandlerAlreadyBound { .. }));
        assert!(g.front_door(&FrontDoorId::new("Other")).is_err());
    }

    #[test]
    fn test_unknown_handler_is_invalid() {
        let mut g = graph();
        let err = g
            .create_front_door(
                "RestAPI",
                &HandlerId::new("missing"),
                EndpointVisibility::Regional,
                AuthMode::None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHandler { .. }));
    }

    #[test]
    fn test_duplicate_resources() {
        let mut g = graph();
        g.add_handler(HandlerReference::function("h", "h/")).unwrap();
        assert!(matches!(
            g.add_handler(HandlerReference::function("h", "h2/")),
            Err(Error::DuplicateResource { .. })
        ));
        g.create_usage_plan("p").unwrap();
        assert!(g.create_usage_plan("p").is_err());
    }

    #[test]
    fn test_attach_authorizer_requires_bound_domain() {
        let (mut g, fd) = with_front_door(AuthMode::Cognito);
        let idp = g
            .add_identity_provider(IdentityProvider::new("Pool"))
            .unwrap();

        let err = g.attach_authorizer(&fd, &idp, "Authorization").unwrap_err();
        assert!(matches!(err, Error::DomainNotBound { .. }));
        assert_eq!(err.category(), ErrorCategory::BindingOrder);
    }

    #[test]
    fn test_attach_authorizer_idempotent() {
        let (mut g, fd) = with_front_door(AuthMode::Cognito);
        let idp = ready_provider(&mut g);

        let first = g.attach_authorizer(&fd, &idp, "Authorization").unwrap();
        let second = g.attach_authorizer(&fd, &idp, "Authorization").unwrap();
        assert_eq!(first, second);
        assert_eq!(g.front_door(&fd).unwrap().binding(), Some(&first));

        assert!(matches!(
            g.attach_authorizer(&fd, &idp, "X-Other"),
            Err(Error::ConflictingBinding { .. })
        ));
        assert!(matches!(
            g.attach_authorizer(&fd, &idp, "not a header"),
            Err(Error::InvalidIdentitySource(_))
        ));
    }

    #[test]
    fn test_domain_substitution_and_output() {
        let mut g = graph();
        let idp = ready_provider(&mut g);
        let provider = g.identity_provider(&idp).unwrap();
        assert_eq!(provider.domain().unwrap().prefix, "demo-123456789012");
        assert_eq!(
            g.outputs().get("PoolDomainURL").map(String::as_str),
            Some("https://demo-123456789012.auth.eu-west-1.amazoncognito.com")
        );
    }

    #[test]
    fn test_domain_with_missing_placeholder() {
        let mut g = graph();
        let idp = g
            .add_identity_provider(IdentityProvider::new("Pool"))
            .unwrap();
        g.configure_provider(&idp, SignUpPolicy::default(), VerificationPolicy::default())
            .unwrap();
        g.register_client(&idp, AppClient::new("Client")).unwrap();
        let err = g
            .bind_domain(&idp, HostedDomain::new("demo-{TEAM}"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingEnvironment { .. }));
    }

    #[test]
    fn test_trigger_claims_handler() {
        let mut g = graph();
        let trigger = g
            .add_handler(HandlerReference::function("trigger", "trigger/").with_timeout(300))
            .unwrap();
        let idp = g
            .add_identity_provider(IdentityProvider::new("Pool"))
            .unwrap();

        // Not configured yet: nothing is claimed.
        assert!(g
            .add_trigger(&idp, TriggerEvent::PostConfirmation, &trigger)
            .is_err());
        assert!(g.consumer_of(&trigger).is_none());

        g.configure_provider(&idp, SignUpPolicy::default(), VerificationPolicy::default())
            .unwrap();
        g.add_trigger(&idp, TriggerEvent::PostConfirmation, &trigger)
            .unwrap();
        assert!(matches!(
            g.consumer_of(&trigger),
            Some(HandlerConsumer::Trigger { .. })
        ));

        assert!(matches!(
            g.create_front_door("api", &trigger, EndpointVisibility::Regional, AuthMode::None),
            Err(Error::HandlerAlreadyBound { .. })
        ));
    }

    #[test]
    fn test_bind_stage_requires_deploy() {
        let (mut g, fd) = with_front_door(AuthMode::ApiKey);
        g.attach_api_key_authorizer(&fd).unwrap();
        let plan = g.create_usage_plan("P").unwrap();
        let stage = StageRef::new(fd.clone(), "prod");

        let err = g.bind_stage(&plan, &stage).unwrap_err();
        assert!(matches!(err, Error::StageNotFound { .. }));
        assert!(g.usage_plan(&plan).unwrap().bound_stages().is_empty());

        let deployed = g.deploy(&fd).unwrap();
        assert_eq!(deployed, stage);
        g.bind_stage(&plan, &deployed).unwrap();
        g.bind_stage(&plan, &deployed).unwrap();
        assert_eq!(g.usage_plan(&plan).unwrap().bound_stages(), &[deployed]);

        let wrong = StageRef::new(fd, "dev");
        assert!(matches!(
            g.bind_stage(&plan, &wrong),
            Err(Error::StageNotFound { .. })
        ));
    }

    #[test]
    fn test_keys_shared_across_plans() {
        let mut g = graph();
        let gold = g.create_usage_plan("Gold").unwrap();
        let silver = g.create_usage_plan("Silver").unwrap();

        let key = g.issue_key(&gold).unwrap();
        assert_eq!(key.as_str(), "Gold-key-1");
        g.add_key(&silver, &key).unwrap();
        g.add_key(&silver, &key).unwrap();

        assert_eq!(g.usage_plan(&gold).unwrap().bound_keys(), &[key.clone()]);
        assert_eq!(g.usage_plan(&silver).unwrap().bound_keys(), &[key]);

        let second = g.issue_key(&gold).unwrap();
        assert_eq!(second.as_str(), "Gold-key-2");
        assert!(g.issue_named_key(&silver, "Gold-key-2").is_err());
    }

    #[test]
    fn test_cache_requires_deployed_origin() {
        let (mut g, fd) = with_front_door(AuthMode::None);
        let policy = CachePolicy::new(3600, 86400).unwrap();
        assert!(matches!(
            g.wrap_with_cache("cdn", &fd, policy.clone()),
            Err(Error::OriginNotReady { .. })
        ));

        g.deploy(&fd).unwrap();
        let cache = g.wrap_with_cache("cdn", &fd, policy).unwrap();
        g.add_error_response(&cache, ErrorResponse::new(404, "/errors/404.json", 300).unwrap())
            .unwrap();
        assert_eq!(g.edge_cache(&cache).unwrap().error_responses.len(), 1);
    }

    #[test]
    fn test_cache_rejects_unchecked_values() {
        let (mut g, fd) = with_front_door(AuthMode::None);
        g.deploy(&fd).unwrap();

        let policy = CachePolicy {
            min_ttl: 0,
            default_ttl: 86400,
            max_ttl: 3600,
            compression: Vec::new(),
        };
        assert!(matches!(
            g.wrap_with_cache("cdn", &fd, policy),
            Err(Error::InvalidTtl { .. })
        ));
        assert!(g.edge_cache(&CacheId::new("cdn")).is_err());

        let cache = g
            .wrap_with_cache("cdn", &fd, CachePolicy::new(0, 60).unwrap())
            .unwrap();
        let response = ErrorResponse {
            status: 404,
            response_status: 200,
            page_path: "errors/404.json".to_string(),
            ttl: 60,
        };
        assert!(matches!(
            g.add_error_response(&cache, response),
            Err(Error::InvalidErrorResponse(_))
        ));
        assert!(g.edge_cache(&cache).unwrap().error_responses.is_empty());
    }

    #[test]
    fn test_lifecycle_propagation() {
        let (mut g, fd) = with_front_door(AuthMode::None);
        g.deploy(&fd).unwrap();
        let cache = g
            .wrap_with_cache("cdn", &fd, CachePolicy::new(60, 3600).unwrap())
            .unwrap();
        let fd_ref = ResourceRef::FrontDoor(fd.clone());
        let cache_ref = ResourceRef::EdgeCache(cache);
        let handler_ref = ResourceRef::Handler(HandlerId::new("h1"));

        assert_eq!(g.effective_policy(&cache_ref).unwrap(), LifecyclePolicy::Destroy);

        g.apply_policy(&fd_ref, LifecyclePolicy::Retain).unwrap();
        g.apply_policy(&fd_ref, LifecyclePolicy::Retain).unwrap();
        assert_eq!(g.effective_policy(&cache_ref).unwrap(), LifecyclePolicy::Retain);
        assert_eq!(g.effective_policy(&handler_ref).unwrap(), LifecyclePolicy::Retain);

        g.apply_policy(&cache_ref, LifecyclePolicy::Destroy).unwrap();
        assert_eq!(g.effective_policy(&cache_ref).unwrap(), LifecyclePolicy::Destroy);

        g.inherit_policy(&cache_ref).unwrap();
        assert_eq!(g.effective_policy(&cache_ref).unwrap(), LifecyclePolicy::Retain);
    }

    #[test]
    fn test_independent_resources_do_not_inherit() {
        let (mut g, fd) = with_front_door(AuthMode::Cognito);
        let idp = ready_provider(&mut g);
        g.attach_authorizer(&fd, &idp, "Authorization").unwrap();
        g.apply_policy(&ResourceRef::FrontDoor(fd), LifecyclePolicy::Retain)
            .unwrap();

        let idp_ref = ResourceRef::IdentityProvider(idp);
        assert_eq!(g.lifecycle_parent(&idp_ref), None);
        assert_eq!(g.effective_policy(&idp_ref).unwrap(), LifecyclePolicy::Destroy);
    }

    #[test]
    fn test_synthesize_requires_deployed_front_doors() {
        let (mut g, fd) = with_front_door(AuthMode::None);
        assert!(matches!(
            g.synthesize(),
            Err(Error::UndeployedFrontDoor(_))
        ));

        g.deploy(&fd).unwrap();
        let manifest = g.synthesize().unwrap();
        assert_eq!(manifest.stages.len(), 1);
        assert_eq!(manifest.region, "eu-west-1");

        let handler = ResourceRef::Handler(HandlerId::new("h1"));
        let front_door = ResourceRef::FrontDoor(fd);
        assert!(manifest.position(&handler) < manifest.position(&front_door));
        assert_eq!(
            manifest.find(&front_door).unwrap().depends_on,
            vec![handler]
        );
        assert!(manifest.outputs.contains_key("RestAPIEndpoint"));
    }

    #[test]
    fn test_failed_call_leaves_graph_untouched() {
        let (mut g, fd) = with_front_door(AuthMode::ApiKey);
        assert!(g.deploy(&fd).is_err());
        assert!(!g.front_door(&fd).unwrap().is_deployed());
        assert!(g.wrap_with_cache("cdn", &fd, CachePolicy::new(0, 0).unwrap()).is_err());
        assert!(g.edge_cache(&CacheId::new("cdn")).is_err());
    }
}
