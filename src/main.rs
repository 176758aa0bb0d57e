//! apistack - Example stacks
//!
//! This example composes three reference stacks and materializes them on the
//! in-memory provisioning engine.

use apistack::prelude::*;
use tracing_subscriber::EnvFilter;

/// API-key protected API with a usage plan.
fn license_stack(config: StackConfig) -> apistack::Result<StackGraph> {
    let mut graph = StackGraph::new("LicenseStack", config)?;

    let handler = graph.add_handler(
        HandlerReference::function("LicenseHandler", "handlers/licenses/")
            .with_description("License issuing service")
            .with_env("TABLE_NAME", "licenses"),
    )?;
    let api = graph.create_front_door(
        "LicenseAPI",
        &handler,
        EndpointVisibility::Regional,
        AuthMode::ApiKey,
    )?;
    graph.attach_api_key_authorizer(&api)?;
    let stage = graph.deploy(&api)?;

    let plan = graph.add_usage_plan(
        UsagePlan::new("LicensePlan")
            .with_throttle(100.0, 200)
            .with_quota(10_000, QuotaPeriod::Month),
    )?;
    let key = graph.issue_key(&plan)?;
    graph.bind_stage(&plan, &stage)?;
    graph.output("LicenseApiKeyId", key.to_string());

    Ok(graph)
}

/// Public API served through an edge cache.
fn cached_stack(config: StackConfig) -> apistack::Result<StackGraph> {
    let mut graph = StackGraph::new("CatalogStack", config)?;

    let handler = graph.add_handler(
        HandlerReference::container("CatalogService", "catalog:latest", 8080).with_timeout(60),
    )?;
    let api = graph.create_front_door(
        "CatalogAPI",
        &handler,
        EndpointVisibility::Regional,
        AuthMode::None,
    )?;
    graph.deploy(&api)?;

    let policy = CachePolicy::new(3600, 86400)?
        .compress(Compression::Gzip)
        .compress(Compression::Brotli);
    let cdn = graph.wrap_with_cache("CatalogCDN", &api, policy)?;
    graph.add_error_response(&cdn, ErrorResponse::new(404, "/errors/404.json", 300)?)?;
    graph.apply_policy(&ResourceRef::EdgeCache(cdn), LifecyclePolicy::Retain)?;

    Ok(graph)
}

/// API authorized by a hosted identity provider.
fn identity_stack(config: StackConfig) -> apistack::Result<StackGraph> {
    let mut graph = StackGraph::new("AccountsStack", config)?;

    let handler = graph.add_handler(HandlerReference::function(
        "AccountsHandler",
        "handlers/accounts/",
    ))?;
    let on_confirm = graph.add_handler(
        HandlerReference::function("PostConfirmation", "handlers/post-confirmation/")
            .with_timeout(10),
    )?;

    let pool = graph.add_identity_provider(IdentityProvider::new("UserPool"))?;
    graph.configure_provider(&pool, SignUpPolicy::default(), VerificationPolicy::default())?;
    graph.add_trigger(&pool, TriggerEvent::PostConfirmation, &on_confirm)?;
    graph.register_client(
        &pool,
        AppClient::new("WebClient").with_oauth(
            OAuthSettings::authorization_code([
                OAuthScope::OpenId,
                OAuthScope::Email,
                OAuthScope::Profile,
            ])
            .callback_url("http://localhost:3000/auth/callback")
            .logout_url("http://localhost:3000/"),
        ),
    )?;
    graph.bind_domain(&pool, HostedDomain::new("accounts-{account}"))?;
    graph.apply_branding(&pool, Branding::provider_defaults())?;

    let api = graph.create_front_door(
        "AccountsAPI",
        &handler,
        EndpointVisibility::Regional,
        AuthMode::Cognito,
    )?;
    graph.attach_authorizer(&api, &pool, "Authorization")?;
    graph.deploy(&api)?;

    Ok(graph)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = StackConfig::from_env();
    if config.account.is_none() {
        config = config.account("123456789012");
    }
    if config.region.is_none() {
        config = config.region("us-east-1");
    }

    tracing::info!(
        "Composing stacks for account {} in {}",
        config.account.as_deref().unwrap_or_default(),
        config.region_name()
    );

    let stacks = [
        license_stack(config.clone())?,
        cached_stack(config.clone())?,
        identity_stack(config)?,
    ];

    let engine = MemoryEngine::new();
    for graph in &stacks {
        let manifest = graph.synthesize()?;
        tracing::debug!("Manifest for {}:\n{}", manifest.stack, manifest.to_json_pretty()?);

        let deployment = engine.materialize(&manifest).await?;
        for stage in &deployment.stages {
            tracing::info!(
                "{}: {} ({}) -> {}",
                deployment.stack,
                stage.front_door,
                stage.stage,
                stage.invoke_url
            );
        }
        for (name, value) in &deployment.outputs {
            tracing::info!("{}: output {} = {}", deployment.stack, name, value);
        }
    }

    Ok(())
}
