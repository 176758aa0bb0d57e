//! Identity provider configuration state machine.
//!
//! ```text
//! Unconfigured ─▶ Configured ─▶ ClientRegistered ─▶ DomainBound ─▶ BrandingApplied
//!                     │
//!                     └─ trigger hooks attach here only
//! ```
//!
//! Transitions are one-directional. Each step validates its input and leaves
//! the provider untouched on failure.

use crate::error::{Error, Result};
use crate::identity::client::AppClient;
use crate::identity::domain::{Branding, HostedDomain};
use crate::lifecycle::PolicySetting;
use crate::resource::{HandlerId, ProviderId, Resource, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Configuration state of an identity provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    #[default]
    Unconfigured,
    Configured,
    ClientRegistered,
    DomainBound,
    BrandingApplied,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderState::Unconfigured => write!(f, "UNCONFIGURED"),
            ProviderState::Configured => write!(f, "CONFIGURED"),
            ProviderState::ClientRegistered => write!(f, "CLIENT_REGISTERED"),
            ProviderState::DomainBound => write!(f, "DOMAIN_BOUND"),
            ProviderState::BrandingApplied => write!(f, "BRANDING_APPLIED"),
        }
    }
}

/// How users identify themselves at sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInAliases {
    pub username: bool,
    pub email: bool,
    pub phone: bool,
}

impl Default for SignInAliases {
    fn default() -> Self {
        Self {
            username: false,
            email: true,
            phone: false,
        }
    }
}

/// Standard user attributes a provider can require at sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardAttribute {
    Email,
    FullName,
    GivenName,
    FamilyName,
    PhoneNumber,
}

/// Multi-factor authentication mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mfa {
    #[default]
    Off,
    Optional,
    Required,
}

/// Channel used to recover an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRecovery {
    #[default]
    EmailOnly,
    PhoneOnly,
    EmailAndPhone,
    None,
}

/// Who can sign up and with which attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpPolicy {
    /// Whether users may register themselves.
    pub self_sign_up: bool,
    /// Sign-in identifiers.
    pub sign_in_aliases: SignInAliases,
    /// Attributes required at sign-up.
    pub required_attributes: Vec<StandardAttribute>,
    /// MFA mode.
    pub mfa: Mfa,
    /// Recovery channel.
    pub account_recovery: AccountRecovery,
}

impl Default for SignUpPolicy {
    fn default() -> Self {
        Self {
            self_sign_up: true,
            sign_in_aliases: SignInAliases::default(),
            required_attributes: vec![StandardAttribute::Email],
            mfa: Mfa::Off,
            account_recovery: AccountRecovery::EmailOnly,
        }
    }
}

impl SignUpPolicy {
    /// Require an additional attribute.
    pub fn require(mut self, attribute: StandardAttribute) -> Self {
        if !self.required_attributes.contains(&attribute) {
            self.required_attributes.push(attribute);
        }
        self
    }

    fn has_email(&self) -> bool {
        self.sign_in_aliases.email || self.required_attributes.contains(&StandardAttribute::Email)
    }

    fn has_phone(&self) -> bool {
        self.sign_in_aliases.phone
            || self
                .required_attributes
                .contains(&StandardAttribute::PhoneNumber)
    }

    /// Check aliases against the recovery and MFA settings.
    pub fn validate(&self) -> Result<()> {
        let aliases = self.sign_in_aliases;
        if !aliases.username && !aliases.email && !aliases.phone {
            return Err(Error::InvalidSignUp(
                "at least one sign-in alias is required".to_string(),
            ));
        }

        let recovery_ok = match self.account_recovery {
            AccountRecovery::EmailOnly => self.has_email(),
            AccountRecovery::PhoneOnly => self.has_phone(),
            AccountRecovery::EmailAndPhone => self.has_email() && self.has_phone(),
            AccountRecovery::None => true,
        };
        if !recovery_ok {
            return Err(Error::InvalidSignUp(format!(
                "{:?} recovery needs the matching attribute",
                self.account_recovery
            )));
        }

        if self.mfa == Mfa::Required && !self.has_phone() {
            return Err(Error::InvalidSignUp(
                "required MFA needs a phone number attribute".to_string(),
            ));
        }

        Ok(())
    }
}

/// Verification message style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStyle {
    #[default]
    Code,
    Link,
}

/// Channels verified automatically at sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoVerify {
    pub email: bool,
    pub phone: bool,
}

impl Default for AutoVerify {
    fn default() -> Self {
        Self {
            email: true,
            phone: false,
        }
    }
}

const CODE_PLACEHOLDER: &str = "{####}";
const LINK_PLACEHOLDER: &str = "{##Verify Email##}";

/// How new users verify their contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPolicy {
    pub email_style: VerificationStyle,
    pub email_subject: String,
    pub email_body: String,
    pub auto_verify: AutoVerify,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            email_style: VerificationStyle::Code,
            email_subject: "Verify your email".to_string(),
            email_body: format!(
                "Thanks for signing up! Your verification code is {}",
                CODE_PLACEHOLDER
            ),
            auto_verify: AutoVerify::default(),
        }
    }
}

impl VerificationPolicy {
    /// Check that the message template carries the placeholder for its style.
    pub fn validate(&self) -> Result<()> {
        if self.email_subject.trim().is_empty() {
            return Err(Error::InvalidVerification(
                "email subject is empty".to_string(),
            ));
        }

        let placeholder = match self.email_style {
            VerificationStyle::Code => CODE_PLACEHOLDER,
            VerificationStyle::Link => LINK_PLACEHOLDER,
        };
        if !self.email_body.contains(placeholder) {
            return Err(Error::InvalidVerification(format!(
                "email body must contain {}",
                placeholder
            )));
        }

        Ok(())
    }
}

/// Named lifecycle points at which a provider invokes a trigger hook.
///
/// A hook runs synchronously: the provider waits for it to finish before
/// continuing, and a failing hook aborts the operation that fired it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriggerEvent {
    PreSignUp,
    PostConfirmation,
    PreAuthentication,
    PostAuthentication,
    CustomMessage,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::PreSignUp => write!(f, "PreSignUp"),
            TriggerEvent::PostConfirmation => write!(f, "PostConfirmation"),
            TriggerEvent::PreAuthentication => write!(f, "PreAuthentication"),
            TriggerEvent::PostAuthentication => write!(f, "PostAuthentication"),
            TriggerEvent::CustomMessage => write!(f, "CustomMessage"),
        }
    }
}

/// Issues and validates caller identity tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProvider {
    /// Unique identifier within the stack.
    pub id: ProviderId,
    state: ProviderState,
    sign_up: Option<SignUpPolicy>,
    verification: Option<VerificationPolicy>,
    triggers: BTreeMap<TriggerEvent, HandlerId>,
    client: Option<AppClient>,
    domain: Option<HostedDomain>,
    branding: Option<Branding>,
    #[serde(default)]
    policy: PolicySetting,
}

impl IdentityProvider {
    /// Create an unconfigured provider.
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            state: ProviderState::Unconfigured,
            sign_up: None,
            verification: None,
            triggers: BTreeMap::new(),
            client: None,
            domain: None,
            branding: None,
            policy: PolicySetting::Inherited,
        }
    }

    /// Current configuration state.
    pub fn state(&self) -> ProviderState {
        self.state
    }

    pub fn sign_up(&self) -> Option<&SignUpPolicy> {
        self.sign_up.as_ref()
    }

    pub fn verification(&self) -> Option<&VerificationPolicy> {
        self.verification.as_ref()
    }

    pub fn client(&self) -> Option<&AppClient> {
        self.client.as_ref()
    }

    pub fn domain(&self) -> Option<&HostedDomain> {
        self.domain.as_ref()
    }

    pub fn branding(&self) -> Option<&Branding> {
        self.branding.as_ref()
    }

    /// Attached trigger hooks by event.
    pub fn triggers(&self) -> &BTreeMap<TriggerEvent, HandlerId> {
        &self.triggers
    }

    fn transition_error(&self, to: ProviderState) -> Error {
        Error::InvalidTransition {
            provider: self.id.to_string(),
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }

    fn advance(&mut self, to: ProviderState) {
        info!("Identity provider '{}': {} -> {}", self.id, self.state, to);
        self.state = to;
    }

    /// Set the sign-up and verification policies.
    pub fn configure(
        &mut self,
        sign_up: SignUpPolicy,
        verification: VerificationPolicy,
    ) -> Result<()> {
        if self.state != ProviderState::Unconfigured {
            return Err(self.transition_error(ProviderState::Configured));
        }

        sign_up.validate()?;
        verification.validate()?;

        self.sign_up = Some(sign_up);
        self.verification = Some(verification);
        self.advance(ProviderState::Configured);
        Ok(())
    }

    /// Attach a trigger hook for a lifecycle event.
    ///
    /// Only allowed while the provider is `Configured`. Callers composing a
    /// stack go through the graph so the handler is claimed exclusively.
    pub fn attach_trigger(&mut self, event: TriggerEvent, handler: HandlerId) -> Result<()> {
        match self.state {
            ProviderState::Configured => {}
            ProviderState::Unconfigured => {
                return Err(self.transition_error(ProviderState::Configured));
            }
            state => {
                return Err(Error::LateBinding {
                    provider: self.id.to_string(),
                    state: state.to_string(),
                });
            }
        }

        if self.triggers.contains_key(&event) {
            return Err(Error::DuplicateTrigger {
                provider: self.id.to_string(),
                event: event.to_string(),
            });
        }

        info!(
            "Identity provider '{}': {} trigger -> handler '{}'",
            self.id, event, handler
        );
        self.triggers.insert(event, handler);
        Ok(())
    }

    /// Register the app client and its OAuth flows.
    pub fn register_client(&mut self, client: AppClient) -> Result<()> {
        if self.state != ProviderState::Configured {
            return Err(self.transition_error(ProviderState::ClientRegistered));
        }

        client.validate()?;

        self.client = Some(client);
        self.advance(ProviderState::ClientRegistered);
        Ok(())
    }

    /// Assign the hosted auth domain.
    ///
    /// The prefix must already be resolved; the stack graph substitutes
    /// environment placeholders before calling this.
    pub fn bind_domain(&mut self, domain: HostedDomain) -> Result<()> {
        if self.state != ProviderState::ClientRegistered {
            return Err(self.transition_error(ProviderState::DomainBound));
        }

        domain.validate()?;

        self.domain = Some(domain);
        self.advance(ProviderState::DomainBound);
        Ok(())
    }

    /// Apply hosted-page branding.
    pub fn apply_branding(&mut self, branding: Branding) -> Result<()> {
        let domain = self.require_domain()?;

        if self.state != ProviderState::DomainBound {
            return Err(self.transition_error(ProviderState::BrandingApplied));
        }

        if !domain.supports_branding() {
            return Err(Error::InvalidDomain {
                domain: domain.prefix.clone(),
                reason: "classic hosted UI does not support branding".to_string(),
            });
        }

        self.branding = Some(branding);
        self.advance(ProviderState::BrandingApplied);
        Ok(())
    }

    /// The bound hosted domain, or `DomainNotBound` if the provider is not
    /// far enough along to authorize callers.
    pub fn require_domain(&self) -> Result<&HostedDomain> {
        match (&self.domain, self.state >= ProviderState::DomainBound) {
            (Some(domain), true) => Ok(domain),
            _ => Err(Error::DomainNotBound {
                provider: self.id.to_string(),
                state: self.state.to_string(),
            }),
        }
    }
}

impl Resource for IdentityProvider {
    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::IdentityProvider(self.id.clone())
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
    use crate::identity::client::{OAuthScope, OAuthSettings};

    fn client() -> AppClient {
        AppClient::new("DemoClient").with_oauth(
            OAuthSettings::authorization_code([OAuthScope::OpenId, OAuthScope::Email])
                .callback_url("http://localhost:3000/auth/callback"),
        )
    }

    fn configured() -> IdentityProvider {
        let mut idp = IdentityProvider::new("DemoPool");
        idp.configure(
            SignUpPolicy::default().require(StandardAttribute::FullName),
            VerificationPolicy::default(),
        )
        .unwrap();
        idp
    }

    #[test]
    fn test_full_transition_sequence() {
        let mut idp = configured();
        assert_eq!(idp.state(), ProviderState::Configured);

        idp.register_client(client()).unwrap();
        assert_eq!(idp.state(), ProviderState::ClientRegistered);

        idp.bind_domain(HostedDomain::new("demo-login")).unwrap();
        assert_eq!(idp.state(), ProviderState::DomainBound);
        assert!(idp.require_domain().is_ok());

        idp.apply_branding(Branding::provider_defaults()).unwrap();
        assert_eq!(idp.state(), ProviderState::BrandingApplied);
        assert!(idp.require_domain().is_ok());
    }

    #[test]
    fn test_transitions_are_one_directional() {
        let mut idp = configured();
        let err = idp
            .configure(SignUpPolicy::default(), VerificationPolicy::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(err.category(), ErrorCategory::BindingOrder);

        let mut idp = IdentityProvider::new("p");
        assert!(idp.register_client(client()).is_err());
        assert!(idp.bind_domain(HostedDomain::new("demo")).is_err());
        assert_eq!(idp.state(), ProviderState::Unconfigured);
    }

    #[test]
    fn test_branding_requires_domain() {
        let mut idp = configured();
        idp.register_client(client()).unwrap();
        let err = idp.apply_branding(Branding::provider_defaults()).unwrap_err();
        assert!(matches!(err, Error::DomainNotBound { .. }));
    }

    #[test]
    fn test_classic_domain_rejects_branding() {
        let mut idp = configured();
        idp.register_client(client()).unwrap();
        idp.bind_domain(HostedDomain::new("demo").classic()).unwrap();
        assert!(matches!(
            idp.apply_branding(Branding::provider_defaults()),
            Err(Error::InvalidDomain { .. })
        ));
        assert_eq!(idp.state(), ProviderState::DomainBound);
    }

    #[test]
    fn test_triggers_only_while_configured() {
        let mut idp = IdentityProvider::new("p");
        assert!(idp
            .attach_trigger(TriggerEvent::PostConfirmation, HandlerId::new("t"))
            .is_err());

        let mut idp = configured();
        idp.attach_trigger(TriggerEvent::PostConfirmation, HandlerId::new("t"))
            .unwrap();
        assert!(matches!(
            idp.attach_trigger(TriggerEvent::PostConfirmation, HandlerId::new("t2")),
            Err(Error::DuplicateTrigger { .. })
        ));

        idp.register_client(client()).unwrap();
        let err = idp
            .attach_trigger(TriggerEvent::PreSignUp, HandlerId::new("t3"))
            .unwrap_err();
        assert!(matches!(err, Error::LateBinding { .. }));
        assert_eq!(idp.triggers().len(), 1);
    }

    #[test]
    fn test_domain_not_bound_before_domain_step() {
        let idp = IdentityProvider::new("p");
        assert!(matches!(
            idp.require_domain(),
            Err(Error::DomainNotBound { .. })
        ));
    }

    #[test]
    fn test_sign_up_policy_validation() {
        let policy = SignUpPolicy {
            sign_in_aliases: SignInAliases {
                username: false,
                email: false,
                phone: false,
            },
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(Error::InvalidSignUp(_))));

        let policy = SignUpPolicy {
            account_recovery: AccountRecovery::PhoneOnly,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = SignUpPolicy {
            mfa: Mfa::Required,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_verification_placeholder() {
        let policy = VerificationPolicy {
            email_body: "Welcome!".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(Error::InvalidVerification(_))
        ));

        let policy = VerificationPolicy {
            email_style: VerificationStyle::Link,
            email_body: "Click {##Verify Email##}".to_string(),
            ..Default::default()
        };
        assert!(policy.validate().is_ok());
    }
}
