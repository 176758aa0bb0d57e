//! Identity providers, their app clients and hosted domains.

mod client;
mod domain;
mod provider;

pub use client::{AppClient, AuthFlows, OAuthFlows, OAuthScope, OAuthSettings, TokenValiditySpans};
pub use domain::{Branding, HostedDomain};
pub use provider::{
    AccountRecovery, AutoVerify, IdentityProvider, Mfa, ProviderState, SignInAliases,
    SignUpPolicy, StandardAttribute, TriggerEvent, VerificationPolicy, VerificationStyle,
};
