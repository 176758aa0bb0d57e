//! App client registration for an identity provider.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Token lifetimes issued to an app client, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenValiditySpans {
    /// Lifetime of the sign-in session token.
    pub auth_session_minutes: u32,
    /// Lifetime of access tokens.
    pub access_token_minutes: u32,
    /// Lifetime of id tokens.
    pub id_token_minutes: u32,
    /// Lifetime of refresh tokens.
    pub refresh_token_minutes: u32,
}

const MINUTES_PER_DAY: u32 = 24 * 60;

impl Default for TokenValiditySpans {
    fn default() -> Self {
        Self {
            auth_session_minutes: 3,
            access_token_minutes: 60,
            id_token_minutes: 60,
            refresh_token_minutes: 5 * MINUTES_PER_DAY,
        }
    }
}

impl TokenValiditySpans {
    /// Check every span against the provider limits.
    pub fn validate(&self) -> Result<()> {
        check_span("auth session", self.auth_session_minutes, 3, 15)?;
        check_span("access token", self.access_token_minutes, 5, MINUTES_PER_DAY)?;
        check_span("id token", self.id_token_minutes, 5, MINUTES_PER_DAY)?;
        check_span(
            "refresh token",
            self.refresh_token_minutes,
            60,
            3650 * MINUTES_PER_DAY,
        )?;

        if self.access_token_minutes > self.refresh_token_minutes
            || self.id_token_minutes > self.refresh_token_minutes
        {
            return Err(Error::InvalidTokenValidity(
                "access and id tokens must not outlive the refresh token".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_span(name: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidTokenValidity(format!(
            "{} validity {}m outside {}m..={}m",
            name, value, min, max
        )))
    }
}

/// Direct sign-in flows an app client may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFlows {
    /// Secure remote password.
    pub user_srp: bool,
    /// Plain username and password.
    pub user_password: bool,
}

/// OAuth grant types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthFlows {
    pub authorization_code_grant: bool,
    pub implicit_code_grant: bool,
}

/// OAuth scopes an app client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthScope {
    OpenId,
    Email,
    Profile,
    Phone,
}

/// Hosted OAuth configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub flows: OAuthFlows,
    pub scopes: Vec<OAuthScope>,
    pub callback_urls: Vec<String>,
    pub logout_urls: Vec<String>,
}

impl OAuthSettings {
    /// Authorization-code grant with the given scopes.
    pub fn authorization_code(scopes: impl IntoIterator<Item = OAuthScope>) -> Self {
        Self {
            flows: OAuthFlows {
                authorization_code_grant: true,
                implicit_code_grant: false,
            },
            scopes: scopes.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Add a callback URL.
    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_urls.push(url.into());
        self
    }

    /// Add a logout URL.
    pub fn logout_url(mut self, url: impl Into<String>) -> Self {
        self.logout_urls.push(url.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.flows.authorization_code_grant && !self.flows.implicit_code_grant {
            return Err(Error::InvalidClient(
                "OAuth enabled without any grant type".to_string(),
            ));
        }

        if self.callback_urls.is_empty() {
            return Err(Error::InvalidClient(
                "OAuth flows require at least one callback URL".to_string(),
            ));
        }

        for url in self.callback_urls.iter().chain(self.logout_urls.iter()) {
            check_redirect_url(url)?;
        }

        if self.scopes.is_empty() {
            return Err(Error::InvalidClient("OAuth scopes are empty".to_string()));
        }

        let needs_openid = self
            .scopes
            .iter()
            .any(|s| matches!(s, OAuthScope::Email | OAuthScope::Profile | OAuthScope::Phone));
        if needs_openid && !self.scopes.contains(&OAuthScope::OpenId) {
            return Err(Error::InvalidClient(
                "email, profile and phone scopes require openid".to_string(),
            ));
        }

        Ok(())
    }
}

// HTTPS everywhere except loopback development hosts.
fn check_redirect_url(url: &str) -> Result<()> {
    let ok = if let Some(rest) = url.strip_prefix("https://") {
        !rest.is_empty()
    } else if let Some(rest) = url.strip_prefix("http://") {
        let host = rest.split(['/', ':']).next().unwrap_or_default();
        host == "localhost" || host == "127.0.0.1"
    } else {
        false
    };

    if ok {
        Ok(())
    } else {
        Err(Error::InvalidClient(format!(
            "redirect URL '{}' must use https (http only for localhost)",
            url
        )))
    }
}

/// Application client registered with an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppClient {
    /// Client name.
    pub name: String,
    /// Direct sign-in flows.
    pub auth_flows: AuthFlows,
    /// Hosted OAuth configuration, if enabled.
    pub oauth: Option<OAuthSettings>,
    /// Token lifetimes.
    pub token_validity: TokenValiditySpans,
    /// Whether refresh tokens can be revoked.
    pub enable_token_revocation: bool,
    /// Hide whether a user exists in sign-in errors.
    pub prevent_user_existence_errors: bool,
    /// Identity providers federated through this client.
    pub supported_providers: Vec<String>,
}

impl AppClient {
    /// Create a client with SRP sign-in and default token lifetimes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth_flows: AuthFlows {
                user_srp: true,
                user_password: false,
            },
            oauth: None,
            token_validity: TokenValiditySpans::default(),
            enable_token_revocation: true,
            prevent_user_existence_errors: true,
            supported_providers: vec!["COGNITO".to_string()],
        }
    }

    /// Enable hosted OAuth.
    pub fn with_oauth(mut self, oauth: OAuthSettings) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Set the token lifetimes.
    pub fn with_token_validity(mut self, spans: TokenValiditySpans) -> Self {
        self.token_validity = spans;
        self
    }

    /// Set the direct sign-in flows.
    pub fn with_auth_flows(mut self, flows: AuthFlows) -> Self {
        self.auth_flows = flows;
        self
    }

    /// Check the client configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidClient("client name is empty".to_string()));
        }

        let has_direct_flow = self.auth_flows.user_srp || self.auth_flows.user_password;
        if !has_direct_flow && self.oauth.is_none() {
            return Err(Error::InvalidClient(format!(
                "client '{}' has no sign-in flow",
                self.name
            )));
        }

        if let Some(oauth) = &self.oauth {
            oauth.validate()?;
        }

        self.token_validity.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OAuthSettings {
        OAuthSettings::authorization_code([OAuthScope::OpenId, OAuthScope::Email])
            .callback_url("http://localhost:3000/auth/callback")
            .logout_url("http://localhost:3000")
    }

    #[test]
    fn test_default_client_is_valid() {
        let client = AppClient::new("DemoClient").with_oauth(oauth());
        assert!(client.validate().is_ok());
        assert_eq!(client.token_validity.refresh_token_minutes, 7200);
    }

    #[test]
    fn test_token_validity_limits() {
        let spans = TokenValiditySpans {
            auth_session_minutes: 2,
            ..Default::default()
        };
        assert!(matches!(
            spans.validate(),
            Err(Error::InvalidTokenValidity(_))
        ));

        let spans = TokenValiditySpans {
            access_token_minutes: 2 * MINUTES_PER_DAY,
            ..Default::default()
        };
        assert!(spans.validate().is_err());

        let spans = TokenValiditySpans {
            access_token_minutes: 120,
            refresh_token_minutes: 60,
            ..Default::default()
        };
        assert!(spans.validate().is_err());
    }

    #[test]
    fn test_oauth_requires_callback() {
        let settings = OAuthSettings::authorization_code([OAuthScope::OpenId]);
        let client = AppClient::new("c").with_oauth(settings);
        assert!(matches!(client.validate(), Err(Error::InvalidClient(_))));
    }

    #[test]
    fn test_redirect_urls_need_https() {
        let settings = OAuthSettings::authorization_code([OAuthScope::OpenId])
            .callback_url("http://example.com/callback");
        assert!(AppClient::new("c").with_oauth(settings).validate().is_err());

        let settings = OAuthSettings::authorization_code([OAuthScope::OpenId])
            .callback_url("https://example.com/callback");
        assert!(AppClient::new("c").with_oauth(settings).validate().is_ok());
    }

    #[test]
    fn test_email_scope_requires_openid() {
        let settings = OAuthSettings::authorization_code([OAuthScope::Email])
            .callback_url("https://example.com/callback");
        assert!(AppClient::new("c").with_oauth(settings).validate().is_err());
    }

    #[test]
    fn test_client_needs_a_flow() {
        let client = AppClient::new("c").with_auth_flows(AuthFlows::default());
        assert!(client.validate().is_err());
    }
}
