//! Authorizer bindings and identity-source extraction rules.

use crate::error::{Error, Result};
use crate::front_door::routing::RouteAuthorization;
use crate::resource::ProviderId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default access mode of a front door.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMode {
    /// Servable without any binding.
    #[default]
    None,
    /// Requires an identity-provider authorizer.
    Cognito,
    /// Requires API keys.
    ApiKey,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => write!(f, "NONE"),
            AuthMode::Cognito => write!(f, "COGNITO"),
            AuthMode::ApiKey => write!(f, "API_KEY"),
        }
    }
}

const REQUEST_PREFIX: &str = "method.request.";

/// Where an authorizer reads the caller's identity token from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "location", content = "name", rename_all = "snake_case")]
pub enum IdentitySource {
    /// A named request header.
    Header(String),
    /// A named query-string parameter.
    QueryString(String),
}

impl IdentitySource {
    /// Header extraction rule.
    pub fn header(name: impl Into<String>) -> Self {
        IdentitySource::Header(name.into())
    }

    /// Query-string extraction rule.
    pub fn query_string(name: impl Into<String>) -> Self {
        IdentitySource::QueryString(name.into())
    }

    /// Parse an extraction rule.
    ///
    /// Accepts the fully qualified form (`method.request.header.Authorization`,
    /// `method.request.querystring.token`) or a bare header name.
    pub fn parse(rule: &str) -> Result<Self> {
        let rule = rule.trim();
        let source = match rule.strip_prefix(REQUEST_PREFIX) {
            Some(rest) => match rest.split_once('.') {
                Some(("header", name)) => IdentitySource::header(name),
                Some(("querystring", name)) => IdentitySource::query_string(name),
                _ => return Err(Error::InvalidIdentitySource(rule.to_string())),
            },
            None => IdentitySource::header(rule),
        };
        source.validate()?;
        Ok(source)
    }

    /// Check that the named field is well formed.
    pub fn validate(&self) -> Result<()> {
        let valid = match self {
            IdentitySource::Header(name) => !name.is_empty() && name.chars().all(is_token_char),
            IdentitySource::QueryString(name) => {
                !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            }
        };

        if valid {
            Ok(())
        } else {
            Err(Error::InvalidIdentitySource(self.to_string()))
        }
    }
}

// RFC 9110 token characters.
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

impl PartialEq for IdentitySource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (IdentitySource::Header(a), IdentitySource::Header(b)) => a.eq_ignore_ascii_case(b),
            (IdentitySource::QueryString(a), IdentitySource::QueryString(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for IdentitySource {}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentitySource::Header(name) => write!(f, "{}header.{}", REQUEST_PREFIX, name),
            IdentitySource::QueryString(name) => {
                write!(f, "{}querystring.{}", REQUEST_PREFIX, name)
            }
        }
    }
}

impl std::str::FromStr for IdentitySource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        IdentitySource::parse(s)
    }
}

/// Access-control mechanism attached to a front door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthorizerBinding {
    /// Tokens issued by an identity provider, read from `identity_source`.
    Cognito {
        provider: ProviderId,
        identity_source: IdentitySource,
    },
    /// Every route requires an API key.
    ApiKey,
}

impl AuthorizerBinding {
    /// Access mode this binding satisfies.
    pub fn mode(&self) -> AuthMode {
        match self {
            AuthorizerBinding::Cognito { .. } => AuthMode::Cognito,
            AuthorizerBinding::ApiKey => AuthMode::ApiKey,
        }
    }

    /// Authorization stamped onto every route of the bound front door.
    pub fn route_authorization(&self) -> RouteAuthorization {
        match self {
            AuthorizerBinding::Cognito { provider, .. } => RouteAuthorization::Cognito {
                provider: provider.clone(),
            },
            AuthorizerBinding::ApiKey => RouteAuthorization::ApiKeyRequired,
        }
    }
}

/// Result of attaching a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The binding was newly attached.
    Attached,
    /// An identical binding was already present.
    Unchanged,
}
