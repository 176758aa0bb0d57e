//! Hosted authentication domain and branding.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const RESERVED_WORDS: [&str; 3] = ["aws", "amazon", "cognito"];

/// Hosted sign-in domain assigned to an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedDomain {
    /// Domain prefix; may contain `{account}`-style placeholders until bound.
    pub prefix: String,
    /// 1 = classic hosted UI, 2 = managed login with branding.
    pub managed_login_version: u8,
}

impl HostedDomain {
    /// Create a managed-login domain.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            managed_login_version: 2,
        }
    }

    /// Use the classic hosted UI.
    pub fn classic(mut self) -> Self {
        self.managed_login_version = 1;
        self
    }

    /// Public URL of the hosted domain in a region.
    pub fn url(&self, region: &str) -> String {
        format!("https://{}.auth.{}.amazoncognito.com", self.prefix, region)
    }

    /// Whether the domain supports branding.
    pub fn supports_branding(&self) -> bool {
        self.managed_login_version >= 2
    }

    /// Check the prefix and version.
    pub fn validate(&self) -> Result<()> {
        let reject = |reason: &str| Error::InvalidDomain {
            domain: self.prefix.clone(),
            reason: reason.to_string(),
        };

        if !matches!(self.managed_login_version, 1 | 2) {
            return Err(reject("managed login version must be 1 or 2"));
        }

        let prefix = self.prefix.as_str();
        if prefix.is_empty() || prefix.len() > 63 {
            return Err(reject("prefix must be 1 to 63 characters"));
        }

        if !prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(reject(
                "prefix may only contain lowercase letters, digits and hyphens",
            ));
        }

        if prefix.starts_with('-') || prefix.ends_with('-') {
            return Err(reject("prefix cannot start or end with a hyphen"));
        }

        if let Some(word) = RESERVED_WORDS.iter().find(|w| prefix.contains(*w)) {
            return Err(reject(&format!("prefix contains reserved word '{}'", word)));
        }

        Ok(())
    }
}

/// Branding for the hosted sign-in pages.
///
/// Settings and assets are passed through to the provider unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branding {
    /// Apply the provider's default style instead of `settings`.
    pub use_provider_defaults: bool,
    /// Opaque style document.
    pub settings: serde_json::Value,
    /// Opaque asset list (logos, backgrounds).
    pub assets: Vec<serde_json::Value>,
}

impl Branding {
    /// Branding from a style document.
    pub fn from_settings(settings: serde_json::Value) -> Self {
        Self {
            use_provider_defaults: false,
            settings,
            assets: Vec::new(),
        }
    }

    /// Provider-default branding.
    pub fn provider_defaults() -> Self {
        Self {
            use_provider_defaults: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_url() {
        let domain = HostedDomain::new("demo-123456789012");
        assert!(domain.validate().is_ok());
        assert_eq!(
            domain.url("eu-west-1"),
            "https://demo-123456789012.auth.eu-west-1.amazoncognito.com"
        );
    }

    #[test]
    fn test_domain_prefix_rules() {
        assert!(HostedDomain::new("").validate().is_err());
        assert!(HostedDomain::new("Upper").validate().is_err());
        assert!(HostedDomain::new("-leading").validate().is_err());
        assert!(HostedDomain::new("trailing-").validate().is_err());
        assert!(HostedDomain::new("my-aws-login").validate().is_err());
        assert!(HostedDomain::new("demo-{account}").validate().is_err());
        assert!(HostedDomain::new(&"a".repeat(64)).validate().is_err());
    }

    #[test]
    fn test_classic_domain_has_no_branding() {
        let domain = HostedDomain::new("demo").classic();
        assert!(domain.validate().is_ok());
        assert!(!domain.supports_branding());
    }

    #[test]
    fn test_branding_passthrough() {
        let settings = serde_json::json!({ "global": { "colorSchemeMode": "DARK" } });
        let branding = Branding::from_settings(settings.clone());
        let json = serde_json::to_value(&branding).unwrap();
        assert_eq!(json["settings"], settings);
    }
}
