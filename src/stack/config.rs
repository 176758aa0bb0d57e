//! Stack configuration.
//!
//! Environment-derived qualifiers (account, region, free-form keys) are
//! passed in explicitly and validated when a graph is created; resource
//! names reference them through `{placeholder}` templates.

use crate::error::{Error, Result};
use crate::lifecycle::LifecyclePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Environment variable read for the account qualifier.
pub const ACCOUNT_VAR: &str = "APISTACK_ACCOUNT";
/// Environment variable read for the region qualifier.
pub const REGION_VAR: &str = "APISTACK_REGION";
/// Environment variable read for the default stage name.
pub const STAGE_VAR: &str = "APISTACK_STAGE";

/// Configuration for building a stack graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Account qualifier substituted for `{account}`.
    pub account: Option<String>,
    /// Region qualifier substituted for `{region}`.
    pub region: Option<String>,
    /// Additional placeholder values.
    pub env: HashMap<String, String>,
    /// Stage name used by `deploy`.
    pub default_stage: String,
    /// Policy for resources with no parent and no override.
    pub default_policy: LifecyclePolicy,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            account: None,
            region: None,
            env: HashMap::new(),
            default_stage: "prod".to_string(),
            default_policy: LifecyclePolicy::Destroy,
        }
    }
}

impl StackConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read qualifiers from the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.account = std::env::var(ACCOUNT_VAR).ok().filter(|v| !v.is_empty());
        config.region = std::env::var(REGION_VAR).ok().filter(|v| !v.is_empty());
        if let Ok(stage) = std::env::var(STAGE_VAR) {
            if !stage.is_empty() {
                config.default_stage = stage;
            }
        }
        config
    }

    /// Set the account.
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Set the region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Add a placeholder value.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the default stage name.
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.default_stage = stage.into();
        self
    }

    /// Set the default lifecycle policy.
    pub fn default_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Check that every required key is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.account.as_deref().map_or(true, str::is_empty) {
            missing.push("account".to_string());
        }
        if self.region.as_deref().map_or(true, str::is_empty) {
            missing.push("region".to_string());
        }
        if self.default_stage.is_empty() {
            missing.push("stage".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingEnvironment { keys: missing })
        }
    }

    /// Region qualifier, or an empty string before validation.
    pub fn region_name(&self) -> &str {
        self.region.as_deref().unwrap_or_default()
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "account" => self.account.as_deref(),
            "region" => self.region.as_deref(),
            "stage" => Some(self.default_stage.as_str()),
            _ => self.env.get(key).map(String::as_str),
        }
    }

    /// Replace every `{key}` placeholder in `template`.
    ///
    /// All unknown keys are reported together.
    pub fn substitute(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut missing = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                missing.push(after.to_string());
                rest = "";
                break;
            };

            let key = &after[..end];
            match self.lookup(key) {
                Some(value) if !value.is_empty() => out.push_str(value),
                _ => missing.push(key.to_string()),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);

        if missing.is_empty() {
            Ok(out)
        } else {
            Err(Error::MissingEnvironment { keys: missing })
        }
    }
}
