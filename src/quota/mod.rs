//! Usage plans and API keys enforced against deployed stages.

use crate::error::{Error, Result};
use crate::front_door::StageRef;
use crate::lifecycle::PolicySetting;
use crate::resource::{KeyId, PlanId, Resource, ResourceRef};
use serde::{Deserialize, Serialize};

/// Steady-state request rate and burst capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Throttle {
    /// Requests per second.
    pub rate_limit: f64,
    /// Maximum burst size.
    pub burst_limit: u32,
}

/// Window over which a quota is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotaPeriod {
    Day,
    Week,
    Month,
}

/// Total requests allowed per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub limit: u64,
    pub period: QuotaPeriod,
}

/// Caller credential issued by a usage plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Unique identifier within the stack.
    pub id: KeyId,
    /// Whether the key is accepted.
    pub enabled: bool,
    #[serde(default)]
    policy: PolicySetting,
}

impl ApiKey {
    /// Create an enabled key.
    pub fn new(id: impl Into<KeyId>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            policy: PolicySetting::Inherited,
        }
    }
}

impl Resource for ApiKey {
    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::ApiKey(self.id.clone())
    }

    fn policy(&self) -> PolicySetting {
        self.policy
    }

    fn set_policy(&mut self, policy: PolicySetting) {
        self.policy = policy;
    }
}

/// Quota/key grouping enforced against deployed stages.
///
/// A plan with no keys and no stages is valid but has no effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePlan {
    /// Unique identifier within the stack.
    pub id: PlanId,
    /// Rate limiting, if any.
    pub throttle: Option<Throttle>,
    /// Request quota, if any.
    pub quota: Option<Quota>,
    bound_keys: Vec<KeyId>,
    bound_stages: Vec<StageRef>,
    #[serde(default)]
    policy: PolicySetting,
}

impl UsagePlan {
    /// Create an empty plan.
    pub fn new(id: impl Into<PlanId>) -> Self {
        Self {
            id: id.into(),
            throttle: None,
            quota: None,
            bound_keys: Vec::new(),
            bound_stages: Vec::new(),
            policy: PolicySetting::Inherited,
        }
    }

    /// Set the throttle.
    pub fn with_throttle(mut self, rate_limit: f64, burst_limit: u32) -> Self {
        self.throttle = Some(Throttle {
            rate_limit,
            burst_limit,
        });
        self
    }

    /// Set the quota.
    pub fn with_quota(mut self, limit: u64, period: QuotaPeriod) -> Self {
        self.quota = Some(Quota { limit, period });
        self
    }

    /// Keys bound to this plan.
    pub fn bound_keys(&self) -> &[KeyId] {
        &self.bound_keys
    }

    /// Stages this plan applies to.
    pub fn bound_stages(&self) -> &[StageRef] {
        &self.bound_stages
    }

    /// Whether the plan affects any caller.
    pub fn is_inert(&self) -> bool {
        self.bound_keys.is_empty() || self.bound_stages.is_empty()
    }

    /// Check throttle and quota limits.
    pub fn validate(&self) -> Result<()> {
        let reject = |reason: &str| Error::InvalidUsagePlan {
            plan: self.id.to_string(),
            reason: reason.to_string(),
        };

        if let Some(throttle) = &self.throttle {
            if !(throttle.rate_limit.is_finite() && throttle.rate_limit > 0.0) {
                return Err(reject("throttle rate limit must be positive"));
            }
            if throttle.burst_limit == 0 {
                return Err(reject("throttle burst limit must be positive"));
            }
        }

        if let Some(quota) = &self.quota {
            if quota.limit == 0 {
                return Err(reject("quota limit must be positive"));
            }
        }

        Ok(())
    }

    /// Add a key. Returns `false` if it was already bound.
    pub(crate) fn add_key(&mut self, key: KeyId) -> bool {
        if self.bound_keys.contains(&key) {
            return false;
        }
        self.bound_keys.push(key);
        true
    }

    /// Add a stage. Returns `false` if it was already bound.
    pub(crate) fn add_stage(&mut self, stage: StageRef) -> bool {
        if self.bound_stages.contains(&stage) {
            return false;
        }
        self.bound_stages.push(stage);
        true
    }
}

impl Resource for UsagePlan {
    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::UsagePlan(self.id.clone())
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

    #[test]
    fn test_empty_plan_is_valid_but_inert() {
        let plan = UsagePlan::new("LicensePlan");
        assert!(plan.validate().is_ok());
        assert!(plan.is_inert());
    }

    #[test]
    fn test_plan_limits() {
        let plan = UsagePlan::new("p").with_throttle(100.0, 200).with_quota(10_000, QuotaPeriod::Month);
        assert!(plan.validate().is_ok());

        let plan = UsagePlan::new("p").with_throttle(0.0, 10);
        assert!(matches!(plan.validate(), Err(Error::InvalidUsagePlan { .. })));

        let plan = UsagePlan::new("p").with_throttle(10.0, 0);
        assert!(plan.validate().is_err());

        let plan = UsagePlan::new("p").with_quota(0, QuotaPeriod::Day);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_bindings_are_idempotent() {
        let mut plan = UsagePlan::new("p");
        assert!(plan.add_key(KeyId::new("k")));
        assert!(!plan.add_key(KeyId::new("k")));
        assert!(plan.add_stage(StageRef::new("api", "prod")));
        assert!(!plan.add_stage(StageRef::new("api", "prod")));
        assert_eq!(plan.bound_keys().len(), 1);
        assert_eq!(plan.bound_stages().len(), 1);
        assert!(!plan.is_inert());
    }
}
