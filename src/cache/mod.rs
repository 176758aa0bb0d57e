//! Edge cache wrapping a deployed front door stage.
//!
//! The cache key covers every viewer attribute except the `Host` header. That
//! keeps query strings, cookies and auth headers in the key while Host-header
//! variance cannot poison entries. Per-caller partitioning is NOT enforced
//! here: a shared cache in front of an authorized origin is an operator
//! decision.

use crate::error::{Error, Result};
use crate::front_door::{FrontDoor, Stage};
use crate::lifecycle::PolicySetting;
use crate::resource::{CacheId, FrontDoorId, Resource, ResourceRef};
use serde::{Deserialize, Serialize};

/// Response compression the cache negotiates with viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    Brotli,
}

/// Which viewer attributes are forwarded to the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForwardingPolicy {
    /// Headers, cookies and query strings, minus `Host`.
    #[default]
    AllViewerExceptHostHeader,
}

/// TTL bounds and compression for cached responses, in seconds.
///
/// Fields are public for inspection; `EdgeCache::wrap` re-checks the bounds
/// and deserialization rejects a policy that violates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCachePolicy")]
pub struct CachePolicy {
    pub min_ttl: u64,
    pub default_ttl: u64,
    pub max_ttl: u64,
    pub compression: Vec<Compression>,
}

#[derive(Deserialize)]
struct RawCachePolicy {
    min_ttl: u64,
    default_ttl: u64,
    max_ttl: u64,
    #[serde(default)]
    compression: Vec<Compression>,
}

impl TryFrom<RawCachePolicy> for CachePolicy {
    type Error = Error;

    fn try_from(raw: RawCachePolicy) -> Result<Self> {
        let mut policy = Self::with_min(raw.min_ttl, raw.default_ttl, raw.max_ttl)?;
        for mode in raw.compression {
            policy = policy.compress(mode);
        }
        Ok(policy)
    }
}

impl CachePolicy {
    /// Create a policy; fails unless `0 <= default_ttl <= max_ttl`.
    pub fn new(default_ttl: u64, max_ttl: u64) -> Result<Self> {
        Self::with_min(0, default_ttl, max_ttl)
    }

    /// Create a policy with a minimum TTL; fails unless `min <= default <= max`.
    pub fn with_min(min_ttl: u64, default_ttl: u64, max_ttl: u64) -> Result<Self> {
        let policy = Self {
            min_ttl,
            default_ttl,
            max_ttl,
            compression: Vec::new(),
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check `min_ttl <= default_ttl <= max_ttl`.
    pub fn validate(&self) -> Result<()> {
        if self.min_ttl > self.default_ttl || self.default_ttl > self.max_ttl {
            return Err(Error::InvalidTtl {
                min: self.min_ttl,
                default: self.default_ttl,
                max: self.max_ttl,
            });
        }
        Ok(())
    }

    /// Enable a compression mode.
    pub fn compress(mut self, mode: Compression) -> Self {
        if !self.compression.contains(&mode) {
            self.compression.push(mode);
            self.compression.sort();
        }
        self
    }
}

/// Custom page served for an origin error status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawErrorResponse")]
pub struct ErrorResponse {
    /// Origin status that triggers this page.
    pub status: u16,
    /// Status returned to the viewer.
    pub response_status: u16,
    /// Path of the page served instead.
    pub page_path: String,
    /// How long the error page is cached, in seconds.
    pub ttl: u64,
}

impl ErrorResponse {
    /// Serve `page_path` with the same status.
    pub fn new(status: u16, page_path: impl Into<String>, ttl: u64) -> Result<Self> {
        let response = Self {
            status,
            response_status: status,
            page_path: page_path.into(),
            ttl,
        };
        response.validate()?;
        Ok(response)
    }

    /// Check the statuses and page path.
    pub fn validate(&self) -> Result<()> {
        let is_error = |s: u16| (400..600).contains(&s);
        if !is_error(self.status) {
            return Err(Error::InvalidErrorResponse(format!(
                "status {} is not an error status",
                self.status
            )));
        }
        if !(200..600).contains(&self.response_status) {
            return Err(Error::InvalidErrorResponse(format!(
                "response status {} is out of range",
                self.response_status
            )));
        }
        if !self.page_path.starts_with('/') {
            return Err(Error::InvalidErrorResponse(format!(
                "page path '{}' must start with '/'",
                self.page_path
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawErrorResponse {
    status: u16,
    response_status: u16,
    page_path: String,
    ttl: u64,
}

impl TryFrom<RawErrorResponse> for ErrorResponse {
    type Error = Error;

    fn try_from(raw: RawErrorResponse) -> Result<Self> {
        let response = Self {
            status: raw.status,
            response_status: raw.response_status,
            page_path: raw.page_path,
            ttl: raw.ttl,
        };
        response.validate()?;
        Ok(response)
    }
}

/// Edge cache in front of a deployed front door stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeCache {
    /// Unique identifier within the stack.
    pub id: CacheId,
    /// Origin front door.
    pub origin: FrontDoorId,
    /// Stage the cache forwards to.
    pub origin_stage: Stage,
    /// TTL and compression policy.
    pub policy: CachePolicy,
    /// Viewer attributes forwarded to the origin.
    pub forwarding: ForwardingPolicy,
    /// Custom error pages.
    pub error_responses: Vec<ErrorResponse>,
    #[serde(default)]
    lifecycle: PolicySetting,
}

impl EdgeCache {
    /// Wrap the deployed stage of `origin`.
    pub fn wrap(id: impl Into<CacheId>, origin: &FrontDoor, policy: CachePolicy) -> Result<Self> {
        policy.validate()?;
        let stage = origin.stage().ok_or_else(|| Error::OriginNotReady {
            front_door: origin.id.to_string(),
        })?;

        Ok(Self {
            id: id.into(),
            origin: origin.id.clone(),
            origin_stage: stage.clone(),
            policy,
            forwarding: ForwardingPolicy::AllViewerExceptHostHeader,
            error_responses: Vec::new(),
            lifecycle: PolicySetting::Inherited,
        })
    }

    /// Add a custom error page, replacing any page for the same status.
    pub fn with_error_response(mut self, response: ErrorResponse) -> Result<Self> {
        self.add_error_response(response)?;
        Ok(self)
    }

    /// In-place form of `with_error_response`. The cache is unchanged on error.
    pub fn add_error_response(&mut self, response: ErrorResponse) -> Result<()> {
        response.validate()?;
        self.error_responses.retain(|r| r.status != response.status);
        self.error_responses.push(response);
        Ok(())
    }
}

impl Resource for EdgeCache {
    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::EdgeCache(self.id.clone())
    }

    fn policy(&self) -> PolicySetting {
        self.lifecycle
    }

    fn set_policy(&mut self, policy: PolicySetting) {
        self.lifecycle = policy;
    }
}
