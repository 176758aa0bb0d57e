//! Route table of a front door.
//!
//! A front door in this system carries a single catch-all proxy route, but
//! the table keeps the general shape so route authorization can be updated
//! uniformly when an authorizer is attached.

use crate::resource::{HandlerId, ProviderId};
use serde::{Deserialize, Serialize};

/// Path of the catch-all proxy route.
pub const PROXY_PATH: &str = "/{proxy+}";

/// HTTP method a route accepts. Front doors only declare the catch-all `ANY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteMethod {
    #[default]
    Any,
}

impl RouteMethod {
    /// Check if this method matches the given method string.
    pub fn matches(&self, _method: &str) -> bool {
        match self {
            RouteMethod::Any => true,
        }
    }
}

/// Access control applied to a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteAuthorization {
    /// Open route.
    #[default]
    None,
    /// Caller must present a token issued by the identity provider.
    Cognito { provider: ProviderId },
    /// Caller must present an API key.
    ApiKeyRequired,
}

/// A route that forwards matching requests to a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Route path pattern, "/{proxy+}" for the catch-all route.
    pub path: String,
    /// HTTP method for this route.
    pub method: RouteMethod,
    /// Target handler.
    pub handler: HandlerId,
    /// Access control for this route.
    pub authorization: RouteAuthorization,
}

impl Route {
    /// Create the catch-all proxy route.
    pub fn catch_all(handler: HandlerId) -> Self {
        Self {
            path: PROXY_PATH.to_string(),
            method: RouteMethod::Any,
            handler,
            authorization: RouteAuthorization::None,
        }
    }

    /// Check if this route matches the given path and method.
    pub fn matches(&self, path: &str, method: &str) -> bool {
        if !self.method.matches(method) {
            return false;
        }

        // Greedy proxy segment swallows the rest of the path, including none.
        match self.path.strip_suffix(PROXY_PATH) {
            Some(prefix) => path == prefix || path.starts_with(&format!("{}/", prefix)),
            None => self.path == path,
        }
    }
}

/// Route table of a front door.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Create a table holding only the catch-all route to `handler`.
    pub fn proxy(handler: HandlerId) -> Self {
        Self {
            routes: vec![Route::catch_all(handler)],
        }
    }

    /// Find a matching route for the given path and method.
    pub fn find(&self, path: &str, method: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path, method))
    }

    /// List all routes.
    pub fn list(&self) -> &[Route] {
        &self.routes
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Apply the same authorization to every route.
    pub fn authorize_all(&mut self, authorization: &RouteAuthorization) {
        for route in &mut self.routes {
            route.authorization = authorization.clone();
        }
    }
}
