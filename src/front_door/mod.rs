//! Front doors, their route table and authorizer bindings.

mod binding;
mod door;
mod routing;

pub use binding::{AuthMode, AuthorizerBinding, BindOutcome, IdentitySource};
pub use door::{Bindable, Cacheable, EndpointVisibility, FrontDoor, Quotable, Stage, StageRef};
pub use routing::{Route, RouteAuthorization, RouteMethod, RouteTable, PROXY_PATH};
