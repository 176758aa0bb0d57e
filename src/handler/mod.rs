//! Handler references: deployable compute units consumed by front doors and
//! identity-provider trigger hooks.

mod reference;

pub use reference::{
    ArtifactLocation, HandlerConsumer, HandlerReference, DEFAULT_TIMEOUT, MAX_TIMEOUT,
};
