//! Domain and wire models for the Outpost API.

pub mod environment;
pub mod identity;
pub mod template;

pub use environment::{Environment, EnvironmentStatus};
pub use identity::Identity;
pub use template::Template;
