//! Configuration: property sources, the override layer and server settings.
pub mod effective;
pub mod loader;
pub mod models;
pub mod source;
pub mod validation;

pub use effective::EffectiveConfig;
pub use loader::{ConfigResolver, DEFAULT_PROPERTY_FILE, load_properties};
pub use models::*;
pub use source::{Overrides, PropertySource};
pub use validation::{ServerConfigValidator, ServletMapping, ValidationError, ValidationResult};
