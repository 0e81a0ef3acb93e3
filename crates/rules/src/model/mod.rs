//! Model definitions: property builders, model settings and the registry.

mod builder;
mod registry;
mod settings;

pub use builder::PropertyBuilder;
pub use registry::ModelSettingsRegistry;
pub use settings::ModelSettings;
