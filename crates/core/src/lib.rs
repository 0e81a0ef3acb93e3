pub mod config;
pub mod telemetry;

pub use config::{load_dotenv, EngineConfig, PolicyDefaults};
pub use telemetry::init_tracing;
