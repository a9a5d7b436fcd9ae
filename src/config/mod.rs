pub mod environment;
pub mod polling;

pub use environment::{Config, ConfigError};
pub use polling::load_poll_policies;
