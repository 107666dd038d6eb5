pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, QueueBacking, QueueConfig};
pub use error::*;
