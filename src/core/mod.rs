pub mod config;
pub mod types;

pub use config::{load_pool_config, PoolConfig};
pub use types::*;
