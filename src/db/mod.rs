mod backend;
mod embedded;
mod network;
mod options;
mod platform;

pub use backend::*;
pub use embedded::*;
pub use network::*;
pub use options::*;
pub use platform::*;

use crate::error::Result;

/// Connection parameters for exactly one backend variant.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Network(NetworkConfig),
    Embedded(EmbeddedConfig),
}

impl BackendConfig {
    pub fn platform(&self) -> Platform {
        match self {
            BackendConfig::Network(_) => Platform::Network,
            BackendConfig::Embedded(_) => Platform::Embedded,
        }
    }

    pub fn database(&self) -> &str {
        match self {
            BackendConfig::Network(c) => &c.database,
            BackendConfig::Embedded(c) => &c.database,
        }
    }
}

/// Establish the run's single backend connection. There is no retry.
pub async fn connect(config: BackendConfig) -> Result<Box<dyn SqlBackend>> {
    match config {
        BackendConfig::Network(c) => Ok(Box::new(NetworkBackend::connect(c).await?)),
        BackendConfig::Embedded(c) => Ok(Box::new(EmbeddedBackend::connect(c).await?)),
    }
}
