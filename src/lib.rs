pub mod config;
pub mod error;
pub mod google;
pub mod logger;
pub mod models;
pub mod routing;

#[cfg(feature = "server")]
pub mod server;

pub use config::{Config, GoogleConfig, PollConfig};
pub use error::{
    ConfigError, OperationError, Result, StudioError, UpstreamError, ValidationError,
};
pub use google::{StudioClient, VendorTransport};
pub use models::*;
pub use routing::{RoutingTable, VendorCallSpec};
