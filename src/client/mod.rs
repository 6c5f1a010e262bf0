//! High-level client API

mod connector;
mod endpoint;

pub use connector::{
    connect, Connector, ConnectorConfig, ConnectorConfigBuilder, DEFAULT_EXPECTED_REPLY,
    DEFAULT_PAYLOAD, DEFAULT_TIMEOUT, DEFAULT_VERDICT_WINDOW,
};
pub use endpoint::Endpoint;
