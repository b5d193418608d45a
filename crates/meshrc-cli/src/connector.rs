//! Device connector shipped with the binary
//!
//! The mesh protocol driver is not linked into this build, so every link
//! reports itself as unavailable and the caller falls back to
//! [`OfflineGateway`].

use async_trait::async_trait;
use tracing::warn;

use meshrc_core::gateway::GatewayResult;
use meshrc_core::{GatewayConnector, GatewayError, OfflineGateway, TransportConfig};

#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceConnector;

impl DeviceConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GatewayConnector for DeviceConnector {
    type Gateway = OfflineGateway;

    async fn connect(&self, config: &TransportConfig) -> GatewayResult<Self::Gateway> {
        warn!("No {} driver available for {}", config.kind(), config);
        Err(GatewayError::Unavailable {
            transport: config.to_string(),
            reason: "no device driver in this build".to_string(),
        })
    }
}
