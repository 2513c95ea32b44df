use meshlink_core::IceServerConfig;

/// Settings for the WebRTC media backend.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Negotiate a video transceiver next to the audio one.
    pub video: bool,
}

impl TransportConfig {
    /// Replaces the ICE servers, e.g. with the ones the relay announced.
    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        if !ice_servers.is_empty() {
            self.ice_servers = ice_servers;
        }
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun("stun:stun.l.google.com:19302")],
            video: false,
        }
    }
}
