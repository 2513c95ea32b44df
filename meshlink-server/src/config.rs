use meshlink_core::IceServerConfig;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Handed to every participant in `welcome`.
    pub ice_servers: Vec<IceServerConfig>,
    /// Joining a room first leaves whichever room the session is already in.
    pub single_room_per_session: bool,
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ice_servers: vec![IceServerConfig::stun("stun:stun.l.google.com:19302")],
            single_room_per_session: true,
        }
    }
}
