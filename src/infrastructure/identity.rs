//! Identity extraction adapters.

use crate::application::ports::IdentityExtractor;
use crate::domain::client_id::ClientId;
use std::net::SocketAddr;

/// Identity derived by hashing the caller's address string.
///
/// By default the whole string is hashed. With [`AddressHash::ip_only`], a
/// `ip:port` socket address is reduced to its IP first, so a client that
/// reconnects from a new ephemeral port keeps the same counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressHash {
    ip_only: bool,
}

impl AddressHash {
    /// Hash the address string as given.
    pub fn new() -> Self {
        Self { ip_only: false }
    }

    /// Strip the port from socket addresses before hashing.
    pub fn ip_only() -> Self {
        Self { ip_only: true }
    }
}

impl IdentityExtractor for AddressHash {
    fn identify(&self, address: &str) -> ClientId {
        if self.ip_only {
            if let Ok(socket) = address.parse::<SocketAddr>() {
                return ClientId::from_address(&socket.ip().to_string());
            }
        }
        ClientId::from_address(address)
    }
}
