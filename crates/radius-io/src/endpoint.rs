use std::net::SocketAddr;

/// A RADIUS peer: socket address plus the shared secret for it.
///
/// The secret never travels on the wire; it keys every authenticator and
/// password codec for traffic with this peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: SocketAddr,
    pub secret: String,
}

impl Endpoint {
    pub fn new(address: SocketAddr, secret: impl Into<String>) -> Self {
        Endpoint {
            address,
            secret: secret.into(),
        }
    }

    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let endpoint = Endpoint::new("127.0.0.1:1812".parse().unwrap(), "testing123");
        assert_eq!(endpoint.secret_bytes(), b"testing123");
        assert_eq!(endpoint.address.port(), 1812);
    }
}
