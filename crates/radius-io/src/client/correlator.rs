//! Request/response correlation over a single UDP socket.
//!
//! RADIUS matches responses to requests with a single identifier octet,
//! which is inherently ambiguous under load. Two interchangeable
//! strategies implement the [`Correlator`] contract:
//!
//! * [`IdCorrelator`] keys pending requests by `(remote address,
//!   identifier)`, assigning identifiers from a process-wide counter
//!   modulo 256. At most 256 requests can be outstanding per peer; a
//!   colliding send is rejected and the prior request preserved.
//! * [`ProxyStateCorrelator`] appends a Proxy-State attribute carrying a
//!   process-wide sequence number and keys on that, removing the 256-id
//!   bottleneck. Proxy chains must use this strategy.
//!
//! Both verify the response authenticator against the recorded request
//! authenticator and confirm the sender address before completing a slot.

use crate::endpoint::Endpoint;
use crate::error::RadiusIoError;
use dashmap::DashMap;
use radius_core::attr::types;
use radius_core::{Dictionary, PlainAttribute, RadiusRequest, RadiusResponse, NO_VENDOR};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Process-wide packet identifier counter; wraps modulo 256.
static NEXT_IDENTIFIER: AtomicU32 = AtomicU32::new(0);

/// Process-wide Proxy-State sequence; wraparound after 2^32 sends is safe
/// because outstanding requests are far fewer.
static NEXT_PROXY_STATE: AtomicU32 = AtomicU32::new(1);

fn next_identifier() -> u8 {
    (NEXT_IDENTIFIER.fetch_add(1, Ordering::Relaxed) % 256) as u8
}

fn next_proxy_state() -> String {
    NEXT_PROXY_STATE.fetch_add(1, Ordering::Relaxed).to_string()
}

/// Key under which a pending request is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    IdAddr { remote: SocketAddr, identifier: u8 },
    ProxyState(String),
}

/// An encoded request registered with a correlator, ready to send.
pub struct PreparedRequest {
    pub datagram: Vec<u8>,
    pub destination: SocketAddr,
    pub key: CorrelationKey,
    pub slot: oneshot::Receiver<RadiusResponse>,
}

struct PendingRequest {
    endpoint: Endpoint,
    identifier: u8,
    request_auth: [u8; 16],
    slot: oneshot::Sender<RadiusResponse>,
}

/// Correlation contract shared by both strategies.
pub trait Correlator: Send + Sync {
    /// Encode the outbound request, register the pending association and
    /// hand back the wire datagram plus the completion slot.
    fn prepare(
        &self,
        request: RadiusRequest,
        endpoint: &Endpoint,
    ) -> Result<PreparedRequest, RadiusIoError>;

    /// Route an inbound datagram to its pending request, verifying the
    /// response authenticator and sender address first.
    fn dispatch(&self, data: &[u8], sender: SocketAddr) -> Result<(), RadiusIoError>;

    /// Remove a pending entry; used on timeout and caller cancellation.
    /// Evicting an already-completed key is a no-op.
    fn evict(&self, key: &CorrelationKey);

    /// Outstanding request count, for bounds monitoring.
    fn pending(&self) -> usize;
}

/// Strategy A: identifier + remote address.
pub struct IdCorrelator {
    dict: Arc<Dictionary>,
    table: DashMap<(SocketAddr, u8), PendingRequest>,
}

impl IdCorrelator {
    pub fn new(dict: Arc<Dictionary>) -> Self {
        IdCorrelator {
            dict,
            table: DashMap::new(),
        }
    }
}

impl Correlator for IdCorrelator {
    fn prepare(
        &self,
        request: RadiusRequest,
        endpoint: &Endpoint,
    ) -> Result<PreparedRequest, RadiusIoError> {
        let identifier = next_identifier();
        let remote = endpoint.address;

        if self.table.contains_key(&(remote, identifier)) {
            // collision policy: reject the new send, preserve the prior
            // outstanding request
            return Err(RadiusIoError::IdentifierCollision { remote, identifier });
        }

        let encoded = request
            .map_packet(|p| p.with_identifier(identifier))
            .encode_request(endpoint.secret_bytes())?;
        let request_auth = encoded
            .authenticator()
            .expect("encoded request always carries an authenticator");
        let datagram = encoded.packet().encode()?;

        let (tx, rx) = oneshot::channel();
        self.table.insert(
            (remote, identifier),
            PendingRequest {
                endpoint: endpoint.clone(),
                identifier,
                request_auth,
                slot: tx,
            },
        );

        debug!(remote = %remote, identifier, "registered pending request");
        Ok(PreparedRequest {
            datagram,
            destination: remote,
            key: CorrelationKey::IdAddr { remote, identifier },
            slot: rx,
        })
    }

    fn dispatch(&self, data: &[u8], sender: SocketAddr) -> Result<(), RadiusIoError> {
        let response = RadiusResponse::parse(Arc::clone(&self.dict), data)?;
        let key = (sender, response.identifier());

        let verified = {
            let entry = self.table.get(&key).ok_or(RadiusIoError::CorrelationMiss)?;
            if sender != entry.endpoint.address {
                info!(sender = %sender, expected = %entry.endpoint.address, "response sender mismatch, dropping");
                return Err(RadiusIoError::CorrelationMiss);
            }
            response.verify_response(entry.endpoint.secret_bytes(), &entry.request_auth)?
        };

        if let Some((_, entry)) = self.table.remove(&key) {
            // a dropped receiver means the caller lost interest; nothing to do
            let _ = entry.slot.send(verified);
        }
        Ok(())
    }

    fn evict(&self, key: &CorrelationKey) {
        if let CorrelationKey::IdAddr { remote, identifier } = key {
            self.table.remove(&(*remote, *identifier));
        }
    }

    fn pending(&self) -> usize {
        self.table.len()
    }
}

/// Strategy B: Proxy-State attribute.
pub struct ProxyStateCorrelator {
    dict: Arc<Dictionary>,
    table: DashMap<String, PendingRequest>,
}

impl ProxyStateCorrelator {
    pub fn new(dict: Arc<Dictionary>) -> Self {
        ProxyStateCorrelator {
            dict,
            table: DashMap::new(),
        }
    }
}

impl Correlator for ProxyStateCorrelator {
    fn prepare(
        &self,
        request: RadiusRequest,
        endpoint: &Endpoint,
    ) -> Result<PreparedRequest, RadiusIoError> {
        let sequence = next_proxy_state();
        let state_attr = PlainAttribute::new(
            NO_VENDOR,
            types::PROXY_STATE,
            None,
            sequence.clone().into_bytes(),
        );

        let encoded = request
            .map_packet(|p| p.with_attribute(state_attr))
            .encode_request(endpoint.secret_bytes())?;
        let identifier = encoded.identifier();
        let request_auth = encoded
            .authenticator()
            .expect("encoded request always carries an authenticator");
        let datagram = encoded.packet().encode()?;

        let (tx, rx) = oneshot::channel();
        self.table.insert(
            sequence.clone(),
            PendingRequest {
                endpoint: endpoint.clone(),
                identifier,
                request_auth,
                slot: tx,
            },
        );

        debug!(remote = %endpoint.address, sequence = %sequence, identifier, "registered pending request");
        Ok(PreparedRequest {
            datagram,
            destination: endpoint.address,
            key: CorrelationKey::ProxyState(sequence),
            slot: rx,
        })
    }

    fn dispatch(&self, data: &[u8], sender: SocketAddr) -> Result<(), RadiusIoError> {
        let response = RadiusResponse::parse(Arc::clone(&self.dict), data)?;

        // our Proxy-State is the last one; earlier ones belong to upstream
        // hops and are preserved
        let sequence = response
            .packet()
            .attributes_of(types::PROXY_STATE)
            .last()
            .and_then(|a| a.as_plain())
            .and_then(|plain| String::from_utf8(plain.value().to_vec()).ok())
            .ok_or_else(|| {
                info!(sender = %sender, "response carries no usable Proxy-State, dropping");
                RadiusIoError::CorrelationMiss
            })?;

        let verified = {
            let entry = self
                .table
                .get(&sequence)
                .ok_or(RadiusIoError::CorrelationMiss)?;
            if response.identifier() != entry.identifier {
                warn!(
                    got = response.identifier(),
                    expected = entry.identifier,
                    "response identifier mismatch, dropping"
                );
                return Err(RadiusIoError::CorrelationMiss);
            }
            if sender != entry.endpoint.address {
                info!(sender = %sender, expected = %entry.endpoint.address, "response sender mismatch, dropping");
                return Err(RadiusIoError::CorrelationMiss);
            }
            response.verify_response(entry.endpoint.secret_bytes(), &entry.request_auth)?
        };

        // strip exactly the Proxy-State we appended before handing upward
        let verified = verified.map_packet(|p| p.remove_last_attribute(types::PROXY_STATE));

        if let Some((_, entry)) = self.table.remove(&sequence) {
            let _ = entry.slot.send(verified);
        }
        Ok(())
    }

    fn evict(&self, key: &CorrelationKey) {
        if let CorrelationKey::ProxyState(sequence) = key {
            self.table.remove(sequence);
        }
    }

    fn pending(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{AccessRequest, Code, RadiusResponse};

    fn dict() -> Arc<Dictionary> {
        Arc::clone(Dictionary::standard())
    }

    fn endpoint() -> Endpoint {
        Endpoint::new("127.0.0.1:1812".parse().unwrap(), "testing123")
    }

    fn request() -> RadiusRequest {
        RadiusRequest::from_packet(
            AccessRequest::new(dict(), 0)
                .with_user_name("test")
                .with_pap_password("password")
                .into_packet(),
        )
    }

    fn respond_to(prepared: &PreparedRequest, secret: &[u8]) -> Vec<u8> {
        let parsed = radius_core::Packet::parse(dict(), &prepared.datagram).unwrap();
        let request_auth = parsed.authenticator().unwrap();

        let mut response = RadiusResponse::new(dict(), Code::AccessAccept, parsed.identifier());
        for proxy_state in parsed.attributes_of(types::PROXY_STATE) {
            response = response.with_attribute((*proxy_state).clone());
        }
        response
            .encode_response(secret, &request_auth)
            .unwrap()
            .packet()
            .encode()
            .unwrap()
    }

    #[tokio::test]
    async fn test_id_correlator_round_trip() {
        let correlator = IdCorrelator::new(dict());
        let mut prepared = correlator.prepare(request(), &endpoint()).unwrap();
        assert_eq!(correlator.pending(), 1);

        let datagram = respond_to(&prepared, b"testing123");
        correlator.dispatch(&datagram, endpoint().address).unwrap();

        let response = (&mut prepared.slot).await.unwrap();
        assert_eq!(response.code(), Code::AccessAccept);
        assert_eq!(correlator.pending(), 0);
    }

    #[tokio::test]
    async fn test_id_correlator_unknown_response_dropped() {
        let correlator = IdCorrelator::new(dict());
        let prepared = correlator.prepare(request(), &endpoint()).unwrap();

        let mut datagram = respond_to(&prepared, b"testing123");
        datagram[1] = datagram[1].wrapping_add(1); // different identifier
        assert!(matches!(
            correlator.dispatch(&datagram, endpoint().address),
            Err(RadiusIoError::CorrelationMiss)
        ));
        assert_eq!(correlator.pending(), 1);
    }

    #[tokio::test]
    async fn test_id_correlator_bad_authenticator_keeps_entry() {
        let correlator = IdCorrelator::new(dict());
        let prepared = correlator.prepare(request(), &endpoint()).unwrap();

        let datagram = respond_to(&prepared, b"wrongsecret");
        assert!(correlator.dispatch(&datagram, endpoint().address).is_err());
        // entry survives so the genuine response can still complete
        assert_eq!(correlator.pending(), 1);

        let genuine = respond_to(&prepared, b"testing123");
        correlator.dispatch(&genuine, endpoint().address).unwrap();
        assert_eq!(correlator.pending(), 0);
    }

    #[tokio::test]
    async fn test_id_correlator_evict() {
        let correlator = IdCorrelator::new(dict());
        let prepared = correlator.prepare(request(), &endpoint()).unwrap();
        correlator.evict(&prepared.key);
        assert_eq!(correlator.pending(), 0);
        // double eviction is harmless
        correlator.evict(&prepared.key);
    }

    #[tokio::test]
    async fn test_proxy_state_correlator_round_trip() {
        let correlator = ProxyStateCorrelator::new(dict());
        let mut prepared = correlator.prepare(request(), &endpoint()).unwrap();

        // outbound datagram carries our Proxy-State as the last attribute
        let parsed = radius_core::Packet::parse(dict(), &prepared.datagram).unwrap();
        assert_eq!(parsed.attributes_of(types::PROXY_STATE).len(), 1);

        let datagram = respond_to(&prepared, b"testing123");
        correlator.dispatch(&datagram, endpoint().address).unwrap();

        let response = (&mut prepared.slot).await.unwrap();
        // the correlator's own Proxy-State is stripped before delivery
        assert!(response.packet().attributes_of(types::PROXY_STATE).is_empty());
        assert_eq!(correlator.pending(), 0);
    }

    #[tokio::test]
    async fn test_proxy_state_correlator_preserves_foreign_states() {
        let correlator = ProxyStateCorrelator::new(dict());
        let foreign = PlainAttribute::new(NO_VENDOR, types::PROXY_STATE, None, b"upstream-hop".to_vec());
        let request = request().map_packet(|p| p.with_attribute(foreign));

        let mut prepared = correlator.prepare(request, &endpoint()).unwrap();
        let datagram = respond_to(&prepared, b"testing123");
        correlator.dispatch(&datagram, endpoint().address).unwrap();

        let response = (&mut prepared.slot).await.unwrap();
        let states = response.packet().attributes_of(types::PROXY_STATE);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].as_plain().unwrap().value(), b"upstream-hop");
    }

    #[tokio::test]
    async fn test_proxy_state_identifier_preserved() {
        let correlator = ProxyStateCorrelator::new(dict());
        let request = RadiusRequest::from_packet(
            AccessRequest::new(dict(), 42).with_user_name("test").into_packet(),
        );
        let prepared = correlator.prepare(request, &endpoint()).unwrap();
        let parsed = radius_core::Packet::parse(dict(), &prepared.datagram).unwrap();
        assert_eq!(parsed.identifier(), 42);
    }

    #[tokio::test]
    async fn test_proxy_state_sequences_unique() {
        let correlator = ProxyStateCorrelator::new(dict());
        let a = correlator.prepare(request(), &endpoint()).unwrap();
        let b = correlator.prepare(request(), &endpoint()).unwrap();
        assert_ne!(a.key, b.key);
        assert_eq!(correlator.pending(), 2);
    }
}
