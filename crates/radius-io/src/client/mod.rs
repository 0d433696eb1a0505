//! RADIUS client: a UDP socket, a correlation strategy and retry policy.
//!
//! The client owns its socket and a background receive task; both are
//! released on drop. Cancelling a call (dropping its future) evicts the
//! correlator entry, so the table stays bounded by requests actually in
//! flight.

pub mod correlator;
pub mod retry;

use crate::endpoint::Endpoint;
use crate::error::RadiusIoError;
use correlator::{CorrelationKey, Correlator, ProxyStateCorrelator};
use radius_core::{Dictionary, RadiusRequest, RadiusResponse};
use retry::RetryPolicy;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct RadiusClient {
    socket: Arc<UdpSocket>,
    correlator: Arc<dyn Correlator>,
    retry: RetryPolicy,
    recv_task: JoinHandle<()>,
}

impl RadiusClient {
    /// Bind a client socket with an explicit correlation strategy.
    pub async fn bind(
        bind_addr: SocketAddr,
        correlator: Arc<dyn Correlator>,
        retry: RetryPolicy,
    ) -> Result<Self, RadiusIoError> {
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        debug!(local = %socket.local_addr()?, "client socket bound");

        let recv_task = tokio::spawn(Self::recv_loop(
            Arc::clone(&socket),
            Arc::clone(&correlator),
        ));

        Ok(RadiusClient {
            socket,
            correlator,
            retry,
            recv_task,
        })
    }

    /// Bind with the Proxy-State strategy, which has no in-flight limit
    /// per peer and is mandatory in proxy chains.
    pub async fn bind_default(
        bind_addr: SocketAddr,
        dict: Arc<Dictionary>,
        retry: RetryPolicy,
    ) -> Result<Self, RadiusIoError> {
        let correlator: Arc<dyn Correlator> = Arc::new(ProxyStateCorrelator::new(dict));
        RadiusClient::bind(bind_addr, correlator, retry).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RadiusIoError> {
        Ok(self.socket.local_addr()?)
    }

    /// Requests currently awaiting a response.
    pub fn pending(&self) -> usize {
        self.correlator.pending()
    }

    /// Encode and send a request, awaiting the matched response.
    ///
    /// On per-attempt timeout the identical datagram is re-sent until
    /// `max_attempts` is reached, then the call fails with
    /// [`RadiusIoError::Timeout`] and the correlator entry is evicted.
    pub async fn send_and_await(
        &self,
        request: RadiusRequest,
        endpoint: &Endpoint,
    ) -> Result<RadiusResponse, RadiusIoError> {
        let prepared = self.correlator.prepare(request, endpoint)?;
        let guard = EvictionGuard {
            correlator: Arc::clone(&self.correlator),
            key: prepared.key,
        };
        let mut slot = prepared.slot;

        for attempt in 1..=self.retry.max_attempts {
            self.socket
                .send_to(&prepared.datagram, prepared.destination)
                .await?;
            debug!(destination = %prepared.destination, attempt, "request sent");

            match tokio::time::timeout(self.retry.timeout, &mut slot).await {
                Ok(Ok(response)) => {
                    drop(guard);
                    return Ok(response);
                }
                // sender side vanished without completing; treat like a miss
                Ok(Err(_closed)) => return Err(RadiusIoError::CorrelationMiss),
                Err(_elapsed) => {
                    debug!(
                        destination = %prepared.destination,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "attempt timed out"
                    );
                }
            }
        }

        Err(RadiusIoError::Timeout {
            attempts: self.retry.max_attempts,
        })
    }

    async fn recv_loop(socket: Arc<UdpSocket>, correlator: Arc<dyn Correlator>) {
        let mut buf = vec![0u8; radius_core::MAX_PACKET_LEN];
        loop {
            let (len, sender) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "client receive failed");
                    continue;
                }
            };

            match correlator.dispatch(&buf[..len], sender) {
                Ok(()) => {}
                Err(RadiusIoError::CorrelationMiss) => {
                    info!(sender = %sender, "response matches no pending request, dropping");
                }
                Err(e) => {
                    warn!(sender = %sender, error = %e, "dropping response");
                }
            }
        }
    }
}

impl Drop for RadiusClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

/// Removes the correlator entry when the call completes, times out or is
/// cancelled mid-flight. Eviction after completion is a no-op.
struct EvictionGuard {
    correlator: Arc<dyn Correlator>,
    key: CorrelationKey,
}

impl Drop for EvictionGuard {
    fn drop(&mut self) {
        self.correlator.evict(&self.key);
    }
}
