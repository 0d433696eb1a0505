//! Server pipeline: datagram codec, deduplication, handler dispatch.
//!
//! Per datagram: resolve the shared secret, parse and verify, consult the
//! response cache, run the handler under a hard budget, encode the
//! response against the request authenticator, send and cache it. Each
//! datagram is processed on its own task; wire-level failures are logged
//! and dropped, never propagated.

pub mod dedup;
pub mod handler;
pub mod proxy;

use crate::config::ServerConfig;
use crate::endpoint::Endpoint;
use crate::error::RadiusIoError;
use dedup::{IngressDecision, RequestKey, ResponseCache};
use handler::{RequestCtx, RequestHandler, SecretProvider};
use radius_core::{Dictionary, RadiusRequest};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Pipeline knobs; see [`ServerConfig`] for the JSON-facing versions.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub dedup_ttl: Duration,
    pub dedup_max_entries: usize,
    pub handler_budget: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            dedup_ttl: ResponseCache::DEFAULT_TTL,
            dedup_max_entries: 10_000,
            handler_budget: Duration::from_secs(10),
        }
    }
}

impl From<&ServerConfig> for PipelineOptions {
    fn from(config: &ServerConfig) -> Self {
        PipelineOptions {
            dedup_ttl: config.dedup_ttl(),
            dedup_max_entries: config.dedup_max_entries,
            handler_budget: config.handler_budget(),
        }
    }
}

/// One UDP socket plus the processing pipeline behind it. Auth, accounting
/// and proxy ports are separate server instances.
pub struct RadiusServer {
    socket: Arc<UdpSocket>,
    dict: Arc<Dictionary>,
    secrets: Arc<dyn SecretProvider>,
    handler: Arc<dyn RequestHandler>,
    cache: Arc<ResponseCache>,
    handler_budget: Duration,
}

impl RadiusServer {
    pub async fn bind(
        bind_addr: SocketAddr,
        dict: Arc<Dictionary>,
        secrets: Arc<dyn SecretProvider>,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, RadiusIoError> {
        RadiusServer::bind_with(bind_addr, dict, secrets, handler, PipelineOptions::default()).await
    }

    pub async fn bind_with(
        bind_addr: SocketAddr,
        dict: Arc<Dictionary>,
        secrets: Arc<dyn SecretProvider>,
        handler: Arc<dyn RequestHandler>,
        options: PipelineOptions,
    ) -> Result<Self, RadiusIoError> {
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        info!(local = %socket.local_addr()?, "radius server listening");

        Ok(RadiusServer {
            socket,
            dict,
            secrets,
            handler,
            cache: Arc::new(ResponseCache::new(options.dedup_ttl, options.dedup_max_entries)),
            handler_budget: options.handler_budget,
        })
    }

    /// Local address; useful when bound to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, RadiusIoError> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive loop; runs until the socket fails.
    pub async fn run(&self) -> Result<(), RadiusIoError> {
        let mut buf = vec![0u8; radius_core::MAX_PACKET_LEN];
        loop {
            let (len, remote) = self.socket.recv_from(&mut buf).await?;
            let data = buf[..len].to_vec();

            let socket = Arc::clone(&self.socket);
            let dict = Arc::clone(&self.dict);
            let secrets = Arc::clone(&self.secrets);
            let handler = Arc::clone(&self.handler);
            let cache = Arc::clone(&self.cache);
            let budget = self.handler_budget;

            tokio::spawn(async move {
                Self::process(socket, dict, secrets, handler, cache, budget, data, remote).await;
            });
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn process(
        socket: Arc<UdpSocket>,
        dict: Arc<Dictionary>,
        secrets: Arc<dyn SecretProvider>,
        handler: Arc<dyn RequestHandler>,
        cache: Arc<ResponseCache>,
        budget: Duration,
        data: Vec<u8>,
        remote: SocketAddr,
    ) {
        // shared secret lookup
        let Some(secret) = secrets.secret(remote).await else {
            warn!(remote = %remote, "no shared secret for peer, dropping");
            return;
        };

        // decode and verify
        let request = match RadiusRequest::parse(dict, &data)
            .and_then(|r| r.verify_request(secret.as_bytes()))
        {
            Ok(request) => request,
            Err(e) => {
                warn!(remote = %remote, error = %e, "dropping malformed or unverifiable request");
                return;
            }
        };
        let Some(request_auth) = request.authenticator() else {
            warn!(remote = %remote, "request has no authenticator, dropping");
            return;
        };

        // duplicate detection
        let key = RequestKey::new(request.identifier(), remote, request_auth);
        match cache.check(key.clone()) {
            IngressDecision::New => {}
            IngressDecision::InFlight => {
                debug!(remote = %remote, identifier = request.identifier(), "retransmit while handler in flight, absorbed");
                return;
            }
            IngressDecision::Replay(bytes) => {
                debug!(remote = %remote, identifier = request.identifier(), "retransmit of answered request, replaying");
                if let Err(e) = socket.send_to(&bytes, remote).await {
                    warn!(remote = %remote, error = %e, "replay send failed");
                }
                return;
            }
        }

        // handler, under its budget
        let ctx = RequestCtx {
            request,
            endpoint: Endpoint::new(remote, secret.clone()),
        };
        let identifier = ctx.request.identifier();
        let outcome = tokio::time::timeout(budget, handler.handle(ctx)).await;

        let response = match outcome {
            Err(_elapsed) => {
                error!(
                    remote = %remote,
                    identifier,
                    "handler exceeded {budget:?} budget, dropping",
                );
                cache.forget(&key);
                return;
            }
            Ok(Err(e)) => {
                error!(remote = %remote, identifier, error = %e, "handler failed, dropping");
                cache.forget(&key);
                return;
            }
            Ok(Ok(None)) => {
                debug!(remote = %remote, identifier, "handler produced no response");
                cache.forget(&key);
                return;
            }
            Ok(Ok(Some(response))) => response,
        };

        // encode against the request authenticator and send
        let encoded = match response
            .encode_response(secret.as_bytes(), &request_auth)
            .and_then(|r| r.packet().encode())
        {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(remote = %remote, identifier, error = %e, "response encoding failed, dropping");
                cache.forget(&key);
                return;
            }
        };

        if let Err(e) = socket.send_to(&encoded, remote).await {
            warn!(remote = %remote, error = %e, "response send failed");
            cache.forget(&key);
            return;
        }
        cache.store(key, encoded);
    }
}
