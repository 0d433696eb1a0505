//! Proxy handler: forwards verified requests to an upstream server and
//! relays the response back to the original client.
//!
//! Correlation uses the Proxy-State strategy, which the internal client's
//! correlator manages end to end: the attribute is appended before the
//! upstream send and stripped from the upstream response before it reaches
//! this handler. Everything else in the request passes through untouched.

use crate::client::correlator::ProxyStateCorrelator;
use crate::client::retry::RetryPolicy;
use crate::client::RadiusClient;
use crate::endpoint::Endpoint;
use crate::error::RadiusIoError;
use crate::server::handler::{RequestCtx, RequestHandler};
use async_trait::async_trait;
use radius_core::{Dictionary, RadiusRequest, RadiusResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Chooses the upstream endpoint for a request, or `None` to refuse it.
pub type ProxyPolicy =
    dyn Fn(&RadiusRequest, &Endpoint) -> Option<Endpoint> + Send + Sync + 'static;

pub struct ProxyHandler {
    client: RadiusClient,
    policy: Box<ProxyPolicy>,
}

impl ProxyHandler {
    /// Bind the upstream-facing client socket.
    pub async fn bind(
        bind_addr: SocketAddr,
        dict: Arc<Dictionary>,
        retry: RetryPolicy,
        policy: Box<ProxyPolicy>,
    ) -> Result<Self, RadiusIoError> {
        let correlator = Arc::new(ProxyStateCorrelator::new(dict));
        let client = RadiusClient::bind(bind_addr, correlator, retry).await?;
        info!(local = %client.local_addr()?, "proxy upstream socket bound");

        Ok(ProxyHandler { client, policy })
    }

    /// Upstream calls still awaiting a response.
    pub fn outstanding(&self) -> usize {
        self.client.pending()
    }
}

#[async_trait]
impl RequestHandler for ProxyHandler {
    async fn handle(&self, ctx: RequestCtx) -> Result<Option<RadiusResponse>, RadiusIoError> {
        let upstream = (self.policy)(&ctx.request, &ctx.endpoint)
            .ok_or(RadiusIoError::NoUpstream(ctx.endpoint.address))?;

        debug!(
            client = %ctx.endpoint.address,
            upstream = %upstream.address,
            identifier = ctx.request.identifier(),
            "forwarding request upstream"
        );

        let upstream_response = match self
            .client
            .send_and_await(ctx.request.clone(), &upstream)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(upstream = %upstream.address, error = %e, "upstream call failed");
                return Err(e);
            }
        };

        info!(
            client = %ctx.endpoint.address,
            upstream = %upstream.address,
            code = ?upstream_response.code(),
            identifier = upstream_response.identifier(),
            "relaying upstream response"
        );

        // mirror (code, id, attributes); the pipeline re-encodes against the
        // original request's authenticator and the downstream secret
        Ok(Some(RadiusResponse::from_packet(
            upstream_response.into_packet(),
        )))
    }
}
