//! Request handlers and the shared-secret provider.

use crate::endpoint::Endpoint;
use crate::error::RadiusIoError;
use async_trait::async_trait;
use radius_core::attr::types;
use radius_core::{
    AccessRequest, Attribute, AuthMechanism, Code, RadiusRequest, RadiusResponse,
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{info, warn};

/// Resolves the shared secret for a peer socket address at server ingress.
/// Returning `None` drops the datagram.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn secret(&self, remote: SocketAddr) -> Option<String>;
}

/// In-memory secret table keyed by peer IP, with an optional catch-all.
#[derive(Debug, Default)]
pub struct StaticSecrets {
    by_ip: HashMap<IpAddr, String>,
    default: Option<String>,
}

impl StaticSecrets {
    /// One secret for every peer.
    pub fn shared(secret: impl Into<String>) -> Self {
        StaticSecrets {
            by_ip: HashMap::new(),
            default: Some(secret.into()),
        }
    }

    pub fn insert(&mut self, ip: IpAddr, secret: impl Into<String>) {
        self.by_ip.insert(ip, secret.into());
    }
}

#[async_trait]
impl SecretProvider for StaticSecrets {
    async fn secret(&self, remote: SocketAddr) -> Option<String> {
        self.by_ip
            .get(&remote.ip())
            .cloned()
            .or_else(|| self.default.clone())
    }
}

/// A verified request plus the peer it came from.
#[derive(Debug, Clone)]
pub struct RequestCtx {
    pub request: RadiusRequest,
    pub endpoint: Endpoint,
}

/// Produces the response for one verified request.
///
/// `Ok(None)` drops the request intentionally (no response datagram).
/// Errors fail the per-packet future; the pipeline logs and drops.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, ctx: RequestCtx) -> Result<Option<RadiusResponse>, RadiusIoError>;
}

/// Copy the request's Proxy-State attributes into the response, in order,
/// per RFC 2865 Section 5.33.
pub fn echo_proxy_state(request: &RadiusRequest, mut response: RadiusResponse) -> RadiusResponse {
    for attribute in request.packet().attributes_of(types::PROXY_STATE) {
        response = response.with_attribute(attribute.clone());
    }
    response
}

/// Looks up a user's plaintext password plus the attributes to attach to
/// the verdict packets.
#[async_trait]
pub trait PasswordAuthority: Send + Sync {
    async fn user_password(&self, username: &str) -> Option<String>;

    fn accept_attributes(&self, _username: &str) -> Vec<Attribute> {
        Vec::new()
    }

    fn reject_attributes(&self, _username: &str) -> Vec<Attribute> {
        Vec::new()
    }
}

/// In-memory user store for tests and small deployments.
#[derive(Debug, Default)]
pub struct InMemoryUsers {
    users: HashMap<String, String>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        InMemoryUsers::default()
    }

    pub fn add_user(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.users.insert(username.into(), password.into());
    }
}

#[async_trait]
impl PasswordAuthority for InMemoryUsers {
    async fn user_password(&self, username: &str) -> Option<String> {
        self.users.get(username).cloned()
    }
}

/// PAP/CHAP authentication handler: looks up the user's password and
/// answers Access-Accept or Access-Reject.
pub struct AccessHandler<A> {
    authority: Arc<A>,
}

impl<A: PasswordAuthority> AccessHandler<A> {
    pub fn new(authority: Arc<A>) -> Self {
        AccessHandler { authority }
    }

    async fn verdict(&self, access: &AccessRequest) -> Result<bool, RadiusIoError> {
        let Some(username) = access.user_name() else {
            warn!("Access-Request without User-Name, rejecting");
            return Ok(false);
        };
        let Some(password) = self.authority.user_password(&username).await else {
            info!(username = %username, "unknown user, rejecting");
            return Ok(false);
        };

        match access.mechanism() {
            AuthMechanism::Pap | AuthMechanism::Chap => Ok(access.verify_password(&password)?),
            mechanism => {
                warn!(username = %username, ?mechanism, "unsupported auth mechanism, rejecting");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl<A: PasswordAuthority> RequestHandler for AccessHandler<A> {
    async fn handle(&self, ctx: RequestCtx) -> Result<Option<RadiusResponse>, RadiusIoError> {
        let RadiusRequest::Access(ref access) = ctx.request else {
            warn!(code = ?ctx.request.code(), "auth handler received non-access request, dropping");
            return Ok(None);
        };
        let username = access.user_name().unwrap_or_default();
        let dict = Arc::clone(access.packet().dictionary());

        let accepted = self.verdict(access).await?;
        info!(
            username = %username,
            client = %ctx.endpoint.address,
            identifier = access.identifier(),
            accepted,
            "authentication decision"
        );

        let (code, extra) = if accepted {
            (Code::AccessAccept, self.authority.accept_attributes(&username))
        } else {
            (Code::AccessReject, self.authority.reject_attributes(&username))
        };

        let mut response = RadiusResponse::new(dict, code, access.identifier());
        for attribute in extra {
            response = response.with_attribute(attribute);
        }
        Ok(Some(echo_proxy_state(&ctx.request, response)))
    }
}

/// Accounting handler: acknowledges every Accounting-Request with an
/// Accounting-Response, echoing Proxy-State.
#[derive(Debug, Default)]
pub struct AccountingHandler;

#[async_trait]
impl RequestHandler for AccountingHandler {
    async fn handle(&self, ctx: RequestCtx) -> Result<Option<RadiusResponse>, RadiusIoError> {
        let RadiusRequest::Accounting(ref acct) = ctx.request else {
            warn!(code = ?ctx.request.code(), "accounting handler received non-accounting request, dropping");
            return Ok(None);
        };

        info!(
            client = %ctx.endpoint.address,
            identifier = acct.packet().identifier(),
            status_type = acct.acct_status_type(),
            "accounting request"
        );

        let response = RadiusResponse::new(
            Arc::clone(acct.packet().dictionary()),
            Code::AccountingResponse,
            acct.packet().identifier(),
        );
        Ok(Some(echo_proxy_state(&ctx.request, response)))
    }
}
