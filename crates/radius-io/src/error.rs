use radius_core::RadiusError;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors raised by the client, server and proxy pipelines.
///
/// Wire-level failures never escape the pipeline as panics; server ingress
/// drops bad packets after logging, client calls fail their caller's
/// future.
#[derive(Error, Debug)]
pub enum RadiusIoError {
    /// Packet parse, verification or attribute errors from the core codec.
    #[error("protocol error: {0}")]
    Protocol(#[from] RadiusError),

    /// The secret provider knows nothing about this peer.
    #[error("no shared secret configured for {0}")]
    UnknownSecret(SocketAddr),

    /// Client attempts exhausted, or a server handler blew its budget.
    #[error("timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    /// An inbound response matched no pending request.
    #[error("no pending request matches the response")]
    CorrelationMiss,

    /// Identifier-keyed correlation found the slot already in flight; the
    /// new send is rejected and the prior request is preserved.
    #[error("identifier {identifier} already in flight to {remote}")]
    IdentifierCollision { remote: SocketAddr, identifier: u8 },

    /// The proxy policy returned no upstream for this request.
    #[error("no upstream server for request from {0}")]
    NoUpstream(SocketAddr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
