//! RADIUS transport: client, server and proxy pipelines over UDP.
//!
//! Builds on [`radius_core`] for all packet semantics and adds the
//! event-driven side of the protocol: request/response correlation over a
//! single socket, fixed-attempt retry, time-windowed duplicate detection
//! with response replay, and upstream forwarding.
//!
//! Concurrency model: one tokio task per inbound datagram, correlator and
//! cache tables shared behind concurrent maps, process-wide atomic
//! counters for packet identifiers and Proxy-State sequences. Handlers
//! never block and never own sockets.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod server;

pub use client::correlator::{
    CorrelationKey, Correlator, IdCorrelator, PreparedRequest, ProxyStateCorrelator,
};
pub use client::retry::RetryPolicy;
pub use client::RadiusClient;
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use endpoint::Endpoint;
pub use error::RadiusIoError;
pub use server::dedup::{IngressDecision, RequestKey, ResponseCache};
pub use server::handler::{
    echo_proxy_state, AccessHandler, AccountingHandler, InMemoryUsers, PasswordAuthority,
    RequestCtx, RequestHandler, SecretProvider, StaticSecrets,
};
pub use server::proxy::{ProxyHandler, ProxyPolicy};
pub use server::{PipelineOptions, RadiusServer};
