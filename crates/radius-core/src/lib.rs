//! RADIUS Protocol Core
//!
//! Sans-io implementation of the RADIUS protocol as defined in RFC 2865,
//! 2866, 2868 and 2869: packet framing, the attribute model with
//! vendor-specific nesting, dictionary-driven typing, password encryption
//! codecs and all authenticator calculations.
//!
//! # Features
//!
//! - Bit-exact attribute TLV encoding, including multi-octet vendor header
//!   formats
//! - Radiator-format dictionary loader with a built-in standard dictionary
//! - PAP, CHAP, Tunnel-Password and Message-Authenticator (HMAC-MD5)
//! - Request/response authenticator calculation and verification
//! - Copy-on-change packets, safe to share across tasks
//!
//! # Example
//!
//! ```rust
//! use radius_core::{AccessRequest, Dictionary, RadiusRequest};
//! use std::sync::Arc;
//!
//! let dict = Arc::clone(Dictionary::standard());
//! let request = RadiusRequest::from_packet(
//!     AccessRequest::new(dict, 1)
//!         .with_user_name("alice")
//!         .with_pap_password("password")
//!         .into_packet(),
//! );
//!
//! // Encrypts User-Password and sets a random request authenticator.
//! let wire = request
//!     .encode_request(b"sharedsecret")
//!     .unwrap()
//!     .packet()
//!     .encode()
//!     .unwrap();
//! assert!(wire.len() >= 20);
//! ```

pub mod attr;
pub mod dict;
pub mod error;
pub mod packet;

pub use attr::codec::CodecType;
pub use attr::value::DataType;
pub use attr::{Attribute, PlainAttribute, VendorSpecific, NO_VENDOR};
pub use dict::{AttributeTemplate, Dictionary, DictionaryParser, Vendor};
pub use error::{DictionaryError, RadiusError};
pub use packet::request::{
    AccessRequest, AccountingRequest, AuthMechanism, CoaRequest, DisconnectRequest, RadiusRequest,
};
pub use packet::response::RadiusResponse;
pub use packet::{random_authenticator, Code, Packet, PacketHeader, MAX_PACKET_LEN, MIN_PACKET_LEN};
