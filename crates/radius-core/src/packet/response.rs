//! Response packets.
//!
//! All responses share one shape: the response authenticator is
//! `md5(code | id | length | request_authenticator | attributes | secret)`
//! and is always verifiable against the request that elicited it.

use crate::attr::{types, Attribute, PlainAttribute, NO_VENDOR};
use crate::dict::Dictionary;
use crate::error::RadiusError;
use crate::packet::{message_auth, Code, Packet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusResponse {
    packet: Packet,
}

impl RadiusResponse {
    pub fn new(dict: Arc<Dictionary>, code: Code, identifier: u8) -> Self {
        RadiusResponse {
            packet: Packet::new(dict, code, identifier),
        }
    }

    pub fn from_packet(packet: Packet) -> Self {
        RadiusResponse { packet }
    }

    pub fn parse(dict: Arc<Dictionary>, data: &[u8]) -> Result<Self, RadiusError> {
        Ok(RadiusResponse {
            packet: Packet::parse(dict, data)?,
        })
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    pub fn code(&self) -> Code {
        self.packet.code()
    }

    pub fn identifier(&self) -> u8 {
        self.packet.identifier()
    }

    pub fn with_attribute(self, attribute: impl Into<Attribute>) -> Self {
        RadiusResponse {
            packet: self.packet.with_attribute(attribute),
        }
    }

    /// Apply a packet-level transformation.
    pub fn map_packet(self, f: impl FnOnce(Packet) -> Packet) -> Self {
        RadiusResponse {
            packet: f(self.packet),
        }
    }

    /// Request a Message-Authenticator on this response; the value is
    /// computed during [`RadiusResponse::encode_response`].
    pub fn with_message_authenticator(self) -> Self {
        self.with_attribute(PlainAttribute::new(
            NO_VENDOR,
            types::MESSAGE_AUTHENTICATOR,
            None,
            vec![0u8; 16],
        ))
    }

    /// Encode against the authenticator of the request being answered:
    /// encrypt attributes, refresh any Message-Authenticator, then set the
    /// hashed response authenticator.
    pub fn encode_response(
        self,
        secret: &[u8],
        request_auth: &[u8; 16],
    ) -> Result<Self, RadiusError> {
        let mut packet = self.packet.encode_attributes(request_auth, secret)?;
        if packet.attribute(types::MESSAGE_AUTHENTICATOR).is_some() {
            packet = message_auth::encode(packet, secret, request_auth)?;
        }
        let hashed = packet.hashed_authenticator(request_auth, secret)?;
        Ok(RadiusResponse {
            packet: packet.with_authenticator(hashed),
        })
    }

    /// Client-side verification: compare the response authenticator against
    /// the recorded request authenticator, check the Message-Authenticator
    /// when present, then decrypt attributes.
    pub fn verify_response(
        self,
        secret: &[u8],
        request_auth: &[u8; 16],
    ) -> Result<Self, RadiusError> {
        let authenticator = self.packet.authenticator().ok_or_else(|| {
            RadiusError::MalformedPacket("response has no authenticator".into())
        })?;
        let expected = self.packet.hashed_authenticator(request_auth, secret)?;
        if authenticator != expected {
            return Err(RadiusError::AuthenticatorInvalid(format!(
                "{:?} response authenticator mismatch",
                self.packet.code()
            )));
        }

        message_auth::verify(&self.packet, secret, request_auth)?;

        Ok(RadiusResponse {
            packet: self.packet.decode_attributes(request_auth, secret)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> Arc<Dictionary> {
        Arc::clone(Dictionary::standard())
    }

    fn reply_message(text: &str) -> PlainAttribute {
        PlainAttribute::new(NO_VENDOR, types::REPLY_MESSAGE, None, text.as_bytes().to_vec())
    }

    #[test]
    fn test_response_authenticator_law() {
        let secret = b"testing123";
        let request_auth = [0x5au8; 16];

        let response = RadiusResponse::new(dict(), Code::AccessAccept, 42)
            .with_attribute(reply_message("Welcome test!"))
            .encode_response(secret, &request_auth)
            .unwrap();

        // auth(r) == md5(type | id | len | auth(q) | attrs | secret)
        let expected = response
            .packet()
            .hashed_authenticator(&request_auth, secret)
            .unwrap();
        assert_eq!(response.packet().authenticator(), Some(expected));

        let bytes = response.packet().encode().unwrap();
        let verified = RadiusResponse::parse(dict(), &bytes)
            .unwrap()
            .verify_response(secret, &request_auth)
            .unwrap();
        assert_eq!(
            verified.packet().attribute_string(types::REPLY_MESSAGE).unwrap(),
            "Welcome test!"
        );
    }

    #[test]
    fn test_wrong_request_auth_rejected() {
        let secret = b"testing123";
        let response = RadiusResponse::new(dict(), Code::AccessReject, 7)
            .encode_response(secret, &[1u8; 16])
            .unwrap();
        let bytes = response.packet().encode().unwrap();

        assert!(matches!(
            RadiusResponse::parse(dict(), &bytes)
                .unwrap()
                .verify_response(secret, &[2u8; 16]),
            Err(RadiusError::AuthenticatorInvalid(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let request_auth = [1u8; 16];
        let response = RadiusResponse::new(dict(), Code::AccountingResponse, 7)
            .encode_response(b"right", &request_auth)
            .unwrap();
        let bytes = response.packet().encode().unwrap();

        assert!(RadiusResponse::parse(dict(), &bytes)
            .unwrap()
            .verify_response(b"wrong", &request_auth)
            .is_err());
    }

    #[test]
    fn test_message_authenticator_on_response() {
        let secret = b"testing123";
        let request_auth = [0x11u8; 16];

        let response = RadiusResponse::new(dict(), Code::AccessChallenge, 3)
            .with_attribute(PlainAttribute::new(NO_VENDOR, types::STATE, None, vec![1, 2, 3]))
            .with_message_authenticator()
            .encode_response(secret, &request_auth)
            .unwrap();

        let bytes = response.packet().encode().unwrap();
        RadiusResponse::parse(dict(), &bytes)
            .unwrap()
            .verify_response(secret, &request_auth)
            .unwrap();

        // flipping one payload octet breaks the HMAC before the hash check
        let mut tampered = bytes.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        assert!(RadiusResponse::parse(dict(), &tampered)
            .unwrap()
            .verify_response(secret, &request_auth)
            .is_err());
    }

    #[test]
    fn test_tunnel_password_in_response() {
        let secret = b"testing123";
        let request_auth = [0x42u8; 16];

        let dict_ref = dict();
        let attr = dict_ref
            .create_attribute_tagged("Tunnel-Password", Some(1), "tunnelsecret")
            .unwrap();
        let response = RadiusResponse::new(dict(), Code::AccessAccept, 9)
            .with_attribute(attr)
            .encode_response(secret, &request_auth)
            .unwrap();

        let bytes = response.packet().encode().unwrap();
        let verified = RadiusResponse::parse(dict(), &bytes)
            .unwrap()
            .verify_response(secret, &request_auth)
            .unwrap();

        let plain = verified
            .packet()
            .attribute(types::TUNNEL_PASSWORD)
            .and_then(Attribute::as_plain)
            .unwrap();
        assert_eq!(plain.tag(), Some(1));
        assert_eq!(plain.value(), b"tunnelsecret");
    }
}
