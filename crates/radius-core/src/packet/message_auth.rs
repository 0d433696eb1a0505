//! Message-Authenticator attribute (RFC 2869 Section 5.14).
//!
//! A 16-octet HMAC-MD5 over the entire packet, keyed by the shared secret,
//! with the Message-Authenticator value field set to zero during
//! computation. Requests use their own (request) authenticator in the
//! header slot; responses use the corresponding request's authenticator.
//! Required on Access-Request packets carrying EAP-Message.

use crate::attr::{types, Attribute, PlainAttribute, NO_VENDOR};
use crate::error::RadiusError;
use crate::packet::Packet;
use hmac::{Hmac, Mac};
use md5_digest::Md5;

type HmacMd5 = Hmac<Md5>;

/// HMAC-MD5 over the serialized packet with every Message-Authenticator
/// value zeroed and `request_auth` in the authenticator slot.
pub fn compute(
    packet: &Packet,
    secret: &[u8],
    request_auth: &[u8; 16],
) -> Result<[u8; 16], RadiusError> {
    let zeroed = packet.clone().map_attributes(|attribute| match attribute {
        Attribute::Plain(plain)
            if plain.vendor_id() == NO_VENDOR && plain.attr_type() == types::MESSAGE_AUTHENTICATOR =>
        {
            Attribute::Plain(PlainAttribute::new(
                NO_VENDOR,
                types::MESSAGE_AUTHENTICATOR,
                None,
                vec![0u8; 16],
            ))
        }
        other => other,
    });
    let input = zeroed.serialize(request_auth)?;

    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC accepts any key size");
    mac.update(&input);
    let digest = mac.finalize().into_bytes();

    let mut output = [0u8; 16];
    output.copy_from_slice(&digest);
    Ok(output)
}

/// Replace (or add) the Message-Authenticator attribute with a freshly
/// computed HMAC.
pub fn encode(
    packet: Packet,
    secret: &[u8],
    request_auth: &[u8; 16],
) -> Result<Packet, RadiusError> {
    let stub = packet
        .remove_attributes(types::MESSAGE_AUTHENTICATOR)
        .with_attribute(PlainAttribute::new(
            NO_VENDOR,
            types::MESSAGE_AUTHENTICATOR,
            None,
            vec![0u8; 16],
        ));
    let hmac = compute(&stub, secret, request_auth)?;

    Ok(stub
        .remove_attributes(types::MESSAGE_AUTHENTICATOR)
        .with_attribute(PlainAttribute::new(
            NO_VENDOR,
            types::MESSAGE_AUTHENTICATOR,
            None,
            hmac.to_vec(),
        )))
}

/// Verify the Message-Authenticator if one is present.
///
/// Absence is not an error here; callers that require the attribute (EAP)
/// check presence separately.
pub fn verify(
    packet: &Packet,
    secret: &[u8],
    request_auth: &[u8; 16],
) -> Result<(), RadiusError> {
    let found = packet.attributes_of(types::MESSAGE_AUTHENTICATOR);
    match found.len() {
        0 => return Ok(()),
        1 => {}
        n => {
            return Err(RadiusError::MalformedPacket(format!(
                "packet carries {n} Message-Authenticator attributes, at most one allowed"
            )))
        }
    }

    let stored = found[0]
        .as_plain()
        .map(PlainAttribute::value)
        .unwrap_or_default();
    let expected = compute(packet, secret, request_auth)?;
    if stored != expected {
        return Err(RadiusError::AuthenticatorInvalid(
            "Message-Authenticator mismatch".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::Dictionary;
    use crate::packet::Code;
    use std::sync::Arc;

    fn dict() -> Arc<Dictionary> {
        Arc::clone(Dictionary::standard())
    }

    fn packet() -> Packet {
        Packet::new(dict(), Code::AccessRequest, 5)
            .with_attribute(PlainAttribute::new(NO_VENDOR, types::USER_NAME, None, b"eapuser".to_vec()))
            .with_authenticator([3u8; 16])
    }

    #[test]
    fn test_encode_then_verify() {
        let auth = [3u8; 16];
        let signed = encode(packet(), b"testing123", &auth).unwrap();
        assert_eq!(signed.attributes_of(types::MESSAGE_AUTHENTICATOR).len(), 1);
        verify(&signed, b"testing123", &auth).unwrap();
    }

    #[test]
    fn test_stored_value_matches_recompute_with_zeroed_field() {
        let auth = [3u8; 16];
        let signed = encode(packet(), b"testing123", &auth).unwrap();

        let stored = signed
            .attribute(types::MESSAGE_AUTHENTICATOR)
            .and_then(Attribute::as_plain)
            .unwrap()
            .value()
            .to_vec();
        let recomputed = compute(&signed, b"testing123", &auth).unwrap();
        assert_eq!(stored, recomputed.to_vec());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let auth = [3u8; 16];
        let signed = encode(packet(), b"right", &auth).unwrap();
        assert!(matches!(
            verify(&signed, b"wrong", &auth),
            Err(RadiusError::AuthenticatorInvalid(_))
        ));
    }

    #[test]
    fn test_tampered_packet_fails() {
        let auth = [3u8; 16];
        let signed = encode(packet(), b"testing123", &auth).unwrap();
        let tampered = signed.with_attribute(PlainAttribute::new(
            NO_VENDOR,
            types::REPLY_MESSAGE,
            None,
            b"inserted".to_vec(),
        ));
        assert!(verify(&tampered, b"testing123", &auth).is_err());
    }

    #[test]
    fn test_absent_is_ok() {
        verify(&packet(), b"testing123", &[3u8; 16]).unwrap();
    }

    #[test]
    fn test_duplicate_rejected() {
        let with_two = packet()
            .with_attribute(PlainAttribute::new(NO_VENDOR, types::MESSAGE_AUTHENTICATOR, None, vec![0; 16]))
            .with_attribute(PlainAttribute::new(NO_VENDOR, types::MESSAGE_AUTHENTICATOR, None, vec![0; 16]));
        assert!(matches!(
            verify(&with_two, b"s", &[3u8; 16]),
            Err(RadiusError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_encode_idempotent() {
        let auth = [3u8; 16];
        let once = encode(packet(), b"testing123", &auth).unwrap();
        let twice = encode(once.clone(), b"testing123", &auth).unwrap();
        assert_eq!(once, twice);
    }
}
