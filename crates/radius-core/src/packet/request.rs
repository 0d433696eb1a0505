//! Request packet variants.
//!
//! A request is a [`Packet`] tagged by its code. Access-Request carries a
//! nested auth-mechanism tag derived from its attributes; the hashed-
//! authenticator family (Accounting, CoA, Disconnect) shares one encode and
//! verify path.

use crate::attr::{types, Attribute, PlainAttribute, NO_VENDOR};
use crate::dict::Dictionary;
use crate::error::RadiusError;
use crate::packet::{message_auth, random_authenticator, Code, Packet};
use rand::Rng;
use std::sync::Arc;
use tracing::warn;

const ZERO_AUTH: [u8; 16] = [0u8; 16];

/// Authentication mechanism carried inside an Access-Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    /// User-Password (2) present.
    Pap,
    /// CHAP-Password (3) present.
    Chap,
    /// One or more EAP-Message (79) present.
    Eap,
    /// ARAP-Password (70) present; structure only, crypto not implemented.
    Arap,
    /// No auth attribute, or conflicting auth attributes.
    NoAuth,
}

/// A request packet, classified by code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadiusRequest {
    Access(AccessRequest),
    Accounting(AccountingRequest),
    Coa(CoaRequest),
    Disconnect(DisconnectRequest),
    /// Any other code; encoded with the hashed authenticator scheme.
    Generic(GenericRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    packet: Packet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountingRequest {
    packet: Packet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoaRequest {
    packet: Packet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectRequest {
    packet: Packet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericRequest {
    packet: Packet,
}

impl RadiusRequest {
    /// Classify a packet by its code.
    pub fn from_packet(packet: Packet) -> Self {
        match packet.code() {
            Code::AccessRequest => RadiusRequest::Access(AccessRequest { packet }),
            Code::AccountingRequest => RadiusRequest::Accounting(AccountingRequest { packet }),
            Code::CoaRequest => RadiusRequest::Coa(CoaRequest { packet }),
            Code::DisconnectRequest => RadiusRequest::Disconnect(DisconnectRequest { packet }),
            _ => RadiusRequest::Generic(GenericRequest { packet }),
        }
    }

    pub fn parse(dict: Arc<Dictionary>, data: &[u8]) -> Result<Self, RadiusError> {
        Ok(RadiusRequest::from_packet(Packet::parse(dict, data)?))
    }

    pub fn packet(&self) -> &Packet {
        match self {
            RadiusRequest::Access(r) => &r.packet,
            RadiusRequest::Accounting(r) => &r.packet,
            RadiusRequest::Coa(r) => &r.packet,
            RadiusRequest::Disconnect(r) => &r.packet,
            RadiusRequest::Generic(r) => &r.packet,
        }
    }

    pub fn into_packet(self) -> Packet {
        match self {
            RadiusRequest::Access(r) => r.packet,
            RadiusRequest::Accounting(r) => r.packet,
            RadiusRequest::Coa(r) => r.packet,
            RadiusRequest::Disconnect(r) => r.packet,
            RadiusRequest::Generic(r) => r.packet,
        }
    }

    pub fn code(&self) -> Code {
        self.packet().code()
    }

    pub fn identifier(&self) -> u8 {
        self.packet().identifier()
    }

    pub fn authenticator(&self) -> Option<[u8; 16]> {
        self.packet().authenticator()
    }

    pub fn user_name(&self) -> Option<String> {
        self.packet().attribute_string(types::USER_NAME)
    }

    /// Apply a packet-level transformation, preserving the variant.
    pub fn map_packet(self, f: impl FnOnce(Packet) -> Packet) -> Self {
        RadiusRequest::from_packet(f(self.into_packet()))
    }

    /// Produce the wire-ready request: authenticator set per the packet
    /// type, encryptable attributes encoded, Message-Authenticator where
    /// applicable. Encoding an already-encoded request is a no-op.
    pub fn encode_request(self, secret: &[u8]) -> Result<Self, RadiusError> {
        match self {
            RadiusRequest::Access(r) => Ok(RadiusRequest::Access(r.encode(secret)?)),
            RadiusRequest::Accounting(r) => Ok(RadiusRequest::Accounting(AccountingRequest {
                packet: encode_hashed_request(r.packet, secret)?,
            })),
            RadiusRequest::Coa(r) => Ok(RadiusRequest::Coa(CoaRequest {
                packet: encode_hashed_request(r.packet, secret)?,
            })),
            RadiusRequest::Disconnect(r) => Ok(RadiusRequest::Disconnect(DisconnectRequest {
                packet: encode_hashed_request(r.packet, secret)?,
            })),
            RadiusRequest::Generic(r) => Ok(RadiusRequest::Generic(GenericRequest {
                packet: encode_hashed_request(r.packet, secret)?,
            })),
        }
    }

    /// Server-side verification and attribute decryption.
    ///
    /// Access-Request authenticators are random and cannot be checked; the
    /// Message-Authenticator is verified when present and encrypted
    /// attributes are decoded. The hashed-authenticator family recomputes
    /// the hash over a zeroed slot and compares.
    pub fn verify_request(self, secret: &[u8]) -> Result<Self, RadiusError> {
        match self {
            RadiusRequest::Access(r) => Ok(RadiusRequest::Access(r.verify(secret)?)),
            RadiusRequest::Accounting(r) => Ok(RadiusRequest::Accounting(AccountingRequest {
                packet: verify_hashed_request(r.packet, secret)?,
            })),
            RadiusRequest::Coa(r) => Ok(RadiusRequest::Coa(CoaRequest {
                packet: verify_hashed_request(r.packet, secret)?,
            })),
            RadiusRequest::Disconnect(r) => Ok(RadiusRequest::Disconnect(DisconnectRequest {
                packet: verify_hashed_request(r.packet, secret)?,
            })),
            RadiusRequest::Generic(r) => Ok(RadiusRequest::Generic(GenericRequest {
                packet: verify_hashed_request(r.packet, secret)?,
            })),
        }
    }
}

/// Hashed-authenticator encode shared by Accounting/CoA/Disconnect/Generic:
/// `md5(code | id | length | 16 zero octets | attributes | secret)`.
fn encode_hashed_request(packet: Packet, secret: &[u8]) -> Result<Packet, RadiusError> {
    let packet = packet.encode_attributes(&ZERO_AUTH, secret)?;
    let hashed = packet.hashed_authenticator(&ZERO_AUTH, secret)?;
    Ok(packet.with_authenticator(hashed))
}

fn verify_hashed_request(packet: Packet, secret: &[u8]) -> Result<Packet, RadiusError> {
    let authenticator = packet.authenticator().ok_or_else(|| {
        RadiusError::MalformedPacket("request has no authenticator to verify".into())
    })?;
    let expected = packet.hashed_authenticator(&ZERO_AUTH, secret)?;
    if authenticator != expected {
        return Err(RadiusError::AuthenticatorInvalid(format!(
            "{:?} request authenticator mismatch",
            packet.code()
        )));
    }
    packet.decode_attributes(&ZERO_AUTH, secret)
}

impl AccessRequest {
    pub fn new(dict: Arc<Dictionary>, identifier: u8) -> Self {
        AccessRequest {
            packet: Packet::new(dict, Code::AccessRequest, identifier),
        }
    }

    pub fn from_packet(packet: Packet) -> Result<Self, RadiusError> {
        if packet.code() != Code::AccessRequest {
            return Err(RadiusError::MalformedPacket(format!(
                "expected Access-Request, got {:?}",
                packet.code()
            )));
        }
        Ok(AccessRequest { packet })
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    pub fn identifier(&self) -> u8 {
        self.packet.identifier()
    }

    pub fn user_name(&self) -> Option<String> {
        self.packet.attribute_string(types::USER_NAME)
    }

    pub fn with_attribute(self, attribute: impl Into<Attribute>) -> Self {
        AccessRequest {
            packet: self.packet.with_attribute(attribute),
        }
    }

    pub fn with_user_name(self, name: &str) -> Self {
        self.with_attribute(PlainAttribute::new(
            NO_VENDOR,
            types::USER_NAME,
            None,
            name.as_bytes().to_vec(),
        ))
    }

    /// Add a plaintext User-Password attribute; it is encrypted when the
    /// request is encoded.
    pub fn with_pap_password(self, password: &str) -> Self {
        self.with_attribute(PlainAttribute::new(
            NO_VENDOR,
            types::USER_PASSWORD,
            None,
            password.as_bytes().to_vec(),
        ))
    }

    /// Add CHAP-Challenge and CHAP-Password attributes computed from the
    /// password with a random identifier and a random 16-octet challenge.
    pub fn with_chap_password(self, password: &str) -> Self {
        let mut rng = rand::rng();
        let ident: u8 = rng.random();
        let mut challenge = [0u8; 16];
        rng.fill(&mut challenge);

        let mut chap_password = Vec::with_capacity(17);
        chap_password.push(ident);
        chap_password.extend_from_slice(&chap_response(ident, password.as_bytes(), &challenge));

        self.with_attribute(PlainAttribute::new(
            NO_VENDOR,
            types::CHAP_CHALLENGE,
            None,
            challenge.to_vec(),
        ))
        .with_attribute(PlainAttribute::new(
            NO_VENDOR,
            types::CHAP_PASSWORD,
            None,
            chap_password,
        ))
    }

    /// Inspect the auth attributes and classify the mechanism.
    ///
    /// More than one auth attribute type is invalid per RFC 2865 Section
    /// 4.1; such packets classify as `NoAuth` but keep their attributes.
    pub fn mechanism(&self) -> AuthMechanism {
        let mut found = Vec::new();
        for (attr_type, mechanism) in [
            (types::USER_PASSWORD, AuthMechanism::Pap),
            (types::CHAP_PASSWORD, AuthMechanism::Chap),
            (types::ARAP_PASSWORD, AuthMechanism::Arap),
            (types::EAP_MESSAGE, AuthMechanism::Eap),
        ] {
            if self.packet.attribute(attr_type).is_some() {
                found.push(mechanism);
            }
        }
        match found.as_slice() {
            [] => AuthMechanism::NoAuth,
            [one] => *one,
            _ => {
                warn!(
                    identifier = self.packet.identifier(),
                    "Access-Request carries multiple auth attribute types"
                );
                AuthMechanism::NoAuth
            }
        }
    }

    /// Decrypted PAP password, once the request has been verified.
    pub fn password(&self) -> Option<Vec<u8>> {
        let plain = self.packet.attribute(types::USER_PASSWORD)?.as_plain()?;
        if plain.is_encoded() {
            return None;
        }
        Some(plain.value().to_vec())
    }

    /// The CHAP challenge: CHAP-Challenge (60) when present, the request
    /// authenticator otherwise.
    pub fn chap_challenge(&self) -> Option<Vec<u8>> {
        if let Some(attribute) = self.packet.attribute(types::CHAP_CHALLENGE) {
            return attribute.as_plain().map(|p| p.value().to_vec());
        }
        self.packet.authenticator().map(|a| a.to_vec())
    }

    /// Check a candidate plaintext password against the request.
    ///
    /// PAP compares the decrypted User-Password; CHAP recomputes
    /// `md5(chap_ident | password | challenge)` against the stored
    /// response. EAP and ARAP verification is not implemented.
    pub fn verify_password(&self, password: &str) -> Result<bool, RadiusError> {
        match self.mechanism() {
            AuthMechanism::Pap => {
                let stored = self.password().ok_or_else(|| {
                    RadiusError::MalformedPacket(
                        "User-Password still encrypted, verify the request first".into(),
                    )
                })?;
                Ok(stored == password.as_bytes())
            }
            AuthMechanism::Chap => {
                let chap = self
                    .packet
                    .attribute(types::CHAP_PASSWORD)
                    .and_then(Attribute::as_plain)
                    .map(PlainAttribute::value)
                    .ok_or_else(|| {
                        RadiusError::MalformedPacket("CHAP-Password attribute missing".into())
                    })?;
                if chap.len() != 17 {
                    return Err(RadiusError::MalformedPacket(format!(
                        "CHAP-Password must be 17 octets, got {}",
                        chap.len()
                    )));
                }
                let challenge = self.chap_challenge().ok_or_else(|| {
                    RadiusError::MalformedPacket("no CHAP challenge available".into())
                })?;
                let expected = chap_response(chap[0], password.as_bytes(), &challenge);
                Ok(chap[1..17] == expected)
            }
            AuthMechanism::Eap => Err(RadiusError::UnsupportedAuth("EAP")),
            AuthMechanism::Arap => Err(RadiusError::UnsupportedAuth("ARAP")),
            AuthMechanism::NoAuth => Err(RadiusError::UnsupportedAuth("no auth attribute")),
        }
    }

    /// Encode: generate the random authenticator once, encrypt password
    /// attributes under it, then sign with Message-Authenticator when the
    /// request carries EAP (or already carries the attribute).
    fn encode(self, secret: &[u8]) -> Result<Self, RadiusError> {
        let authenticator = self.packet.authenticator().unwrap_or_else(random_authenticator);
        let needs_message_auth = self.mechanism() == AuthMechanism::Eap
            || self.packet.attribute(types::MESSAGE_AUTHENTICATOR).is_some();

        let mut packet = self
            .packet
            .encode_attributes(&authenticator, secret)?
            .with_authenticator(authenticator);
        if needs_message_auth {
            packet = message_auth::encode(packet, secret, &authenticator)?;
        }
        Ok(AccessRequest { packet })
    }

    /// Verify: check Message-Authenticator (mandatory for EAP), then
    /// decrypt password attributes with the packet's own authenticator.
    fn verify(self, secret: &[u8]) -> Result<Self, RadiusError> {
        let authenticator = self.packet.authenticator().ok_or_else(|| {
            RadiusError::MalformedPacket("Access-Request has no authenticator".into())
        })?;

        message_auth::verify(&self.packet, secret, &authenticator)?;

        if self.mechanism() == AuthMechanism::Eap
            && self.packet.attribute(types::MESSAGE_AUTHENTICATOR).is_none()
        {
            return Err(RadiusError::MalformedPacket(
                "EAP Access-Request requires Message-Authenticator".into(),
            ));
        }

        let packet = self.packet.decode_attributes(&authenticator, secret)?;
        Ok(AccessRequest { packet })
    }
}

impl AccountingRequest {
    pub fn new(dict: Arc<Dictionary>, identifier: u8) -> Self {
        AccountingRequest {
            packet: Packet::new(dict, Code::AccountingRequest, identifier),
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    pub fn with_attribute(self, attribute: impl Into<Attribute>) -> Self {
        AccountingRequest {
            packet: self.packet.with_attribute(attribute),
        }
    }

    /// Acct-Status-Type (40) value, when present and well-formed.
    pub fn acct_status_type(&self) -> Option<u32> {
        self.packet
            .attribute(types::ACCT_STATUS_TYPE)
            .and_then(Attribute::as_plain)
            .and_then(|plain| plain.as_u32().ok())
    }
}

impl CoaRequest {
    pub fn new(dict: Arc<Dictionary>, identifier: u8) -> Self {
        CoaRequest {
            packet: Packet::new(dict, Code::CoaRequest, identifier),
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    pub fn with_attribute(self, attribute: impl Into<Attribute>) -> Self {
        CoaRequest {
            packet: self.packet.with_attribute(attribute),
        }
    }
}

impl DisconnectRequest {
    pub fn new(dict: Arc<Dictionary>, identifier: u8) -> Self {
        DisconnectRequest {
            packet: Packet::new(dict, Code::DisconnectRequest, identifier),
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn into_packet(self) -> Packet {
        self.packet
    }

    pub fn with_attribute(self, attribute: impl Into<Attribute>) -> Self {
        DisconnectRequest {
            packet: self.packet.with_attribute(attribute),
        }
    }
}

impl GenericRequest {
    pub fn packet(&self) -> &Packet {
        &self.packet
    }
}

/// `md5(chap_ident | password | challenge)` per RFC 2865 Section 2.2.
pub fn chap_response(ident: u8, password: &[u8], challenge: &[u8]) -> [u8; 16] {
    let mut data = Vec::with_capacity(1 + password.len() + challenge.len());
    data.push(ident);
    data.extend_from_slice(password);
    data.extend_from_slice(challenge);
    md5::compute(&data).0
}
