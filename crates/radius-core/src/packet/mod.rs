//! RADIUS packet framing and authenticators.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Code      |  Identifier   |            Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! |                         Authenticator                         |
//! |                                                               |
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Attributes ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-
//! ```
//!
//! Packets are values: every mutator consumes `self` and returns a new
//! packet, so shared packets are never modified in place.

pub mod code;
pub mod message_auth;
pub mod request;
pub mod response;

pub use code::Code;

use crate::attr::{Attribute, VendorSpecific};
use crate::dict::Dictionary;
use crate::error::RadiusError;
use rand::Rng;
use std::sync::Arc;

/// Header size: 1 code + 1 identifier + 2 length + 16 authenticator.
pub const MIN_PACKET_LEN: usize = 20;
/// RFC 2865 Section 3 maximum, including the header.
pub const MAX_PACKET_LEN: usize = 4096;

/// Fixed leading fields shared by every packet variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub code: Code,
    pub identifier: u8,
    /// Absent until the packet is encoded (requests) or received.
    pub authenticator: Option<[u8; 16]>,
}

/// A RADIUS packet: header plus an ordered attribute list, tied to the
/// dictionary used for attribute naming and encoding.
#[derive(Debug, Clone)]
pub struct Packet {
    header: PacketHeader,
    attributes: Vec<Attribute>,
    dict: Arc<Dictionary>,
}

/// Generate a random Request Authenticator per RFC 2865 Section 3.
pub fn random_authenticator() -> [u8; 16] {
    let mut authenticator = [0u8; 16];
    rand::rng().fill(&mut authenticator);
    authenticator
}

impl Packet {
    pub fn new(dict: Arc<Dictionary>, code: Code, identifier: u8) -> Self {
        Packet {
            header: PacketHeader {
                code,
                identifier,
                authenticator: None,
            },
            attributes: Vec::new(),
            dict,
        }
    }

    pub fn code(&self) -> Code {
        self.header.code
    }

    pub fn identifier(&self) -> u8 {
        self.header.identifier
    }

    pub fn authenticator(&self) -> Option<[u8; 16]> {
        self.header.authenticator
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dict
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// First attribute with the given top-level type.
    pub fn attribute(&self, attr_type: u32) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.attr_type() == attr_type)
    }

    /// All attributes with the given top-level type, in packet order.
    pub fn attributes_of(&self, attr_type: u32) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.attr_type() == attr_type)
            .collect()
    }

    pub fn with_authenticator(mut self, authenticator: [u8; 16]) -> Self {
        self.header.authenticator = Some(authenticator);
        self
    }

    pub fn with_identifier(mut self, identifier: u8) -> Self {
        self.header.identifier = identifier;
        self
    }

    /// Append an attribute. A plain attribute carrying a vendor id is
    /// wrapped into its own Vendor-Specific container.
    pub fn with_attribute(mut self, attribute: impl Into<Attribute>) -> Self {
        let attribute = attribute.into();
        let attribute = match attribute {
            Attribute::Plain(plain) if plain.vendor_id() >= 0 => {
                let vendor_id = plain.vendor_id();
                match VendorSpecific::new(vendor_id, vec![plain]) {
                    Ok(vsa) => Attribute::Vendor(vsa),
                    Err(_) => unreachable!("single sub-attribute with matching vendor id"),
                }
            }
            other => other,
        };
        self.attributes.push(attribute);
        self
    }

    pub fn with_attributes(self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        attributes.into_iter().fold(self, Packet::with_attribute)
    }

    /// Drop every attribute with the given top-level type.
    pub fn remove_attributes(mut self, attr_type: u32) -> Self {
        self.attributes.retain(|a| a.attr_type() != attr_type);
        self
    }

    /// Drop only the last attribute with the given top-level type.
    pub fn remove_last_attribute(mut self, attr_type: u32) -> Self {
        if let Some(index) = self.attributes.iter().rposition(|a| a.attr_type() == attr_type) {
            self.attributes.remove(index);
        }
        self
    }

    /// Serialize with the given authenticator in the header slot.
    ///
    /// Used both for the final wire form and for authenticator/HMAC inputs
    /// that substitute zeroes or the request authenticator.
    pub fn serialize(&self, authenticator: &[u8; 16]) -> Result<Vec<u8>, RadiusError> {
        let mut buffer = Vec::with_capacity(MIN_PACKET_LEN);
        buffer.push(self.header.code.as_u8());
        buffer.push(self.header.identifier);
        buffer.extend_from_slice(&[0, 0]);
        buffer.extend_from_slice(authenticator);

        for attribute in &self.attributes {
            buffer.extend_from_slice(&attribute.to_bytes(&self.dict)?);
        }

        let total = buffer.len();
        if total > MAX_PACKET_LEN {
            return Err(RadiusError::MalformedPacket(format!(
                "packet length {total} exceeds {MAX_PACKET_LEN} octets"
            )));
        }
        buffer[2] = (total >> 8) as u8;
        buffer[3] = (total & 0xff) as u8;
        Ok(buffer)
    }

    /// Serialize using the packet's own authenticator.
    pub fn encode(&self) -> Result<Vec<u8>, RadiusError> {
        let authenticator = self.header.authenticator.ok_or_else(|| {
            RadiusError::MalformedPacket("cannot encode packet without an authenticator".into())
        })?;
        self.serialize(&authenticator)
    }

    /// Total wire length of the current attribute list plus header.
    pub fn wire_len(&self) -> Result<usize, RadiusError> {
        let mut len = MIN_PACKET_LEN;
        for attribute in &self.attributes {
            len += attribute.to_bytes(&self.dict)?.len();
        }
        Ok(len)
    }

    /// Parse a datagram. Octets past the declared length are ignored per
    /// RFC 2865 Section 3; a declared length past the datagram is an error.
    pub fn parse(dict: Arc<Dictionary>, data: &[u8]) -> Result<Self, RadiusError> {
        if data.len() < MIN_PACKET_LEN {
            return Err(RadiusError::MalformedPacket(format!(
                "datagram too short: {} octets",
                data.len()
            )));
        }

        let code = Code::from_u8(data[0]).ok_or_else(|| {
            RadiusError::MalformedPacket(format!("invalid packet code {}", data[0]))
        })?;
        let identifier = data[1];
        let declared = u16::from_be_bytes([data[2], data[3]]) as usize;

        if !(MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&declared) || declared > data.len() {
            return Err(RadiusError::MalformedPacket(format!(
                "declared length {declared} outside [{MIN_PACKET_LEN}, {MAX_PACKET_LEN}] or past datagram ({} octets)",
                data.len()
            )));
        }

        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&data[4..20]);

        let mut attributes = Vec::new();
        let mut rest = &data[MIN_PACKET_LEN..declared];
        while !rest.is_empty() {
            let (attribute, consumed) = Attribute::parse(&dict, rest)?;
            attributes.push(attribute);
            rest = &rest[consumed..];
        }

        Ok(Packet {
            header: PacketHeader {
                code,
                identifier,
                authenticator: Some(authenticator),
            },
            attributes,
            dict,
        })
    }

    /// `md5(code | id | length | slot | attributes | secret)`.
    ///
    /// With 16 zero octets in the slot this is the Accounting/CoA/Disconnect
    /// request authenticator; with the request authenticator it is the
    /// response authenticator.
    pub fn hashed_authenticator(
        &self,
        slot: &[u8; 16],
        secret: &[u8],
    ) -> Result<[u8; 16], RadiusError> {
        let mut data = self.serialize(slot)?;
        data.extend_from_slice(secret);
        Ok(md5::compute(&data).0)
    }

    /// Run the dictionary codec over every encryptable attribute.
    pub fn encode_attributes(
        mut self,
        request_auth: &[u8; 16],
        secret: &[u8],
    ) -> Result<Self, RadiusError> {
        let dict = Arc::clone(&self.dict);
        self.attributes = self
            .attributes
            .into_iter()
            .map(|a| a.encode(&dict, request_auth, secret))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self)
    }

    /// Invert [`Packet::encode_attributes`].
    pub fn decode_attributes(
        mut self,
        request_auth: &[u8; 16],
        secret: &[u8],
    ) -> Result<Self, RadiusError> {
        let dict = Arc::clone(&self.dict);
        self.attributes = self
            .attributes
            .into_iter()
            .map(|a| a.decode(&dict, request_auth, secret))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self)
    }

    /// Convenience accessor: first attribute of the type, as UTF-8.
    pub fn attribute_string(&self, attr_type: u32) -> Option<String> {
        self.attribute(attr_type)
            .and_then(Attribute::as_plain)
            .and_then(|plain| plain.as_string().ok())
    }

    pub(crate) fn map_attributes<F>(mut self, f: F) -> Self
    where
        F: FnMut(Attribute) -> Attribute,
    {
        self.attributes = self.attributes.into_iter().map(f).collect();
        self
    }
}

impl PartialEq for Packet {
    /// Dictionary identity is not part of packet equality.
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.attributes == other.attributes
    }
}

impl Eq for Packet {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{types, PlainAttribute, NO_VENDOR};

    fn dict() -> Arc<Dictionary> {
        Arc::clone(Dictionary::standard())
    }

    fn user_name(value: &str) -> PlainAttribute {
        PlainAttribute::new(NO_VENDOR, types::USER_NAME, None, value.as_bytes().to_vec())
    }

    #[test]
    fn test_round_trip() {
        let packet = Packet::new(dict(), Code::AccessRequest, 42)
            .with_attribute(user_name("test"))
            .with_authenticator([1u8; 16]);

        let bytes = packet.encode().unwrap();
        assert_eq!(bytes.len(), 26);
        assert_eq!(&bytes[..4], &[1, 42, 0, 26]);

        let parsed = Packet::parse(dict(), &bytes).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_parse_ignores_trailing_octets() {
        let packet = Packet::new(dict(), Code::AccessAccept, 1).with_authenticator([0u8; 16]);
        let mut bytes = packet.encode().unwrap();
        bytes.extend_from_slice(&[9, 9, 9]);

        let parsed = Packet::parse(dict(), &bytes).unwrap();
        assert!(parsed.attributes().is_empty());
    }

    #[test]
    fn test_parse_rejects_short_and_overlong() {
        assert!(Packet::parse(dict(), &[0u8; 19]).is_err());

        // declared length larger than the datagram
        let packet = Packet::new(dict(), Code::AccessRequest, 1).with_authenticator([0u8; 16]);
        let mut bytes = packet.encode().unwrap();
        bytes[3] = 60;
        assert!(Packet::parse(dict(), &bytes).is_err());
    }

    #[test]
    fn test_parse_rejects_code_zero() {
        let mut bytes = vec![0u8; 20];
        bytes[3] = 20;
        assert!(Packet::parse(dict(), &bytes).is_err());
    }

    #[test]
    fn test_max_length_boundary() {
        // 16 attributes of 253 value octets: 20 + 16*255 = 4100 > 4096
        // 15 attributes: 20 + 15*255 = 3845; pad to exactly 4096 with one
        // attribute of 249 value octets (251 total).
        let mut packet = Packet::new(dict(), Code::AccessRequest, 7).with_authenticator([0u8; 16]);
        for _ in 0..15 {
            packet = packet.with_attribute(PlainAttribute::new(NO_VENDOR, 25, None, vec![0u8; 253]));
        }
        packet = packet.with_attribute(PlainAttribute::new(NO_VENDOR, 25, None, vec![0u8; 249]));
        assert_eq!(packet.wire_len().unwrap(), MAX_PACKET_LEN);
        assert!(packet.encode().is_ok());

        let over = packet.with_attribute(PlainAttribute::new(NO_VENDOR, 25, None, vec![0u8; 1]));
        assert!(matches!(
            over.encode(),
            Err(RadiusError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_encode_requires_authenticator() {
        let packet = Packet::new(dict(), Code::AccessRequest, 1);
        assert!(packet.encode().is_err());
    }

    #[test]
    fn test_vendor_attribute_auto_wrapped() {
        let packet = Packet::new(dict(), Code::AccessRequest, 1)
            .with_attribute(PlainAttribute::new(14122, 2, None, b"loc".to_vec()));
        assert!(matches!(packet.attributes()[0], Attribute::Vendor(_)));
        assert_eq!(packet.attributes()[0].attr_type(), types::VENDOR_SPECIFIC);
    }

    #[test]
    fn test_remove_last_attribute() {
        let proxy_state = |v: &[u8]| PlainAttribute::new(NO_VENDOR, types::PROXY_STATE, None, v.to_vec());
        let packet = Packet::new(dict(), Code::AccessAccept, 1)
            .with_attribute(proxy_state(b"first"))
            .with_attribute(proxy_state(b"second"))
            .remove_last_attribute(types::PROXY_STATE);

        let remaining = packet.attributes_of(types::PROXY_STATE);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].as_plain().unwrap().value(), b"first");
    }

    #[test]
    fn test_hashed_authenticator_changes_with_slot() {
        let packet = Packet::new(dict(), Code::AccessAccept, 9).with_attribute(user_name("x"));
        let a = packet.hashed_authenticator(&[0u8; 16], b"secret").unwrap();
        let b = packet.hashed_authenticator(&[1u8; 16], b"secret").unwrap();
        assert_ne!(a, b);
    }
}
