//! RADIUS attribute model.
//!
//! Attributes are either plain `type | length | [tag] | value` entries or a
//! Vendor-Specific container (type 26) holding sub-attributes for one
//! vendor. Nesting stops there: sub-attributes are always plain.
//!
//! An attribute whose dictionary template names an encryption codec carries
//! an `encoded` flag; [`Attribute::encode`] and [`Attribute::decode`] move
//! the value between plaintext and wire form and are idempotent.

pub mod codec;
pub mod value;

use crate::dict::Dictionary;
use crate::error::RadiusError;
use value::{format_value, DataType};

/// Standard attribute type codes used directly by the stack.
pub mod types {
    pub const USER_NAME: u32 = 1;
    pub const USER_PASSWORD: u32 = 2;
    pub const CHAP_PASSWORD: u32 = 3;
    pub const REPLY_MESSAGE: u32 = 18;
    pub const STATE: u32 = 24;
    pub const VENDOR_SPECIFIC: u32 = 26;
    pub const PROXY_STATE: u32 = 33;
    pub const ACCT_STATUS_TYPE: u32 = 40;
    pub const CHAP_CHALLENGE: u32 = 60;
    pub const TUNNEL_PASSWORD: u32 = 69;
    pub const ARAP_PASSWORD: u32 = 70;
    pub const EAP_MESSAGE: u32 = 79;
    pub const MESSAGE_AUTHENTICATOR: u32 = 80;
}

/// Vendor id carried by attributes that are not vendor-specific.
pub const NO_VENDOR: i32 = -1;

/// Largest on-wire size of a standard attribute including type and length.
pub const MAX_ATTRIBUTE_LEN: usize = 255;

/// One attribute in a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Plain(PlainAttribute),
    Vendor(VendorSpecific),
}

/// A `type | length | [tag] | value` attribute, top-level or inside a VSA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainAttribute {
    vendor_id: i32,
    attr_type: u32,
    tag: Option<u8>,
    value: Vec<u8>,
    encoded: bool,
}

/// Vendor-Specific attribute (type 26) holding sub-attributes that all
/// belong to `child_vendor_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorSpecific {
    child_vendor_id: i32,
    sub_attributes: Vec<PlainAttribute>,
}

impl PlainAttribute {
    pub fn new(vendor_id: i32, attr_type: u32, tag: Option<u8>, value: Vec<u8>) -> Self {
        PlainAttribute {
            vendor_id,
            attr_type,
            tag,
            value,
            encoded: false,
        }
    }

    /// Construct with the value already in wire (possibly encrypted) form.
    pub fn from_wire(vendor_id: i32, attr_type: u32, tag: Option<u8>, value: Vec<u8>, encoded: bool) -> Self {
        PlainAttribute {
            vendor_id,
            attr_type,
            tag,
            value,
            encoded,
        }
    }

    pub fn vendor_id(&self) -> i32 {
        self.vendor_id
    }

    pub fn attr_type(&self) -> u32 {
        self.attr_type
    }

    pub fn tag(&self) -> Option<u8> {
        self.tag
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Whether the value is currently in encrypted wire form.
    pub fn is_encoded(&self) -> bool {
        self.encoded
    }

    pub fn as_string(&self) -> Result<String, RadiusError> {
        String::from_utf8(self.value.clone())
            .map_err(|_| RadiusError::InvalidAttributeValue("value is not UTF-8".into()))
    }

    pub fn as_u32(&self) -> Result<u32, RadiusError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            RadiusError::InvalidAttributeValue(format!(
                "expected 4 octets for integer, got {}",
                self.value.len()
            ))
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Render the value using the dictionary data type, hex otherwise.
    pub fn display_value(&self, dict: &Dictionary) -> String {
        match dict.template(self.vendor_id, self.attr_type) {
            Some(template) => {
                if template.data_type() == DataType::Integer {
                    if let Ok(v) = self.as_u32() {
                        if let Some(name) = template.value_name(v) {
                            return name.to_string();
                        }
                    }
                }
                format_value(template.data_type(), &self.value)
            }
            None => format_value(DataType::Octets, &self.value),
        }
    }

    fn header_len(&self, dict: &Dictionary) -> usize {
        if self.vendor_id == NO_VENDOR {
            2
        } else {
            dict.vendor(self.vendor_id).map_or(2, |v| v.header_size())
        }
    }

    fn write_wire(&self, dict: &Dictionary, out: &mut Vec<u8>) -> Result<(), RadiusError> {
        let tag_len = usize::from(self.tag.is_some());
        let total = self.header_len(dict) + tag_len + self.value.len();

        if self.vendor_id == NO_VENDOR {
            if total > MAX_ATTRIBUTE_LEN {
                return Err(RadiusError::MalformedPacket(format!(
                    "attribute {} too long: {total} octets",
                    self.attr_type
                )));
            }
            out.push(self.attr_type as u8);
            out.push(total as u8);
        } else {
            match dict.vendor(self.vendor_id) {
                Some(vendor) => {
                    if vendor.length_size() == 1 && total > MAX_ATTRIBUTE_LEN {
                        return Err(RadiusError::MalformedPacket(format!(
                            "sub-attribute {} too long: {total} octets",
                            self.attr_type
                        )));
                    }
                    out.extend_from_slice(&vendor.type_bytes(self.attr_type));
                    out.extend_from_slice(&vendor.length_bytes(total));
                }
                None => {
                    if total > MAX_ATTRIBUTE_LEN {
                        return Err(RadiusError::MalformedPacket(format!(
                            "sub-attribute {} too long: {total} octets",
                            self.attr_type
                        )));
                    }
                    out.push(self.attr_type as u8);
                    out.push(total as u8);
                }
            }
        }

        if let Some(tag) = self.tag {
            out.push(tag);
        }
        out.extend_from_slice(&self.value);
        Ok(())
    }
}

impl VendorSpecific {
    /// Build a VSA container. Every sub-attribute must carry the child
    /// vendor id.
    pub fn new(child_vendor_id: i32, sub_attributes: Vec<PlainAttribute>) -> Result<Self, RadiusError> {
        if child_vendor_id < 0 {
            return Err(RadiusError::InvalidAttributeValue(format!(
                "Vendor-Specific child vendor id must be positive: {child_vendor_id}"
            )));
        }
        if sub_attributes.is_empty() {
            return Err(RadiusError::InvalidAttributeValue(
                "Vendor-Specific must hold at least one sub-attribute".into(),
            ));
        }
        for sub in &sub_attributes {
            if sub.vendor_id() != child_vendor_id {
                return Err(RadiusError::InvalidAttributeValue(format!(
                    "sub-attribute vendor id {} does not match container vendor {child_vendor_id}",
                    sub.vendor_id()
                )));
            }
        }
        Ok(VendorSpecific {
            child_vendor_id,
            sub_attributes,
        })
    }

    pub fn child_vendor_id(&self) -> i32 {
        self.child_vendor_id
    }

    pub fn sub_attributes(&self) -> &[PlainAttribute] {
        &self.sub_attributes
    }

    fn write_wire(&self, dict: &Dictionary, out: &mut Vec<u8>) -> Result<(), RadiusError> {
        let mut payload = Vec::new();
        for sub in &self.sub_attributes {
            sub.write_wire(dict, &mut payload)?;
        }

        let total = 2 + 4 + payload.len();
        if total > MAX_ATTRIBUTE_LEN {
            return Err(RadiusError::MalformedPacket(format!(
                "Vendor-Specific for vendor {} too long: {total} octets",
                self.child_vendor_id
            )));
        }
        out.push(types::VENDOR_SPECIFIC as u8);
        out.push(total as u8);
        out.extend_from_slice(&(self.child_vendor_id as u32).to_be_bytes());
        out.extend_from_slice(&payload);
        Ok(())
    }
}

impl Attribute {
    /// Attribute type as seen at the top level of a packet.
    pub fn attr_type(&self) -> u32 {
        match self {
            Attribute::Plain(plain) => plain.attr_type(),
            Attribute::Vendor(_) => types::VENDOR_SPECIFIC,
        }
    }

    pub fn as_plain(&self) -> Option<&PlainAttribute> {
        match self {
            Attribute::Plain(plain) => Some(plain),
            Attribute::Vendor(_) => None,
        }
    }

    pub fn as_vendor(&self) -> Option<&VendorSpecific> {
        match self {
            Attribute::Vendor(vsa) => Some(vsa),
            Attribute::Plain(_) => None,
        }
    }

    /// Serialize to wire form.
    pub fn to_bytes(&self, dict: &Dictionary) -> Result<Vec<u8>, RadiusError> {
        let mut out = Vec::new();
        match self {
            Attribute::Plain(plain) => plain.write_wire(dict, &mut out)?,
            Attribute::Vendor(vsa) => vsa.write_wire(dict, &mut out)?,
        }
        Ok(out)
    }

    /// Parse one top-level attribute, returning it and the octets consumed.
    pub fn parse(dict: &Dictionary, buf: &[u8]) -> Result<(Attribute, usize), RadiusError> {
        if buf.len() < 2 {
            return Err(RadiusError::MalformedPacket(format!(
                "attribute header truncated: {} octets left",
                buf.len()
            )));
        }
        let attr_type = buf[0] as u32;
        let length = buf[1] as usize;
        if length < 2 || length > buf.len() {
            return Err(RadiusError::MalformedPacket(format!(
                "attribute {attr_type} declares length {length}, {} octets left",
                buf.len()
            )));
        }

        let payload = &buf[2..length];
        if attr_type == types::VENDOR_SPECIFIC {
            let vsa = parse_vendor_specific(dict, payload)?;
            return Ok((Attribute::Vendor(vsa), length));
        }

        Ok((
            Attribute::Plain(plain_from_wire(dict, NO_VENDOR, attr_type, payload)),
            length,
        ))
    }

    /// Run the dictionary codec over the value, producing wire form.
    /// Already-encoded attributes pass through unchanged.
    pub fn encode(
        self,
        dict: &Dictionary,
        request_auth: &[u8; 16],
        secret: &[u8],
    ) -> Result<Attribute, RadiusError> {
        match self {
            Attribute::Plain(plain) => Ok(Attribute::Plain(encode_plain(dict, plain, request_auth, secret)?)),
            Attribute::Vendor(vsa) => {
                let subs = vsa
                    .sub_attributes
                    .into_iter()
                    .map(|sub| encode_plain(dict, sub, request_auth, secret))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Attribute::Vendor(VendorSpecific {
                    child_vendor_id: vsa.child_vendor_id,
                    sub_attributes: subs,
                }))
            }
        }
    }

    /// Invert [`Attribute::encode`]. Attributes without a codec or already
    /// in plaintext form pass through unchanged.
    pub fn decode(
        self,
        dict: &Dictionary,
        request_auth: &[u8; 16],
        secret: &[u8],
    ) -> Result<Attribute, RadiusError> {
        match self {
            Attribute::Plain(plain) => Ok(Attribute::Plain(decode_plain(dict, plain, request_auth, secret)?)),
            Attribute::Vendor(vsa) => {
                let subs = vsa
                    .sub_attributes
                    .into_iter()
                    .map(|sub| decode_plain(dict, sub, request_auth, secret))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Attribute::Vendor(VendorSpecific {
                    child_vendor_id: vsa.child_vendor_id,
                    sub_attributes: subs,
                }))
            }
        }
    }
}

impl From<PlainAttribute> for Attribute {
    fn from(plain: PlainAttribute) -> Self {
        Attribute::Plain(plain)
    }
}

impl From<VendorSpecific> for Attribute {
    fn from(vsa: VendorSpecific) -> Self {
        Attribute::Vendor(vsa)
    }
}

/// Build a plain attribute from wire payload, splitting off the tag octet
/// when the dictionary marks the type tagged, and flagging encrypted types
/// as still-encoded.
fn plain_from_wire(dict: &Dictionary, vendor_id: i32, attr_type: u32, payload: &[u8]) -> PlainAttribute {
    let template = dict.template(vendor_id, attr_type);
    let tagged = template.is_some_and(|t| t.tagged());
    let encoded = template.is_some_and(|t| t.encrypted());

    let (tag, value) = if tagged && !payload.is_empty() {
        (Some(payload[0]), payload[1..].to_vec())
    } else {
        (None, payload.to_vec())
    };
    PlainAttribute::from_wire(vendor_id, attr_type, tag, value, encoded)
}

fn parse_vendor_specific(dict: &Dictionary, payload: &[u8]) -> Result<VendorSpecific, RadiusError> {
    if payload.len() < 6 {
        return Err(RadiusError::MalformedPacket(format!(
            "Vendor-Specific too short: {} octets",
            payload.len()
        )));
    }
    let vendor_id = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as i32;
    let vendor = dict.vendor(vendor_id);
    let (type_size, length_size) = vendor.map_or((1, 1), |v| (v.type_size(), v.length_size()));

    let mut rest = &payload[4..];
    let mut subs = Vec::new();

    while !rest.is_empty() {
        if rest.len() < type_size + length_size {
            return Err(RadiusError::MalformedPacket(format!(
                "vendor {vendor_id} sub-attribute header truncated: {} octets left",
                rest.len()
            )));
        }

        let attr_type = match type_size {
            2 => u16::from_be_bytes([rest[0], rest[1]]) as u32,
            4 => u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]),
            _ => rest[0] as u32,
        };
        rest = &rest[type_size..];

        let value_slice = match length_size {
            // implicit length: the sub-attribute runs to the VSA boundary
            0 => {
                let v = rest;
                rest = &[];
                v
            }
            _ => {
                let declared = match length_size {
                    2 => u16::from_be_bytes([rest[0], rest[1]]) as usize,
                    _ => rest[0] as usize,
                };
                rest = &rest[length_size..];
                let header = type_size + length_size;
                if declared < header || declared - header > rest.len() {
                    return Err(RadiusError::MalformedPacket(format!(
                        "vendor {vendor_id} sub-attribute {attr_type} declares length {declared}, {} octets left",
                        rest.len() + header
                    )));
                }
                let (v, tail) = rest.split_at(declared - header);
                rest = tail;
                v
            }
        };

        subs.push(plain_from_wire(dict, vendor_id, attr_type, value_slice));
    }

    VendorSpecific::new(vendor_id, subs)
}

fn encode_plain(
    dict: &Dictionary,
    plain: PlainAttribute,
    request_auth: &[u8; 16],
    secret: &[u8],
) -> Result<PlainAttribute, RadiusError> {
    match dict.template(plain.vendor_id, plain.attr_type) {
        Some(template) if template.encrypted() && !plain.encoded => {
            let value = template.codec().encode(&plain.value, request_auth, secret)?;
            Ok(PlainAttribute {
                value,
                encoded: true,
                ..plain
            })
        }
        _ => Ok(plain),
    }
}

fn decode_plain(
    dict: &Dictionary,
    plain: PlainAttribute,
    request_auth: &[u8; 16],
    secret: &[u8],
) -> Result<PlainAttribute, RadiusError> {
    match dict.template(plain.vendor_id, plain.attr_type) {
        Some(template) if template.encrypted() && plain.encoded => {
            let value = template.codec().decode(&plain.value, request_auth, secret)?;
            Ok(PlainAttribute {
                value,
                encoded: false,
                ..plain
            })
        }
        _ => Ok(plain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::Dictionary;

    fn dict() -> &'static Dictionary {
        Dictionary::standard()
    }

    #[test]
    fn test_plain_attribute_round_trip() {
        let attr = Attribute::from(PlainAttribute::new(NO_VENDOR, types::USER_NAME, None, b"test".to_vec()));
        let bytes = attr.to_bytes(dict()).unwrap();
        assert_eq!(bytes, vec![1, 6, b't', b'e', b's', b't']);

        let (parsed, consumed) = Attribute::parse(dict(), &bytes).unwrap();
        assert_eq!(consumed, 6);
        assert_eq!(parsed, attr);
    }

    #[test]
    fn test_attribute_too_long_rejected() {
        let attr = Attribute::from(PlainAttribute::new(NO_VENDOR, 11, None, vec![0u8; 254]));
        assert!(attr.to_bytes(dict()).is_err());
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(Attribute::parse(dict(), &[1]).is_err());
        assert!(Attribute::parse(dict(), &[1, 10, 0]).is_err());
        assert!(Attribute::parse(dict(), &[1, 1]).is_err());
    }

    #[test]
    fn test_vendor_specific_round_trip() {
        let sub = PlainAttribute::new(14122, 1, None, b"location".to_vec());
        let vsa = VendorSpecific::new(14122, vec![sub]).unwrap();
        let attr = Attribute::from(vsa);

        let bytes = attr.to_bytes(dict()).unwrap();
        assert_eq!(bytes[0], 26);
        assert_eq!(bytes[1] as usize, bytes.len());
        assert_eq!(&bytes[2..6], &14122u32.to_be_bytes());

        let (parsed, consumed) = Attribute::parse(dict(), &bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, attr);
    }

    #[test]
    fn test_vendor_specific_rejects_mismatched_sub() {
        let sub = PlainAttribute::new(9, 1, None, b"x".to_vec());
        assert!(VendorSpecific::new(14122, vec![sub]).is_err());
    }

    #[test]
    fn test_vendor_specific_rejects_empty() {
        assert!(VendorSpecific::new(14122, vec![]).is_err());
    }

    #[test]
    fn test_malformed_sub_attribute_aborts() {
        // VSA declaring a sub-attribute longer than its payload
        let bytes = vec![26, 9, 0, 0, 55, 42, 1, 30, 0];
        assert!(Attribute::parse(dict(), &bytes).is_err());
    }

    #[test]
    fn test_tagged_attribute_splits_tag() {
        // Tunnel-Type (64) is tagged in the standard dictionary
        let bytes = vec![64, 7, 0x01, 0, 0, 0, 1];
        let (parsed, _) = Attribute::parse(dict(), &bytes).unwrap();
        let plain = parsed.as_plain().unwrap();
        assert_eq!(plain.tag(), Some(0x01));
        assert_eq!(plain.value(), &[0, 0, 0, 1]);

        assert_eq!(parsed.to_bytes(dict()).unwrap(), bytes);
    }

    #[test]
    fn test_user_password_parse_flags_encoded() {
        let bytes = vec![2, 18, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let (parsed, _) = Attribute::parse(dict(), &bytes).unwrap();
        assert!(parsed.as_plain().unwrap().is_encoded());
    }

    #[test]
    fn test_encode_decode_idempotent() {
        let auth = [7u8; 16];
        let secret = b"testing123";
        let attr = Attribute::from(PlainAttribute::new(
            NO_VENDOR,
            types::USER_PASSWORD,
            None,
            b"password".to_vec(),
        ));

        let once = attr.clone().encode(dict(), &auth, secret).unwrap();
        let twice = once.clone().encode(dict(), &auth, secret).unwrap();
        assert_eq!(once, twice);
        assert!(once.as_plain().unwrap().is_encoded());

        let back = once.decode(dict(), &auth, secret).unwrap();
        assert_eq!(back, attr);
        let back_twice = back.clone().decode(dict(), &auth, secret).unwrap();
        assert_eq!(back, back_twice);
    }
}
