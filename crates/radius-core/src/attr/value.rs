//! Attribute data types and string <-> wire value conversion.

use crate::error::RadiusError;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Dictionary data types. Unknown type names fall back to `Octets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Octets,
    Integer,
    Date,
    Ipaddr,
    Ipv6addr,
    Ipv6prefix,
    Ifid,
    Integer64,
    Ether,
    Abinary,
    Byte,
    Short,
    Signed,
    Tlv,
    Ipv4prefix,
    Vsa,
}

impl DataType {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => DataType::String,
            "integer" => DataType::Integer,
            "date" => DataType::Date,
            "ipaddr" => DataType::Ipaddr,
            "ipv6addr" => DataType::Ipv6addr,
            "ipv6prefix" => DataType::Ipv6prefix,
            "ifid" => DataType::Ifid,
            "integer64" => DataType::Integer64,
            "ether" => DataType::Ether,
            "abinary" => DataType::Abinary,
            "byte" => DataType::Byte,
            "short" => DataType::Short,
            "signed" => DataType::Signed,
            "tlv" => DataType::Tlv,
            "ipv4prefix" => DataType::Ipv4prefix,
            "vsa" => DataType::Vsa,
            _ => DataType::Octets,
        }
    }
}

/// Parse a decimal or `0x`-prefixed hex integer literal.
fn parse_int(s: &str) -> Result<u32, RadiusError> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    };
    parsed.map_err(|_| RadiusError::InvalidAttributeValue(format!("bad integer literal: {s}")))
}

/// Convert a user-supplied string into wire octets for the given data type.
pub fn parse_value(data_type: DataType, s: &str) -> Result<Vec<u8>, RadiusError> {
    match data_type {
        DataType::String => {
            if s.is_empty() {
                return Err(RadiusError::InvalidAttributeValue(
                    "string value must be at least one octet".into(),
                ));
            }
            Ok(s.as_bytes().to_vec())
        }
        DataType::Integer | DataType::Date => Ok(parse_int(s)?.to_be_bytes().to_vec()),
        DataType::Ipaddr => {
            let addr: Ipv4Addr = s.parse().map_err(|_| {
                RadiusError::InvalidAttributeValue(format!("bad IPv4 address: {s}"))
            })?;
            Ok(addr.octets().to_vec())
        }
        DataType::Ipv6addr => {
            let addr: Ipv6Addr = s.parse().map_err(|_| {
                RadiusError::InvalidAttributeValue(format!("bad IPv6 address: {s}"))
            })?;
            Ok(addr.octets().to_vec())
        }
        DataType::Ipv6prefix => parse_ipv6_prefix(s),
        _ => {
            // octets and everything that falls back to octets: hex string
            let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
            decode_hex(stripped)
        }
    }
}

/// Render wire octets as a display string for the given data type.
///
/// Falls back to hex whenever the octets do not fit the declared type.
pub fn format_value(data_type: DataType, value: &[u8]) -> String {
    match data_type {
        DataType::String => match std::str::from_utf8(value) {
            Ok(s) => s.to_string(),
            Err(_) => encode_hex(value),
        },
        DataType::Integer | DataType::Date if value.len() == 4 => {
            u32::from_be_bytes([value[0], value[1], value[2], value[3]]).to_string()
        }
        DataType::Ipaddr if value.len() == 4 => {
            Ipv4Addr::new(value[0], value[1], value[2], value[3]).to_string()
        }
        DataType::Ipv6addr if value.len() == 16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(value);
            Ipv6Addr::from(octets).to_string()
        }
        DataType::Ipv6prefix if (2..=18).contains(&value.len()) => {
            let mut octets = [0u8; 16];
            octets[..value.len() - 2].copy_from_slice(&value[2..]);
            format!("{}/{}", Ipv6Addr::from(octets), value[1])
        }
        _ => encode_hex(value),
    }
}

/// `addr/prefix-len`, encoded as `0x00 | prefix-len | addr` with trailing
/// zero octets of the address trimmed. Wire length 2..=18.
fn parse_ipv6_prefix(s: &str) -> Result<Vec<u8>, RadiusError> {
    let (addr_str, len_str) = s.split_once('/').ok_or_else(|| {
        RadiusError::InvalidAttributeValue(format!("bad IPv6 prefix, expected addr/len: {s}"))
    })?;
    let addr: Ipv6Addr = addr_str.parse().map_err(|_| {
        RadiusError::InvalidAttributeValue(format!("bad IPv6 address: {addr_str}"))
    })?;
    let prefix_len: u8 = len_str.parse().ok().filter(|len| *len <= 128).ok_or_else(|| {
        RadiusError::InvalidAttributeValue(format!("bad prefix length: {len_str}"))
    })?;

    let mut out = vec![0u8, prefix_len];
    let octets = addr.octets();
    let significant = octets.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    out.extend_from_slice(&octets[..significant]);
    Ok(out)
}

pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>, RadiusError> {
    if s.len() % 2 != 0 {
        return Err(RadiusError::InvalidAttributeValue(format!(
            "odd-length hex string: {s}"
        )));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| {
                RadiusError::InvalidAttributeValue(format!("bad hex string: {s}"))
            })
        })
        .collect()
}

pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
