//! Per-attribute encryption codecs.
//!
//! Attributes flagged with a codec in the dictionary carry their value in
//! encrypted (wire) form once encoded. All codecs key off the shared secret
//! and the request authenticator of the packet that carries the attribute.

use crate::error::RadiusError;
use rand::Rng;

/// Encryption method applied to an attribute value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    /// Value travels as-is.
    None,
    /// RFC 2865 Section 5.2 (User-Password).
    UserPassword,
    /// RFC 2868 Section 3.5 (Tunnel-Password), salted.
    TunnelPassword,
    /// Ascend-Send-Secret (vendor 529, type 214), single-block XOR.
    AscendSendSecret,
}

impl CodecType {
    /// Map a FreeRadius-style `encrypt=` flag to a codec.
    pub fn from_encrypt_flag(flag: u8) -> Self {
        match flag {
            1 => CodecType::UserPassword,
            2 => CodecType::TunnelPassword,
            3 => CodecType::AscendSendSecret,
            _ => CodecType::None,
        }
    }

    pub fn encode(
        self,
        data: &[u8],
        request_auth: &[u8; 16],
        secret: &[u8],
    ) -> Result<Vec<u8>, RadiusError> {
        match self {
            CodecType::None => Ok(data.to_vec()),
            CodecType::UserPassword => Ok(encode_user_password(data, request_auth, secret)),
            CodecType::TunnelPassword => Ok(encode_tunnel_password(data, request_auth, secret)),
            CodecType::AscendSendSecret => ascend_xor(data, request_auth, secret),
        }
    }

    pub fn decode(
        self,
        data: &[u8],
        request_auth: &[u8; 16],
        secret: &[u8],
    ) -> Result<Vec<u8>, RadiusError> {
        match self {
            CodecType::None => Ok(data.to_vec()),
            CodecType::UserPassword => decode_user_password(data, request_auth, secret),
            CodecType::TunnelPassword => decode_tunnel_password(data, request_auth, secret),
            CodecType::AscendSendSecret => ascend_xor(data, request_auth, secret),
        }
    }
}

fn md5_block(parts: &[&[u8]]) -> [u8; 16] {
    let mut data = Vec::new();
    for part in parts {
        data.extend_from_slice(part);
    }
    md5::compute(&data).0
}

/// Pad to a 16-octet multiple with NULs; empty input pads to one block.
fn pad16(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    padded.resize(padded.len().div_ceil(16).max(1) * 16, 0);
    padded
}

/// Encrypt User-Password per RFC 2865 Section 5.2.
///
/// `c_0 = p_0 xor md5(secret || request_auth)`, each later block chains on
/// the previous ciphertext block.
pub fn encode_user_password(plaintext: &[u8], request_auth: &[u8; 16], secret: &[u8]) -> Vec<u8> {
    let padded = pad16(plaintext);
    let mut out = Vec::with_capacity(padded.len());
    let mut prev: [u8; 16] = *request_auth;

    for chunk in padded.chunks(16) {
        let hash = md5_block(&[secret, &prev]);
        let mut block = [0u8; 16];
        for i in 0..16 {
            block[i] = chunk[i] ^ hash[i];
        }
        out.extend_from_slice(&block);
        prev = block;
    }
    out
}

/// Decrypt User-Password; the chain input for block `i` is the previous
/// **ciphertext** block. Trailing padding NULs are stripped.
pub fn decode_user_password(
    ciphertext: &[u8],
    request_auth: &[u8; 16],
    secret: &[u8],
) -> Result<Vec<u8>, RadiusError> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(RadiusError::MalformedPacket(format!(
            "encrypted User-Password must be a non-empty multiple of 16 octets, got {}",
            ciphertext.len()
        )));
    }

    let mut out = Vec::with_capacity(ciphertext.len());
    let mut prev: &[u8] = request_auth;

    for chunk in ciphertext.chunks(16) {
        let hash = md5_block(&[secret, prev]);
        for i in 0..16 {
            out.push(chunk[i] ^ hash[i]);
        }
        prev = chunk;
    }

    while out.last() == Some(&0) {
        out.pop();
    }
    Ok(out)
}

/// Encrypt Tunnel-Password per RFC 2868 Section 3.5.
///
/// Wire form is `salt(1) | chain-encrypted(len(1) | plaintext)` where the
/// salt has its high bit set and the initial chain block is
/// `md5(secret || request_auth || salt)`.
pub fn encode_tunnel_password(plaintext: &[u8], request_auth: &[u8; 16], secret: &[u8]) -> Vec<u8> {
    let salt: u8 = 0x80 | (rand::rng().random::<u8>() & 0x7f);

    let mut region = Vec::with_capacity(1 + plaintext.len());
    region.push(plaintext.len() as u8);
    region.extend_from_slice(plaintext);
    let padded = pad16(&region);

    let mut out = Vec::with_capacity(1 + padded.len());
    out.push(salt);

    let mut prev = md5_block(&[secret, request_auth, &[salt]]);
    for chunk in padded.chunks(16) {
        let mut block = [0u8; 16];
        for i in 0..16 {
            block[i] = chunk[i] ^ prev[i];
        }
        out.extend_from_slice(&block);
        prev = md5_block(&[secret, &block]);
    }
    out
}

/// Invert [`encode_tunnel_password`].
pub fn decode_tunnel_password(
    data: &[u8],
    request_auth: &[u8; 16],
    secret: &[u8],
) -> Result<Vec<u8>, RadiusError> {
    if data.len() < 17 || (data.len() - 1) % 16 != 0 {
        return Err(RadiusError::MalformedPacket(format!(
            "encrypted Tunnel-Password must be salt plus a multiple of 16 octets, got {}",
            data.len()
        )));
    }
    let salt = data[0];
    if salt & 0x80 == 0 {
        return Err(RadiusError::MalformedPacket(
            "Tunnel-Password salt missing high bit".into(),
        ));
    }

    let ciphertext = &data[1..];
    let mut region = Vec::with_capacity(ciphertext.len());
    let mut prev = md5_block(&[secret, request_auth, &[salt]]);

    for chunk in ciphertext.chunks(16) {
        for i in 0..16 {
            region.push(chunk[i] ^ prev[i]);
        }
        prev = md5_block(&[secret, chunk]);
    }

    let declared = region[0] as usize;
    if declared > region.len() - 1 {
        return Err(RadiusError::MalformedPacket(format!(
            "Tunnel-Password length octet {declared} exceeds payload {}",
            region.len() - 1
        )));
    }
    Ok(region[1..=declared].to_vec())
}

/// Ascend-Send-Secret: single 16-octet block XORed with
/// `md5(secret || request_auth)`. Encode and decode are the same operation.
fn ascend_xor(data: &[u8], request_auth: &[u8; 16], secret: &[u8]) -> Result<Vec<u8>, RadiusError> {
    let padded = pad16(data);
    if padded.len() != 16 {
        return Err(RadiusError::MalformedPacket(format!(
            "Ascend-Send-Secret value must fit one 16-octet block, got {}",
            data.len()
        )));
    }
    let hash = md5_block(&[secret, request_auth]);
    let mut out: Vec<u8> = padded.iter().zip(hash.iter()).map(|(b, h)| b ^ h).collect();
    while out.last() == Some(&0) {
        out.pop();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTH: [u8; 16] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
        0x10,
    ];

    #[test]
    fn test_user_password_round_trip() {
        for pw in ["p", "password", "a-password-longer-than-sixteen-octets"] {
            let enc = encode_user_password(pw.as_bytes(), &AUTH, b"testing123");
            assert_eq!(enc.len() % 16, 0);
            let dec = decode_user_password(&enc, &AUTH, b"testing123").unwrap();
            assert_eq!(dec, pw.as_bytes());
        }
    }

    #[test]
    fn test_user_password_empty_pads_to_one_block() {
        let enc = encode_user_password(b"", &AUTH, b"s");
        assert_eq!(enc.len(), 16);
    }

    #[test]
    fn test_user_password_rejects_bad_length() {
        assert!(decode_user_password(&[0u8; 15], &AUTH, b"s").is_err());
        assert!(decode_user_password(&[], &AUTH, b"s").is_err());
    }

    #[test]
    fn test_user_password_wrong_secret_garbles() {
        let enc = encode_user_password(b"password", &AUTH, b"right");
        let dec = decode_user_password(&enc, &AUTH, b"wrong").unwrap();
        assert_ne!(dec, b"password");
    }

    #[test]
    fn test_tunnel_password_round_trip() {
        for pw in ["x", "tunnelpw", "something-much-longer-than-one-block-of-payload"] {
            let enc = encode_tunnel_password(pw.as_bytes(), &AUTH, b"testing123");
            assert!(enc[0] & 0x80 != 0);
            let dec = decode_tunnel_password(&enc, &AUTH, b"testing123").unwrap();
            assert_eq!(dec, pw.as_bytes());
        }
    }

    #[test]
    fn test_tunnel_password_salts_differ() {
        let a = encode_tunnel_password(b"pw", &AUTH, b"s");
        let b = encode_tunnel_password(b"pw", &AUTH, b"s");
        // salts are random; two encodings of the same value should not collide
        // often enough to matter, and decode must work for both
        assert_eq!(decode_tunnel_password(&a, &AUTH, b"s").unwrap(), b"pw");
        assert_eq!(decode_tunnel_password(&b, &AUTH, b"s").unwrap(), b"pw");
    }

    #[test]
    fn test_tunnel_password_rejects_clear_salt() {
        let mut enc = encode_tunnel_password(b"pw", &AUTH, b"s");
        enc[0] &= 0x7f;
        assert!(decode_tunnel_password(&enc, &AUTH, b"s").is_err());
    }

    #[test]
    fn test_ascend_send_secret_involution() {
        let enc = CodecType::AscendSendSecret
            .encode(b"secretvalue", &AUTH, b"s")
            .unwrap();
        let dec = CodecType::AscendSendSecret.decode(&enc, &AUTH, b"s").unwrap();
        assert_eq!(dec, b"secretvalue");
    }

    #[test]
    fn test_encrypt_flag_mapping() {
        assert_eq!(CodecType::from_encrypt_flag(1), CodecType::UserPassword);
        assert_eq!(CodecType::from_encrypt_flag(2), CodecType::TunnelPassword);
        assert_eq!(CodecType::from_encrypt_flag(3), CodecType::AscendSendSecret);
        assert_eq!(CodecType::from_encrypt_flag(0), CodecType::None);
    }
}
