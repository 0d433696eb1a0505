use crate::attr::codec::CodecType;
use crate::attr::value::DataType;
use std::collections::HashMap;

/// Dictionary entry describing one attribute type.
///
/// Templates drive parsing (typed value rendering), programmatic
/// construction from strings, tag handling and per-attribute encryption.
#[derive(Debug, Clone)]
pub struct AttributeTemplate {
    vendor_id: i32,
    attr_type: u32,
    name: String,
    data_type: DataType,
    codec: CodecType,
    tagged: bool,
    int_to_name: HashMap<u32, String>,
    name_to_int: HashMap<String, u32>,
}

impl AttributeTemplate {
    /// Standard RADIUS attribute type codes with protocol-mandated handling.
    const USER_PASSWORD: u32 = 2;
    const TUNNEL_PASSWORD: u32 = 69;
    const MESSAGE_AUTHENTICATOR: u32 = 80;

    pub fn new(vendor_id: i32, attr_type: u32, name: impl Into<String>, data_type: &str) -> Self {
        AttributeTemplate::with_flags(vendor_id, attr_type, name, data_type, 0, false)
    }

    /// `encrypt_flag` follows the FreeRadius dictionary convention (1/2/3),
    /// 0 for none. Protocol-mandated codecs and tag support win over flags.
    pub fn with_flags(
        vendor_id: i32,
        attr_type: u32,
        name: impl Into<String>,
        data_type: &str,
        encrypt_flag: u8,
        has_tag: bool,
    ) -> Self {
        let name = if vendor_id == -1 && attr_type == Self::MESSAGE_AUTHENTICATOR {
            "Message-Authenticator".to_string()
        } else {
            name.into()
        };

        let codec = if vendor_id == -1 && attr_type == Self::USER_PASSWORD {
            CodecType::UserPassword
        } else if vendor_id == -1 && attr_type == Self::TUNNEL_PASSWORD {
            CodecType::TunnelPassword
        } else if vendor_id == 529 && attr_type == 214 {
            CodecType::AscendSendSecret
        } else {
            CodecType::from_encrypt_flag(encrypt_flag)
        };

        let tagged = has_tag || (vendor_id == -1 && attr_type == Self::TUNNEL_PASSWORD);

        AttributeTemplate {
            vendor_id,
            attr_type,
            name,
            data_type: DataType::from_name(data_type),
            codec,
            tagged,
            int_to_name: HashMap::new(),
            name_to_int: HashMap::new(),
        }
    }

    pub fn vendor_id(&self) -> i32 {
        self.vendor_id
    }

    pub fn attr_type(&self) -> u32 {
        self.attr_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn codec(&self) -> CodecType {
        self.codec
    }

    pub fn encrypted(&self) -> bool {
        self.codec != CodecType::None
    }

    /// Whether the attribute carries an RFC 2868 tag octet.
    pub fn tagged(&self) -> bool {
        self.tagged
    }

    /// Register a named enumeration value.
    pub(crate) fn add_value(&mut self, name: impl Into<String>, value: u32) {
        let name = name.into();
        self.int_to_name.insert(value, name.clone());
        self.name_to_int.insert(name, value);
    }

    /// Name for an integer value, if this attribute enumerates it.
    pub fn value_name(&self, value: u32) -> Option<&str> {
        self.int_to_name.get(&value).map(String::as_str)
    }

    /// Integer for a named value, if this attribute enumerates it.
    pub fn value_of(&self, name: &str) -> Option<u32> {
        self.name_to_int.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_password_codec_is_forced() {
        let template = AttributeTemplate::new(-1, 2, "User-Password", "string");
        assert_eq!(template.codec(), CodecType::UserPassword);
        assert!(template.encrypted());
    }

    #[test]
    fn test_tunnel_password_implicitly_tagged() {
        let template = AttributeTemplate::new(-1, 69, "Tunnel-Password", "string");
        assert_eq!(template.codec(), CodecType::TunnelPassword);
        assert!(template.tagged());
    }

    #[test]
    fn test_ascend_send_secret() {
        let template = AttributeTemplate::new(529, 214, "Ascend-Send-Secret", "string");
        assert_eq!(template.codec(), CodecType::AscendSendSecret);
    }

    #[test]
    fn test_message_authenticator_name_forced() {
        let template = AttributeTemplate::new(-1, 80, "Renamed", "octets");
        assert_eq!(template.name(), "Message-Authenticator");
    }

    #[test]
    fn test_enumeration() {
        let mut template = AttributeTemplate::new(-1, 6, "Service-Type", "integer");
        template.add_value("Login-User", 1);
        assert_eq!(template.value_of("Login-User"), Some(1));
        assert_eq!(template.value_name(1), Some("Login-User"));
        assert_eq!(template.value_name(9), None);
    }

    #[test]
    fn test_encrypt_flag() {
        let template = AttributeTemplate::with_flags(9, 36, "Cisco-Secret", "string", 2, true);
        assert_eq!(template.codec(), CodecType::TunnelPassword);
        assert!(template.tagged());
    }
}
