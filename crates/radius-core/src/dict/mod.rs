//! Attribute dictionary.
//!
//! A [`Dictionary`] resolves attribute type codes and vendor ids to names,
//! data types, encryption codecs, tag support and enumeration values. It is
//! built once at startup (from the embedded standard dictionary and/or
//! Radiator-format files) and shared read-only afterwards.

mod parser;
mod template;
mod vendor;

pub use parser::DictionaryParser;
pub use template::AttributeTemplate;
pub use vendor::Vendor;

use crate::attr::value::{parse_value, DataType};
use crate::attr::{Attribute, PlainAttribute, NO_VENDOR};
use crate::error::RadiusError;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Read-only attribute/vendor registry.
#[derive(Debug, Default)]
pub struct Dictionary {
    by_key: HashMap<(i32, u32), AttributeTemplate>,
    by_name: HashMap<String, (i32, u32)>,
    vendors_by_id: HashMap<i32, Vendor>,
    vendors_by_name: HashMap<String, i32>,
}

impl Dictionary {
    /// The built-in RFC 2865/2866/2868/2869 dictionary, parsed once and
    /// shared for the lifetime of the process.
    pub fn standard() -> &'static Arc<Dictionary> {
        static STANDARD: OnceLock<Arc<Dictionary>> = OnceLock::new();
        STANDARD.get_or_init(|| {
            Arc::new(
                DictionaryParser::new()
                    .parse_str("standard.dict", include_str!("standard.dict"))
                    .expect("built-in dictionary parses"),
            )
        })
    }

    /// Template for `(vendor_id, type)`; `vendor_id` is -1 at top level.
    pub fn template(&self, vendor_id: i32, attr_type: u32) -> Option<&AttributeTemplate> {
        self.by_key.get(&(vendor_id, attr_type))
    }

    pub fn template_by_name(&self, name: &str) -> Option<&AttributeTemplate> {
        self.by_name.get(name).and_then(|key| self.by_key.get(key))
    }

    pub fn vendor(&self, vendor_id: i32) -> Option<&Vendor> {
        self.vendors_by_id.get(&vendor_id)
    }

    pub fn vendor_by_name(&self, name: &str) -> Option<&Vendor> {
        self.vendors_by_name
            .get(name)
            .and_then(|id| self.vendors_by_id.get(id))
    }

    /// Create an attribute from a user-facing string value.
    ///
    /// Enumeration names are resolved for integer attributes, all other
    /// values parse per the template data type.
    pub fn create_attribute(&self, name: &str, value: &str) -> Result<Attribute, RadiusError> {
        self.create_attribute_tagged(name, None, value)
    }

    /// Same as [`Dictionary::create_attribute`] with an RFC 2868 tag.
    pub fn create_attribute_tagged(
        &self,
        name: &str,
        tag: Option<u8>,
        value: &str,
    ) -> Result<Attribute, RadiusError> {
        let template = self
            .template_by_name(name)
            .ok_or_else(|| RadiusError::UnknownAttributeName(name.to_string()))?;

        let bytes = if template.data_type() == DataType::Integer {
            match template.value_of(value) {
                Some(enumerated) => enumerated.to_be_bytes().to_vec(),
                None => parse_value(DataType::Integer, value)?,
            }
        } else {
            parse_value(template.data_type(), value)?
        };

        Ok(Attribute::Plain(PlainAttribute::new(
            template.vendor_id(),
            template.attr_type(),
            tag,
            bytes,
        )))
    }

    /// Create an attribute from pre-parsed wire octets.
    pub fn create_attribute_raw(&self, name: &str, value: Vec<u8>) -> Result<Attribute, RadiusError> {
        let template = self
            .template_by_name(name)
            .ok_or_else(|| RadiusError::UnknownAttributeName(name.to_string()))?;
        Ok(Attribute::Plain(PlainAttribute::new(
            template.vendor_id(),
            template.attr_type(),
            None,
            value,
        )))
    }

    /// Attribute name for display purposes; falls back to the numeric code.
    pub fn attribute_name(&self, vendor_id: i32, attr_type: u32) -> String {
        match self.template(vendor_id, attr_type) {
            Some(template) => template.name().to_string(),
            None if vendor_id == NO_VENDOR => format!("Attr-{attr_type}"),
            None => format!("Vendor-{vendor_id}-Attr-{attr_type}"),
        }
    }

    pub(crate) fn insert_template(&mut self, template: AttributeTemplate) -> Result<(), String> {
        let key = (template.vendor_id(), template.attr_type());
        if self.by_key.contains_key(&key) {
            return Err(format!(
                "duplicate attribute type {} for vendor {}",
                template.attr_type(),
                template.vendor_id()
            ));
        }
        if self.by_name.contains_key(template.name()) {
            return Err(format!("duplicate attribute name {}", template.name()));
        }
        self.by_name.insert(template.name().to_string(), key);
        self.by_key.insert(key, template);
        Ok(())
    }

    pub(crate) fn insert_vendor(&mut self, vendor: Vendor) -> Result<(), String> {
        if self.vendors_by_id.contains_key(&vendor.id()) {
            return Err(format!("duplicate vendor id {}", vendor.id()));
        }
        if self.vendors_by_name.contains_key(vendor.name()) {
            return Err(format!("duplicate vendor name {}", vendor.name()));
        }
        self.vendors_by_name.insert(vendor.name().to_string(), vendor.id());
        self.vendors_by_id.insert(vendor.id(), vendor);
        Ok(())
    }

    pub(crate) fn template_mut(&mut self, name: &str) -> Option<&mut AttributeTemplate> {
        let key = *self.by_name.get(name)?;
        self.by_key.get_mut(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::types;

    #[test]
    fn test_standard_lookup() {
        let dict = Dictionary::standard();
        assert_eq!(dict.template(-1, 1).unwrap().name(), "User-Name");
        assert_eq!(
            dict.template_by_name("Message-Authenticator").unwrap().attr_type(),
            types::MESSAGE_AUTHENTICATOR
        );
        assert!(dict.template(-1, 250).is_none());
    }

    #[test]
    fn test_create_attribute_enumeration() {
        // Service-Type Login-User resolves to 0x06 0x06 0x00 0x00 0x00 0x01
        let dict = Dictionary::standard();
        let attr = dict.create_attribute("Service-Type", "Login-User").unwrap();
        let bytes = attr.to_bytes(dict).unwrap();
        assert_eq!(bytes, vec![0x06, 0x06, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_create_attribute_typed() {
        let dict = Dictionary::standard();
        let attr = dict.create_attribute("NAS-IP-Address", "10.0.0.1").unwrap();
        assert_eq!(attr.as_plain().unwrap().value(), &[10, 0, 0, 1]);

        let attr = dict.create_attribute("NAS-Port", "0x20").unwrap();
        assert_eq!(attr.as_plain().unwrap().value(), &[0, 0, 0, 32]);
    }

    #[test]
    fn test_create_attribute_unknown_name() {
        let dict = Dictionary::standard();
        assert!(matches!(
            dict.create_attribute("No-Such-Attribute", "1"),
            Err(RadiusError::UnknownAttributeName(_))
        ));
    }

    #[test]
    fn test_attribute_name_fallback() {
        let dict = Dictionary::standard();
        assert_eq!(dict.attribute_name(-1, 1), "User-Name");
        assert_eq!(dict.attribute_name(-1, 240), "Attr-240");
        assert_eq!(dict.attribute_name(9, 240), "Vendor-9-Attr-240");
    }
}
